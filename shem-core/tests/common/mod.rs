//! Common test utilities for integration tests.
//!
//! Bound types share one process-wide pool per type, so every test declares
//! its own node type with [`trie_node!`] to keep pool sizes and live counts
//! independent of the other tests in the binary.

#![allow(dead_code, unused_macros)]

use shem_core::PoolConfig;
use std::path::PathBuf;

/// Directory for the pools of one test type.
pub fn test_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("shem_it_{}_{}", name, std::process::id()))
}

/// Pool configuration for a test type with `arena_size` arenas.
pub fn test_pool_config(name: &str, arena_size: usize) -> PoolConfig {
    PoolConfig::default()
        .with_directory(test_dir(name))
        .with_arena_size(arena_size)
        .with_ephemeral(cfg!(unix))
}

/// Declare a pooled trie node type with its own live-instance counter.
///
/// The node keeps its children in a key-sorted vector whose storage is drawn
/// from the node's own pool through `ContainerAllocator`.
macro_rules! trie_node {
    ($name:ident, $live:ident, $arena_size:expr) => {
        static $live: ::std::sync::atomic::AtomicUsize = ::std::sync::atomic::AtomicUsize::new(0);

        struct $name {
            children: ::std::cell::RefCell<
                ::shem_core::prelude::PoolVec<
                    (u8, ::shem_core::Shared<$name>),
                    ::shem_core::ContainerAllocator<$name>,
                >,
            >,
        }

        #[allow(dead_code)]
        impl $name {
            fn create() -> ::shem_core::Result<::shem_core::Shared<Self>> {
                let node = Self {
                    children: ::std::cell::RefCell::new(
                        ::shem_core::prelude::PoolVec::new_in(::shem_core::ContainerAllocator::new()),
                    ),
                };
                $live.fetch_add(1, ::std::sync::atomic::Ordering::SeqCst);
                ::shem_core::Shared::new(node)
            }

            fn live() -> usize {
                $live.load(::std::sync::atomic::Ordering::SeqCst)
            }

            /// Bind `key` to `child`, releasing any previous binding.
            fn insert(&self, key: u8, child: ::shem_core::Shared<Self>) {
                let mut children = self.children.borrow_mut();
                match children.binary_search_by_key(&key, |(k, _)| *k) {
                    Ok(i) => children[i].1 = child,
                    Err(i) => children.insert(i, (key, child)),
                }
            }

            fn child(&self, key: u8) -> Option<::shem_core::Shared<Self>> {
                let children = self.children.borrow();
                children
                    .binary_search_by_key(&key, |(k, _)| *k)
                    .ok()
                    .map(|i| children[i].1.clone())
            }

            /// Release the binding of `key` in place, keeping the slot.
            fn reset_child(&self, key: u8) {
                let mut children = self.children.borrow_mut();
                if let Ok(i) = children.binary_search_by_key(&key, |(k, _)| *k) {
                    children[i].1.reset();
                }
            }

            fn remove(&self, key: u8) -> Option<::shem_core::Shared<Self>> {
                let mut children = self.children.borrow_mut();
                children
                    .binary_search_by_key(&key, |(k, _)| *k)
                    .ok()
                    .map(|i| children.remove(i).1)
            }

            fn clear(&self) {
                self.children.borrow_mut().clear();
            }

            fn len(&self) -> usize {
                self.children.borrow().len()
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                $live.fetch_sub(1, ::std::sync::atomic::Ordering::SeqCst);
            }
        }

        impl ::shem_core::PoolBound for $name {
            const ARENA_SIZE: usize = $arena_size;

            fn pool_config() -> ::shem_core::PoolConfig {
                $crate::common::test_pool_config(stringify!($name), Self::ARENA_SIZE)
            }
        }
    };
}
