//! SHEM Core Library
//!
//! Pooled memory-mapped arenas for large, pointer-rich data structures.
//!
//! # Overview
//!
//! Values are stored in arenas backed by mapped scratch files instead of the
//! process heap. Arenas are strung together in pools that grow one arena at a
//! time as data is added and drop arenas (and their files) as soon as they
//! become empty.
//!
//! # Key Components
//!
//! - **Arena**: one fixed-size mapped file with a best-fit free list
//! - **ArenaPool**: ordered arenas with lazy growth and eager reclamation
//! - **PoolBound / TypeAllocator**: a dedicated, process-wide pool per type
//! - **ContainerAllocator**: `allocator_api2` adapter so collections share
//!   their owner's pool
//! - **Shared**: reference-counted handle whose last drop frees pool storage
//!
//! # Example
//!
//! ```ignore
//! use shem_core::prelude::*;
//!
//! struct TrieNode {
//!     children: PoolVec<(u8, Shared<TrieNode>), ContainerAllocator<TrieNode>>,
//! }
//!
//! impl PoolBound for TrieNode {}
//!
//! let root = Shared::new(TrieNode {
//!     children: PoolVec::new_in(ContainerAllocator::new()),
//! })?;
//! assert!(TypeAllocator::<TrieNode>::owns(root.as_ptr().cast()));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod binding;
pub mod config;
pub mod container;
pub mod error;
pub mod pool;
pub mod prelude;
pub mod shared;

// Re-export key types at crate root for convenience
pub use arena::Arena;
pub use binding::{PoolBound, TypeAllocator};
pub use config::{DEFAULT_ARENA_SIZE, PoolConfig};
pub use container::ContainerAllocator;
pub use error::{Result, ShemError};
pub use pool::{ArenaPool, PoolStats};
pub use shared::Shared;
