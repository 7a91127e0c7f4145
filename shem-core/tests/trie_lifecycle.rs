//! Integration tests for pooled trie nodes: per-type pools, shared handles
//! and container storage working together.

#[macro_use]
mod common;

use shem_core::{Shared, TypeAllocator};

fn pool_size<T: shem_core::PoolBound>() -> usize {
    TypeAllocator::<T>::stats().unwrap().arenas
}

fn grow<T: shem_core::PoolBound>(size: usize) -> bool {
    TypeAllocator::<T>::instance().unwrap().lock().grow(size).unwrap()
}

fn shrink<T: shem_core::PoolBound>() -> bool {
    TypeAllocator::<T>::instance().unwrap().lock().shrink()
}

trie_node!(SpareNode, SPARE_LIVE, 10_000);

#[test]
fn spare_arena_serves_large_request_and_is_reclaimed() {
    let root = SpareNode::create().unwrap();
    root.insert(b'a', SpareNode::create().unwrap());
    root.insert(b'b', SpareNode::create().unwrap());
    assert_eq!(SpareNode::live(), 3);
    assert_eq!(pool_size::<SpareNode>(), 1);

    assert!(grow::<SpareNode>(10_000));
    assert_eq!(pool_size::<SpareNode>(), 2);

    // Too large for what is left of the first arena.
    let large = TypeAllocator::<SpareNode>::allocate(9_990).unwrap();
    assert!(TypeAllocator::<SpareNode>::owns(large.as_ptr()));
    assert_eq!(pool_size::<SpareNode>(), 2);
    {
        let pool = TypeAllocator::<SpareNode>::instance().unwrap().lock();
        let second = pool.arenas().nth(1).unwrap();
        assert!(second.owns(large.as_ptr()));
    }

    TypeAllocator::<SpareNode>::release(large).unwrap();
    assert!(!shrink::<SpareNode>());
    assert_eq!(pool_size::<SpareNode>(), 1);
    assert_eq!(SpareNode::live(), 3);
}

trie_node!(ClaimNode, CLAIM_LIVE, 10_000);

#[test]
fn trie_nodes_follow_pool_lifecycle() {
    let mut root = ClaimNode::create().unwrap();
    root.insert(b'a', ClaimNode::create().unwrap());
    root.insert(b'b', ClaimNode::create().unwrap());
    assert_eq!(ClaimNode::live(), 3);
    assert_eq!(pool_size::<ClaimNode>(), 1);

    assert!(grow::<ClaimNode>(10_000));
    assert_eq!(pool_size::<ClaimNode>(), 2);

    root.insert(b'c', ClaimNode::create().unwrap());
    assert_eq!(ClaimNode::live(), 4);
    assert!(TypeAllocator::<ClaimNode>::owns(root.as_ptr().cast()));
    for key in [b'a', b'b', b'c'] {
        let child = root.child(key).unwrap();
        assert!(TypeAllocator::<ClaimNode>::owns(child.as_ptr().cast()));
    }

    root.reset_child(b'b');
    assert_eq!(ClaimNode::live(), 3);
    assert!(root.child(b'b').unwrap().is_none());

    assert!(shrink::<ClaimNode>());
    assert_eq!(pool_size::<ClaimNode>(), 1);

    root.insert(b'a', ClaimNode::create().unwrap());
    assert_eq!(ClaimNode::live(), 3);

    assert!(grow::<ClaimNode>(10_000));
    assert_eq!(pool_size::<ClaimNode>(), 2);

    root.clear();
    assert_eq!(ClaimNode::live(), 1);

    // The first arena empties and goes; the spare stays.
    root.reset();
    assert_eq!(ClaimNode::live(), 0);
    assert_eq!(pool_size::<ClaimNode>(), 1);
    assert_eq!(TypeAllocator::<ClaimNode>::stats().unwrap().live_blocks, 0);
}

trie_node!(CountedNode, COUNTED_LIVE, 64 * 1024);

#[test]
fn live_count_tracks_nested_trees() {
    let root = CountedNode::create().unwrap();
    for key in 0..3u8 {
        let child = CountedNode::create().unwrap();
        for grandchild in 0..2u8 {
            child.insert(grandchild, CountedNode::create().unwrap());
        }
        root.insert(key, child);
    }
    assert_eq!(CountedNode::live(), 10);
    assert_eq!(root.len(), 3);

    let branch = root.child(1).unwrap();
    assert_eq!(branch.strong_count(), 2);
    drop(branch.remove(0));
    assert_eq!(CountedNode::live(), 9);

    // A second handle keeps the subtree alive after it leaves the trie.
    let kept = root.remove(2).unwrap();
    assert_eq!(CountedNode::live(), 9);
    root.clear();
    assert_eq!(CountedNode::live(), 6);
    assert_eq!(kept.len(), 2);

    drop(branch);
    assert_eq!(CountedNode::live(), 4);
    drop(kept);
    assert_eq!(CountedNode::live(), 1);
    drop(root);
    assert_eq!(CountedNode::live(), 0);
}

trie_node!(EmptyNode, EMPTY_LIVE, 4096);

#[test]
fn empty_handles_in_the_trie() {
    let root = EmptyNode::create().unwrap();
    root.insert(b'x', Shared::empty());
    assert_eq!(root.len(), 1);
    assert!(root.child(b'x').unwrap().is_none());
    assert!(root.child(b'y').is_none());
    assert_eq!(EmptyNode::live(), 1);

    root.insert(b'x', EmptyNode::create().unwrap());
    assert_eq!(EmptyNode::live(), 2);
    root.reset_child(b'x');
    assert_eq!(EmptyNode::live(), 1);
}
