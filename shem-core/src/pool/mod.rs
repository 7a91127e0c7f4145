//! Pools of memory-mapped arenas.
//!
//! An [`ArenaPool`] strings arenas together so that allocation never runs
//! out while the medium has room:
//!
//! - **Lazy growth**: a new arena is created only when the last one cannot
//!   serve a request.
//! - **Eager shrink**: an arena that becomes empty through deallocation is
//!   removed (and its backing file deleted) as long as another one remains.
//! - **Address routing**: deallocation finds the owning arena by address,
//!   with a cursor caching the last owner.
//!
//! # Architecture
//!
//! ```text
//!              alloc cursor          dealloc cursor
//!                   │                     │
//!                   v                     v
//! ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────┐
//! │ Arena 0 │  │ Arena 1 │  │ Arena 2 │  │ Arena 3 │ <- spare (grow)
//! └─────────┘  └─────────┘  └─────────┘  └─────────┘
//!   creation order, at least one arena at all times
//! ```

use crate::arena::naming::{resolve_dir, unique_path};
use crate::arena::{Arena, FreeList};
use crate::config::PoolConfig;
use crate::error::{Result, ShemError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// Point-in-time usage figures for a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Number of arenas.
    pub arenas: usize,
    /// Sum of arena capacities in bytes.
    pub capacity: usize,
    /// Bytes held by live blocks.
    pub allocated_bytes: usize,
    /// Number of live blocks.
    pub live_blocks: usize,
}

/// An ordered collection of arenas with a grow/shrink policy.
///
/// Every mutating operation needs `&mut self`, so sharing a pool between
/// threads takes a lock around it.
pub struct ArenaPool {
    /// Arenas in creation order. Never empty.
    arenas: Vec<Arena>,
    /// Index of the arena tried first by `allocate`.
    alloc_cursor: usize,
    /// Index of the arena that served the last `deallocate`.
    dealloc_cursor: usize,
    /// Directory backing files are created in.
    dir: PathBuf,
    /// Configuration the pool was built with.
    config: PoolConfig,
}

impl ArenaPool {
    /// Create a pool whose first arena has `initial_size` bytes.
    ///
    /// Directory and flags come from the environment (see
    /// [`PoolConfig::from_env`]).
    pub fn new(initial_size: usize) -> Result<Self> {
        Self::with_config(PoolConfig::from_env_or_default().with_arena_size(initial_size))
    }

    /// Create a pool from a full configuration.
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        if config.arena_size == 0 {
            return Err(ShemError::invariant("arena size must be positive"));
        }

        let dir = resolve_dir(&config.arena_dir());
        let mut pool = Self {
            arenas: Vec::new(),
            alloc_cursor: 0,
            dealloc_cursor: 0,
            dir,
            config,
        };
        pool.push_arena(pool.config.arena_size)?;

        tracing::info!(
            dir = %pool.dir.display(),
            arena_size = pool.config.arena_size,
            "Arena pool created"
        );
        Ok(pool)
    }

    /// Allocate `size` bytes.
    ///
    /// Tries the allocation cursor first, then the newest arena, then grows
    /// the pool by one arena of `max(arena_size, size)` bytes. Fails only when
    /// a new arena cannot be created.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>> {
        if size == 0 {
            return Err(ShemError::invariant("zero-size allocation"));
        }
        let block = FreeList::block_size(size)
            .ok_or_else(|| ShemError::invariant(format!("allocation of {} bytes overflows", size)))?;

        loop {
            if let Some(ptr) = self.arenas[self.alloc_cursor].allocate(size) {
                return Ok(ptr);
            }

            let last = self.last_index();
            if self.alloc_cursor != last {
                // The newest arena is the most likely to have room.
                if self.arenas[last].capacity() < block {
                    tracing::debug!(
                        requested = block,
                        capacity = self.arenas[last].capacity(),
                        "Newest arena smaller than request"
                    );
                }
                self.alloc_cursor = last;
                continue;
            }

            let arena_size = self.config.arena_size.max(block);
            self.push_arena(arena_size)?;
            self.alloc_cursor = self.last_index();
            return self.arenas[self.alloc_cursor]
                .allocate(size)
                .ok_or(ShemError::ArenaCapacity {
                    requested: block,
                    available: arena_size,
                });
        }
    }

    /// Release a block previously returned by [`allocate`](Self::allocate).
    ///
    /// An address the pool does not own is rejected before anything changes.
    /// If the owning arena becomes empty and is not the only one, it is
    /// removed and its backing file deleted.
    pub fn deallocate(&mut self, ptr: NonNull<u8>) -> Result<()> {
        let raw = ptr.as_ptr().cast_const();
        let owner = if self.arenas[self.dealloc_cursor].owns(raw) {
            self.dealloc_cursor
        } else {
            self.arenas
                .iter()
                .position(|arena| arena.owns(raw))
                .ok_or(ShemError::ForeignAddress {
                    address: raw as usize,
                })?
        };

        self.arenas[owner].deallocate(Some(ptr))?;
        self.dealloc_cursor = owner;

        if self.arenas[owner].is_empty() && self.arenas.len() > 1 {
            self.remove_arena(owner);
        }
        Ok(())
    }

    /// Check whether any arena owns `ptr`.
    pub fn owns(&self, ptr: *const u8) -> bool {
        self.arenas.iter().any(|arena| arena.owns(ptr))
    }

    /// Make room for an allocation of `size` bytes ahead of demand.
    ///
    /// Keeps at most one spare arena past the allocation cursor. If a spare
    /// exists and is large enough nothing happens and `false` is returned; a
    /// spare that is too small is replaced. Otherwise a new arena of `size`
    /// bytes is appended.
    pub fn grow(&mut self, size: usize) -> Result<bool> {
        if size == 0 {
            return Err(ShemError::invariant("cannot grow by zero bytes"));
        }

        let last = self.last_index();
        if self.alloc_cursor != last {
            let spare = &self.arenas[last];
            if spare.capacity() >= size {
                return Ok(false);
            }
            // Only the cursor arena receives blocks, so the spare is empty.
            debug_assert!(spare.is_empty());
            tracing::debug!(
                capacity = spare.capacity(),
                requested = size,
                "Replacing undersized spare arena"
            );
            self.remove_arena(last);
        }

        self.push_arena(size)?;
        Ok(true)
    }

    /// Remove every empty arena, keeping at least one.
    ///
    /// Returns `true` if any arena was removed.
    pub fn shrink(&mut self) -> bool {
        let before = self.arenas.len();
        let mut index = 0;
        while index < self.arenas.len() {
            if self.arenas.len() > 1 && self.arenas[index].is_empty() {
                self.remove_arena(index);
            } else {
                index += 1;
            }
        }
        before != self.arenas.len()
    }

    /// Number of arenas (always at least 1).
    pub fn size(&self) -> usize {
        self.arenas.len()
    }

    /// Size of arenas created by lazy growth.
    pub fn arena_size(&self) -> usize {
        self.config.arena_size
    }

    /// Directory backing files are created in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Configuration the pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Iterate over the arenas in creation order.
    pub fn arenas(&self) -> impl Iterator<Item = &Arena> {
        self.arenas.iter()
    }

    /// Current usage figures.
    pub fn stats(&self) -> PoolStats {
        self.arenas.iter().fold(
            PoolStats {
                arenas: self.arenas.len(),
                capacity: 0,
                allocated_bytes: 0,
                live_blocks: 0,
            },
            |mut stats, arena| {
                stats.capacity += arena.capacity();
                stats.allocated_bytes += arena.allocated_bytes();
                stats.live_blocks += arena.live_blocks();
                stats
            },
        )
    }

    fn last_index(&self) -> usize {
        self.arenas.len() - 1
    }

    fn push_arena(&mut self, size: usize) -> Result<()> {
        let path = unique_path(&self.dir);
        let arena = if self.config.ephemeral {
            Arena::create_ephemeral(&path, size)?
        } else {
            Arena::create(&path, size)?
        };
        self.arenas.push(arena);
        tracing::debug!(
            path = %path.display(),
            size,
            arenas = self.arenas.len(),
            "Arena added to pool"
        );
        Ok(())
    }

    /// Remove the arena at `index`. Cursors that pointed at it move to the
    /// new last arena; cursors past it shift down with their arena.
    fn remove_arena(&mut self, index: usize) {
        let arena = self.arenas.remove(index);
        let last = self.last_index();
        for cursor in [&mut self.alloc_cursor, &mut self.dealloc_cursor] {
            if *cursor == index {
                *cursor = last;
            } else if *cursor > index {
                *cursor -= 1;
            }
        }
        tracing::debug!(
            path = %arena.path().display(),
            arenas = self.arenas.len(),
            "Arena removed from pool"
        );
    }
}

impl std::fmt::Debug for ArenaPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaPool")
            .field("arenas", &self.arenas)
            .field("alloc_cursor", &self.alloc_cursor)
            .field("dealloc_cursor", &self.dealloc_cursor)
            .field("dir", &self.dir)
            .finish()
    }
}
