//! A single memory-mapped arena.

use super::free_list::FreeList;
use crate::error::{Result, ShemError};
use fs2::FileExt;
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::mem::ManuallyDrop;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// A fixed-capacity block of mapped storage with a best-fit free list.
///
/// The arena owns its backing file exclusively: the file is created (or
/// replaced) on construction, locked for the arena's lifetime and removed
/// when the arena is dropped. Nothing written into an arena survives it.
pub struct Arena {
    /// The memory-mapped file. Unmapped first on drop.
    mmap: ManuallyDrop<MmapMut>,
    /// The underlying file handle.
    file: ManuallyDrop<File>,
    /// Path to the arena file.
    path: PathBuf,
    /// Capacity in bytes, fixed at creation.
    capacity: usize,
    /// Block bookkeeping.
    free: FreeList,
    /// Whether the backing file is still present on disk.
    linked: bool,
}

impl Arena {
    /// Create an arena of `size` bytes backed by a file at `path`.
    ///
    /// Anything already at `path` is replaced.
    pub fn create(path: impl AsRef<Path>, size: usize) -> Result<Self> {
        Self::create_with(path.as_ref(), size, false)
    }

    /// Create an arena whose backing file is unlinked right after mapping.
    ///
    /// On platforms that refuse to remove mapped files the file is kept and
    /// removed on drop as usual.
    pub fn create_ephemeral(path: impl AsRef<Path>, size: usize) -> Result<Self> {
        Self::create_with(path.as_ref(), size, true)
    }

    fn create_with(path: &Path, size: usize, ephemeral: bool) -> Result<Self> {
        if size == 0 {
            return Err(ShemError::invariant("arena size must be positive"));
        }
        if path.as_os_str().is_empty() {
            return Err(ShemError::invariant("arena path must not be empty"));
        }

        let create_err = |cause: String| ShemError::ArenaCreate {
            path: path.to_path_buf(),
            cause,
        };

        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Replaced existing arena file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(create_err(format!("Failed to replace file: {}", e))),
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| create_err(e.to_string()))?;

        let mmap = match Self::lock_and_map(&file, path, size) {
            Ok(mmap) => mmap,
            Err(e) => {
                // Close before removing the partial file.
                drop(file);
                if let Err(remove_err) = std::fs::remove_file(path) {
                    tracing::warn!(path = %path.display(), error = %remove_err, "Failed to remove partial arena file");
                }
                return Err(e);
            }
        };

        let mut arena = Self {
            mmap: ManuallyDrop::new(mmap),
            file: ManuallyDrop::new(file),
            path: path.to_path_buf(),
            capacity: size,
            free: FreeList::new(size),
            linked: true,
        };

        if ephemeral {
            match std::fs::remove_file(&arena.path) {
                Ok(()) => arena.linked = false,
                Err(e) => {
                    tracing::warn!(path = %arena.path.display(), error = %e, "Could not unlink mapped arena file");
                }
            }
        }

        tracing::debug!(path = %arena.path.display(), capacity = size, ephemeral, "Arena created");
        Ok(arena)
    }

    fn lock_and_map(file: &File, path: &Path, size: usize) -> Result<MmapMut> {
        let create_err = |cause: String| ShemError::ArenaCreate {
            path: path.to_path_buf(),
            cause,
        };

        file.try_lock_exclusive()
            .map_err(|e| create_err(format!("Failed to lock file: {}", e)))?;

        let len = u64::try_from(size).map_err(|e| create_err(e.to_string()))?;
        file.set_len(len).map_err(|e| create_err(e.to_string()))?;

        unsafe {
            MmapOptions::new()
                .len(size)
                .map_mut(file)
                .map_err(|e| ShemError::ArenaMmap {
                    path: path.to_path_buf(),
                    cause: e.to_string(),
                })
        }
    }

    /// Allocate `size` bytes.
    ///
    /// Returns `None` when no free block is large enough or `size` is zero.
    /// Blocks are aligned to [`BLOCK_ALIGN`](super::BLOCK_ALIGN).
    pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        let offset = self.free.allocate(size)?;
        // `offset` lies inside the mapping.
        NonNull::new(unsafe { self.mmap.as_mut_ptr().add(offset) })
    }

    /// Return a block to the free list.
    ///
    /// `None` is a no-op. Addresses outside the arena, or inside it but not
    /// at the start of a live block, are invariant violations.
    pub fn deallocate(&mut self, ptr: Option<NonNull<u8>>) -> Result<()> {
        let Some(ptr) = ptr else {
            return Ok(());
        };
        let offset = self.offset_of(ptr.as_ptr()).ok_or(ShemError::ForeignAddress {
            address: ptr.as_ptr() as usize,
        })?;
        self.free.deallocate(offset).map(|_| ()).ok_or_else(|| {
            ShemError::invariant(format!(
                "offset {:#x} of arena {} is not a live block",
                offset,
                self.path.display()
            ))
        })
    }

    /// Check whether `ptr` lies inside this arena.
    pub fn owns(&self, ptr: *const u8) -> bool {
        self.offset_of(ptr).is_some()
    }

    /// True when no bytes are allocated.
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes held by live blocks.
    pub fn allocated_bytes(&self) -> usize {
        self.free.live_bytes()
    }

    /// Number of live blocks.
    pub fn live_blocks(&self) -> usize {
        self.free.live_blocks()
    }

    /// Get the path to the arena file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn offset_of(&self, ptr: *const u8) -> Option<usize> {
        let base = self.mmap.as_ptr() as usize;
        let addr = ptr as usize;
        (addr >= base && addr - base < self.capacity).then(|| addr - base)
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .field("allocated", &self.free.live_bytes())
            .field("blocks", &self.free.live_blocks())
            .finish()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&*self.file);

        // Unmap and close before removal; some platforms refuse to delete
        // files that are still mapped or open.
        unsafe {
            ManuallyDrop::drop(&mut self.mmap);
            ManuallyDrop::drop(&mut self.file);
        }

        if self.linked {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove arena file");
            }
        }
        tracing::debug!(path = %self.path.display(), "Arena released");
    }
}
