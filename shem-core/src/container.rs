//! Container storage adapter.
//!
//! [`ContainerAllocator<A>`] lets collections draw their internal storage
//! from the pool of a bound type `A`, so auxiliary structures (a node's child
//! list, say) live next to their owner. It implements
//! [`allocator_api2::alloc::Allocator`] and therefore plugs into
//! `allocator_api2::vec::Vec`, `allocator_api2::boxed::Box` and any other
//! collection built on that trait.
//!
//! The adapter is a stateless view of a process-wide pool: every instance
//! for the same `A` compares equal, and collections can be moved, cloned or
//! swapped freely.

use crate::arena::BLOCK_ALIGN;
use crate::binding::{PoolBound, TypeAllocator};
use crate::error::{Result, ShemError};
use allocator_api2::alloc::{AllocError, Allocator};
use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// Allocator drawing from the pool bound to `A`.
pub struct ContainerAllocator<A>(PhantomData<fn() -> A>);

impl<A: PoolBound> ContainerAllocator<A> {
    /// Create an adapter for `A`'s pool.
    pub const fn new() -> Self {
        Self(PhantomData)
    }

    /// Allocate uninitialized storage for `count` values of `T`.
    pub fn allocate_array<T>(&self, count: usize) -> Result<NonNull<T>> {
        if std::mem::align_of::<T>() > BLOCK_ALIGN {
            return Err(ShemError::invariant(format!(
                "alignment {} exceeds arena block alignment {}",
                std::mem::align_of::<T>(),
                BLOCK_ALIGN
            )));
        }
        let size = std::mem::size_of::<T>()
            .checked_mul(count)
            .ok_or_else(|| ShemError::invariant("array size overflows"))?;
        TypeAllocator::<A>::allocate(size).map(NonNull::cast)
    }

    /// Release storage obtained from [`allocate_array`](Self::allocate_array).
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate_array` on an adapter for the same `A`
    /// and must not be used afterwards. Values stored in it are not dropped.
    pub unsafe fn deallocate_array<T>(&self, ptr: NonNull<T>, _count: usize) -> Result<()> {
        TypeAllocator::<A>::release(ptr.cast())
    }

    /// Move `value` into uninitialized storage.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writes and properly aligned.
    pub unsafe fn construct<T>(&self, ptr: NonNull<T>, value: T) {
        unsafe { ptr.as_ptr().write(value) }
    }

    /// Drop the value at `ptr` in place, leaving the storage allocated.
    ///
    /// # Safety
    ///
    /// `ptr` must point to an initialized `T` that is not used afterwards.
    pub unsafe fn destroy<T>(&self, ptr: NonNull<T>) {
        unsafe { std::ptr::drop_in_place(ptr.as_ptr()) }
    }

    /// Largest number of `T` a single request could describe.
    pub const fn max_size<T>(&self) -> usize {
        let size = std::mem::size_of::<T>();
        if size == 0 { usize::MAX } else { usize::MAX / size }
    }
}

unsafe impl<A: PoolBound> Allocator for ContainerAllocator<A> {
    fn allocate(&self, layout: Layout) -> std::result::Result<NonNull<[u8]>, AllocError> {
        if layout.align() > BLOCK_ALIGN {
            tracing::error!(align = layout.align(), "Container alignment exceeds arena blocks");
            return Err(AllocError);
        }
        if layout.size() == 0 {
            // Alignment is non-zero, so this is a valid dangling address.
            let dangling = unsafe { NonNull::new_unchecked(layout.align() as *mut u8) };
            return Ok(NonNull::slice_from_raw_parts(dangling, 0));
        }

        match TypeAllocator::<A>::allocate(layout.size()) {
            Ok(ptr) => Ok(NonNull::slice_from_raw_parts(ptr, layout.size())),
            Err(e) => {
                tracing::error!(error = %e, size = layout.size(), "Container allocation failed");
                Err(AllocError)
            }
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        if let Err(e) = TypeAllocator::<A>::release(ptr) {
            panic!("container storage released to the wrong pool: {}", e);
        }
    }
}

impl<A> Clone for ContainerAllocator<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for ContainerAllocator<A> {}

impl<A: PoolBound> Default for ContainerAllocator<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> PartialEq for ContainerAllocator<A> {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl<A> Eq for ContainerAllocator<A> {}

impl<A> fmt::Debug for ContainerAllocator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContainerAllocator<{}>", std::any::type_name::<A>())
    }
}
