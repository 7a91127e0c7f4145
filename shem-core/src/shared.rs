//! Shared ownership handles for pooled values.
//!
//! [`Shared<T>`] is a reference-counted pointer whose value lives in the pool
//! bound to `T`. Cloning shares the value; dropping the last handle drops the
//! value and returns its block to the pool, which may in turn reclaim an
//! emptied arena and delete its backing file.
//!
//! # Memory Layout
//!
//! ```text
//! T's pool
//! ┌──────────────────────────────┐
//! │ strong: Cell<usize> │ value: T │  one block per shared value
//! └──────────────────────────────┘
//!        ^
//!        └── Shared<T>, Shared<T>, ... (all handles point here)
//! ```

use crate::arena::BLOCK_ALIGN;
use crate::binding::{PoolBound, TypeAllocator};
use crate::error::{Result, ShemError};
use std::alloc::Layout;
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::{self, NonNull};

/// The pooled block behind a set of handles.
struct SharedBox<T> {
    strong: Cell<usize>,
    value: T,
}

/// A reference-counted handle to a value stored in `T`'s pool.
///
/// Handles are neither `Send` nor `Sync`: the count is not atomic.
pub struct Shared<T: PoolBound> {
    ptr: Option<NonNull<SharedBox<T>>>,
    _marker: PhantomData<SharedBox<T>>,
}

impl<T: PoolBound> Shared<T> {
    /// Move `value` into `T`'s pool and return the only handle to it.
    pub fn new(value: T) -> Result<Self> {
        let layout = Layout::new::<SharedBox<T>>();
        if layout.align() > BLOCK_ALIGN {
            return Err(ShemError::invariant(format!(
                "{} needs alignment {}, arena blocks provide {}",
                std::any::type_name::<T>(),
                layout.align(),
                BLOCK_ALIGN
            )));
        }

        let ptr = TypeAllocator::<T>::allocate(layout.size())?.cast::<SharedBox<T>>();
        unsafe {
            ptr.as_ptr().write(SharedBox {
                strong: Cell::new(1),
                value,
            });
        }
        Ok(Self {
            ptr: Some(ptr),
            _marker: PhantomData,
        })
    }

    /// A handle that owns nothing.
    pub const fn empty() -> Self {
        Self {
            ptr: None,
            _marker: PhantomData,
        }
    }

    /// True if the handle owns a value.
    pub fn is_some(&self) -> bool {
        self.ptr.is_some()
    }

    /// True if the handle is empty.
    pub fn is_none(&self) -> bool {
        self.ptr.is_none()
    }

    /// Borrow the value, if any.
    pub fn get(&self) -> Option<&T> {
        self.ptr.map(|ptr| unsafe { &(*ptr.as_ptr()).value })
    }

    /// Mutably borrow the value if this is the only handle to it.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        let ptr = self.ptr?;
        unsafe {
            if (*ptr.as_ptr()).strong.get() == 1 {
                Some(&mut (*ptr.as_ptr()).value)
            } else {
                None
            }
        }
    }

    /// Address of the value, or null for an empty handle.
    pub fn as_ptr(&self) -> *const T {
        match self.ptr {
            Some(ptr) => unsafe { ptr::addr_of!((*ptr.as_ptr()).value) },
            None => ptr::null(),
        }
    }

    /// Number of handles sharing the value (0 when empty).
    pub fn strong_count(&self) -> usize {
        self.ptr
            .map_or(0, |ptr| unsafe { (*ptr.as_ptr()).strong.get() })
    }

    /// True if both handles share the same value (or are both empty).
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.ptr == other.ptr
    }

    /// Replace the value with a freshly pooled `value`, releasing the old one.
    pub fn set(&mut self, value: T) -> Result<()> {
        let fresh = Self::new(value)?;
        *self = fresh;
        Ok(())
    }

    /// Release the value early, leaving the handle empty.
    pub fn reset(&mut self) {
        let Some(ptr) = self.ptr.take() else {
            return;
        };

        let remaining = unsafe {
            let strong = &(*ptr.as_ptr()).strong;
            strong.set(strong.get() - 1);
            strong.get()
        };
        if remaining > 0 {
            return;
        }

        unsafe { ptr::drop_in_place(ptr::addr_of_mut!((*ptr.as_ptr()).value)) };
        if let Err(e) = TypeAllocator::<T>::release(ptr.cast()) {
            panic!(
                "releasing Shared<{}> broke the pool: {}",
                std::any::type_name::<T>(),
                e
            );
        }
    }
}

impl<T: PoolBound> Clone for Shared<T> {
    fn clone(&self) -> Self {
        if let Some(ptr) = self.ptr {
            let strong = unsafe { &(*ptr.as_ptr()).strong };
            strong.set(strong.get() + 1);
        }
        Self {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if !Self::ptr_eq(self, source) {
            *self = source.clone();
        }
    }
}

impl<T: PoolBound> Drop for Shared<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: PoolBound> Default for Shared<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: PoolBound> Deref for Shared<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the handle is empty.
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!(
                "dereferenced an empty Shared<{}>",
                std::any::type_name::<T>()
            ),
        }
    }
}

impl<T: PoolBound> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T: PoolBound> Eq for Shared<T> {}

impl<T: PoolBound + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("Shared").field(value).finish(),
            None => f.write_str("Shared(empty)"),
        }
    }
}
