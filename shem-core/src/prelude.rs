//! Prelude for convenient imports.
//!
//! # Example
//!
//! ```ignore
//! use shem_core::prelude::*;
//! ```

// Storage
pub use crate::arena::{Arena, BLOCK_ALIGN};
pub use crate::pool::{ArenaPool, PoolStats};

// Binding and handles
pub use crate::binding::{PoolBound, PoolRegistry, SharedPool, TypeAllocator, global_registry};
pub use crate::container::ContainerAllocator;
pub use crate::shared::Shared;

// Configuration
pub use crate::config::{DEFAULT_ARENA_SIZE, PoolConfig};

// Error handling
pub use crate::error::{Result, ShemError};

// Pool-backed collections
pub use allocator_api2::boxed::Box as PoolBox;
pub use allocator_api2::vec::Vec as PoolVec;
