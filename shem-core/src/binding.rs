//! Per-type allocator binding.
//!
//! A type opts into pooled storage by implementing [`PoolBound`]. The first
//! allocation for that type creates a dedicated [`ArenaPool`] in the global
//! [`PoolRegistry`]; the pool then lives until the process exits.
//!
//! # Example
//!
//! ```ignore
//! use shem_core::binding::{PoolBound, TypeAllocator};
//!
//! struct ClaimNode {
//!     hash: [u8; 32],
//! }
//!
//! impl PoolBound for ClaimNode {
//!     const ARENA_SIZE: usize = 64 * 1024 * 1024;
//! }
//!
//! let ptr = TypeAllocator::<ClaimNode>::allocate(std::mem::size_of::<ClaimNode>())?;
//! TypeAllocator::<ClaimNode>::release(ptr)?;
//! ```

use crate::config::{DEFAULT_ARENA_SIZE, PoolConfig};
use crate::error::Result;
use crate::pool::{ArenaPool, PoolStats};
use parking_lot::{Mutex, RwLock};
use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::OnceLock;

/// A pool shared by every instance of one bound type.
pub type SharedPool = Mutex<ArenaPool>;

/// A type whose instances are stored in a dedicated arena pool.
pub trait PoolBound: Sized + 'static {
    /// Size of the type's first arena and of arenas added by lazy growth.
    const ARENA_SIZE: usize = DEFAULT_ARENA_SIZE;

    /// Configuration used when the type's pool is created.
    ///
    /// Defaults to the environment configuration with [`Self::ARENA_SIZE`].
    /// The pool outlives every destructor, so on Unix its backing files are
    /// unlinked as soon as they are mapped.
    fn pool_config() -> PoolConfig {
        PoolConfig::from_env_or_default()
            .with_arena_size(Self::ARENA_SIZE)
            .with_ephemeral(cfg!(unix))
    }
}

/// Registry mapping bound types to their pools.
pub struct PoolRegistry {
    /// Pools by type. Leaked so references are `'static`.
    pools: RwLock<HashMap<TypeId, &'static SharedPool>>,
}

impl PoolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Get the pool for `T`, creating it on first use.
    ///
    /// The pool is built without holding the registry lock, so
    /// [`PoolBound::pool_config`] may itself consult the registry. If two
    /// threads race, the first insert wins and the other pool is dropped.
    pub fn get_or_create<T: PoolBound>(&self) -> Result<&'static SharedPool> {
        let id = TypeId::of::<T>();
        if let Some(pool) = self.get(id) {
            return Ok(pool);
        }

        let pool = ArenaPool::with_config(T::pool_config())?;

        let mut pools = self.pools.write();
        if let Some(existing) = pools.get(&id) {
            return Ok(*existing);
        }
        let pool: &'static SharedPool = Box::leak(Box::new(Mutex::new(pool)));
        pools.insert(id, pool);
        drop(pools);

        tracing::info!(
            type_name = std::any::type_name::<T>(),
            arena_size = T::ARENA_SIZE,
            "Type pool created"
        );
        Ok(pool)
    }

    /// Get the pool for `T` if it exists, without creating it.
    pub fn find<T: PoolBound>(&self) -> Option<&'static SharedPool> {
        self.get(TypeId::of::<T>())
    }

    fn get(&self, id: TypeId) -> Option<&'static SharedPool> {
        self.pools.read().get(&id).copied()
    }

    /// Check if `T` already has a pool.
    pub fn contains<T: PoolBound>(&self) -> bool {
        self.pools.read().contains_key(&TypeId::of::<T>())
    }

    /// Number of bound types with a pool.
    pub fn len(&self) -> usize {
        self.pools.read().len()
    }

    /// True if no pool was created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global pool registry.
static GLOBAL_REGISTRY: OnceLock<PoolRegistry> = OnceLock::new();

/// Get the global pool registry, initializing it on first access.
pub fn global_registry() -> &'static PoolRegistry {
    GLOBAL_REGISTRY.get_or_init(PoolRegistry::new)
}

/// Storage operations for a bound type `T`.
///
/// All functions lock `T`'s pool only for the duration of the call.
pub struct TypeAllocator<T>(PhantomData<fn() -> T>);

impl<T: PoolBound> TypeAllocator<T> {
    /// The pool backing `T`, created on first use.
    pub fn instance() -> Result<&'static SharedPool> {
        global_registry().get_or_create::<T>()
    }

    /// Allocate `size` bytes from `T`'s pool.
    pub fn allocate(size: usize) -> Result<NonNull<u8>> {
        Self::instance()?.lock().allocate(size)
    }

    /// Release a block to `T`'s pool.
    pub fn release(ptr: NonNull<u8>) -> Result<()> {
        Self::instance()?.lock().deallocate(ptr)
    }

    /// Check whether `T`'s pool owns `ptr`.
    ///
    /// A type that never allocated owns nothing; its pool is not created.
    pub fn owns(ptr: *const u8) -> bool {
        global_registry()
            .find::<T>()
            .is_some_and(|pool| pool.lock().owns(ptr))
    }

    /// Usage figures of `T`'s pool.
    pub fn stats() -> Result<PoolStats> {
        Ok(Self::instance()?.lock().stats())
    }
}
