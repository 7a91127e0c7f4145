//! Error types for SHEM.
//!
//! Errors fall into three groups:
//!
//! - **Resource exhaustion**: the medium backing the arenas (disk space,
//!   address space, file handles) could not provide a new arena.
//! - **Capacity**: a freshly created arena could still not serve a request.
//! - **Invariant violations**: the caller broke the allocator contract, e.g.
//!   released an address the pool never handed out.
//!
//! Running out of room in a single arena is not an error; the pool recovers
//! from it by moving to another arena or growing.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for SHEM operations.
#[derive(Error, Debug)]
pub enum ShemError {
    // =========================================================================
    // Arena Errors (E001-E099)
    // =========================================================================
    /// Failed to create the backing file of an arena.
    #[error("E001: Failed to create arena at {path}: {cause}")]
    ArenaCreate {
        /// The path where arena creation failed.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    /// Failed to memory-map the backing file of an arena.
    #[error("E002: Failed to mmap arena at {path}: {cause}")]
    ArenaMmap {
        /// The path of the arena file.
        path: PathBuf,
        /// Reason for the mmap failure.
        cause: String,
    },

    /// A newly created arena could not serve the request.
    #[error(
        "E003: Arena capacity exceeded: requested {requested} bytes, available {available} bytes"
    )]
    ArenaCapacity {
        /// Number of bytes requested.
        requested: usize,
        /// Capacity of the arena that refused the request.
        available: usize,
    },

    // =========================================================================
    // Contract Errors (E100-E199)
    // =========================================================================
    /// The caller broke an allocator invariant.
    #[error("E101: Invariant violation: {cause}")]
    InvariantViolation {
        /// Description of the broken invariant.
        cause: String,
    },

    /// An address was released to a pool that does not own it.
    #[error("E102: Address {address:#x} is not owned by this pool")]
    ForeignAddress {
        /// The offending address.
        address: usize,
    },
}

impl ShemError {
    /// Shorthand for [`ShemError::InvariantViolation`].
    pub fn invariant(cause: impl Into<String>) -> Self {
        Self::InvariantViolation {
            cause: cause.into(),
        }
    }

    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ArenaCreate { .. } => "E001",
            Self::ArenaMmap { .. } => "E002",
            Self::ArenaCapacity { .. } => "E003",
            Self::InvariantViolation { .. } => "E101",
            Self::ForeignAddress { .. } => "E102",
        }
    }

    /// Check if this error reports a caller contract breach.
    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::InvariantViolation { .. } | Self::ForeignAddress { .. }
        )
    }

    /// Check if the backing medium ran out of resources.
    #[must_use]
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(
            self,
            Self::ArenaCreate { .. } | Self::ArenaMmap { .. } | Self::ArenaCapacity { .. }
        )
    }
}

/// Result type alias using `ShemError`.
pub type Result<T> = std::result::Result<T, ShemError>;
