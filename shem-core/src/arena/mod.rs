//! Memory-mapped arenas.
//!
//! An [`Arena`] is one fixed-size backing file mapped into the address space,
//! with a best-fit free list managing the bytes inside it. Arenas are scratch
//! storage: the backing file exists only while the arena does.
//!
//! # Layout
//!
//! ```text
//! <data dir>/shem/18c5a9f0b21      one file per arena, named by hex millis
//! ┌──────────┬────────┬──────────────┬────────┬─────────────────────────┐
//! │ block    │ free   │ block        │ free   │ ...                     │
//! └──────────┴────────┴──────────────┴────────┴─────────────────────────┘
//!  ^ every block starts on a 16-byte boundary
//! ```
//!
//! Block bookkeeping is kept out of band, so the file holds nothing but
//! caller data.

mod free_list;
mod mapped;
pub mod naming;

pub use free_list::{BLOCK_ALIGN, FreeList};
pub use mapped::Arena;
