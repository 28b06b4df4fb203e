//! # OROBOROS Memory
//!
//! Relocatable-handle memory substrate for the OROBOROS engine.
//!
//! Every subsystem (config, game, physics, graphics) keeps its state inside a
//! [`Context`]: one pre-sized byte arena it owns outright. Inside a context,
//! data is never addressed by pointer. Callers hold keys and resolve them to
//! bytes only for as long as they need the bytes:
//!
//! ```text
//! MemorySystem
//!   └─ Context (heap: Box<[u8]>)
//!        ├─ Page ─┬─ AllocKey ─> map() ─> Mapping<'_> (&mut [u8])
//!        │        └─ AllocKey ─> view() ─> &[u8]
//!        └─ RawKey ─> map_raw() / view_raw()
//! ```
//!
//! ## Design Principles
//!
//! 1. **Handles, not addresses** - allocations may move on realloc or
//!    compaction; keys stay valid
//! 2. **Generational keys** - freed slots bump their generation, so stale keys
//!    fail with [`MemoryError::StaleKey`] instead of aliasing new data
//! 3. **Borrow-checked pinning** - a [`Mapping`] borrows its context mutably;
//!    nothing moves while it lives
//! 4. **No globals** - ID counters, seeds and frame time live in values
//!
//! ## Example
//!
//! ```rust,ignore
//! use oroboros_memory::{MemorySystem, MemoryConfig};
//!
//! let mut memory = MemorySystem::from_config(&MemoryConfig::default())?;
//! let game = memory.context_by_name_mut("game").unwrap();
//!
//! let page = game.alloc_named_page("player", 1024)?;
//! let health = game.allocate(page, 4)?;
//! game.write_pod(health, 0, &100u32)?;
//!
//! let health = game.realloc(health, 8)?; // may move, key still resolves
//! assert_eq!(game.read_pod::<u32>(health, 0)?, 100);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod constants;
pub mod context;
pub mod debug;
pub mod error;
mod free_list;
pub mod key;
pub mod mapping;
pub mod page;
mod raw;
mod slots;
pub mod system;

pub use config::{ConfigError, ContextConfig, IdMode, IdentityConfig, MemoryConfig};
pub use context::Context;
pub use debug::{DebugLayout, EventKind, MemoryEvent, PageRecord};
pub use error::{MemoryError, MemoryResult};
pub use key::{AllocId, AllocKey, ContextId, PageId, PageKey, RawKey};
pub use mapping::{read_pod, write_pod, Mapping};
pub use page::{PageStats, PageStatus};
pub use system::MemorySystem;
