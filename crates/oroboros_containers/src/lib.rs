//! # OROBOROS Containers
//!
//! Data structures that live entirely inside an OROBOROS memory [`Context`].
//!
//! Every container is a small `Copy` handle around the key of a header
//! allocation. Records reference each other by [`AllocKey`] and byte offset
//! only, so a page holding a container can be compacted and its allocations
//! reallocated without invalidating anything.
//!
//! | Container          | Records                         | Lookup       |
//! |--------------------|---------------------------------|--------------|
//! | [`Dictionary`]     | header, bucket table, pairs     | O(1) average |
//! | [`List`]           | header, nodes (active + free)   | O(1) links   |
//! | [`UniqueList`]     | same as [`List`]                | O(n) inserts |
//! | [`CircularBuffer`] | header, storage                 | O(1)         |
//!
//! ## Example
//!
//! ```rust,ignore
//! use oroboros_containers::Dictionary;
//!
//! let page = ctx.alloc_page(1024)?;
//! let database = ctx.allocate(page, 512)?;
//! let stats = Dictionary::create(&mut ctx, page, None, 101, database)?;
//!
//! ctx.write_pod(database, 0, &100u32)?;
//! stats.set(&mut ctx, b"health", 0)?;
//! assert_eq!(stats.get_value::<u32>(&ctx, b"health")?, Some(100));
//! ```
//!
//! [`Context`]: oroboros_memory::Context
//! [`AllocKey`]: oroboros_memory::AllocKey

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod circular_buffer;
pub mod dictionary;
pub mod error;
pub mod hash;
pub mod list;
pub mod unique_list;

pub use circular_buffer::CircularBuffer;
pub use dictionary::Dictionary;
pub use error::{ContainerError, ContainerResult};
pub use hash::{fnv1a_hash, polynomial_hash, sip_hash, HashFn};
pub use list::{List, NodeData};
pub use unique_list::UniqueList;
