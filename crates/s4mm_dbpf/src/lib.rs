//! Resource index reader for Sims 4 package files.
//!
//! A package (`.package`, DBPF container) starts with a fixed-size header that
//! records where the resource index lives. The index is a flat table of
//! fixed-width records, each naming one resource by its
//! `(type, group, instance)` triple. This crate extracts those triples without
//! ever touching resource payloads, which is all conflict detection needs.
//!
//! # Example
//!
//! ```no_run
//! use s4mm_dbpf::ResourceIndexParser;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ids = ResourceIndexParser::parse("Mods/020_MainMods/better_build.package")?;
//! for id in &ids {
//!     println!("{id}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
mod error;
mod header;
mod parser;
mod resource_id;

pub use builder::PackageBuilder;
pub use error::PackageError;
pub use header::{IndexEntry, PackageHeader, HEADER_SIZE, MAGIC, MIN_HEADER_SIZE};
pub use parser::{PackageIndex, ResourceIndexParser};
pub use resource_id::{ParseResourceIdError, ResourceId};
