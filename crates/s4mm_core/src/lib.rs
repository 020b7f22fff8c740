//! Core shared model for Sims 4 mod deployment.
//!
//! This crate provides the types exchanged between the mod scanner, the
//! deployment pipeline (`s4mm_deploy`) and the `s4mm` front end, plus the
//! host-game process query the pipeline consults before touching disk.

mod hash;
mod mod_file;
pub mod process;

pub use hash::{format_hash, hash_bytes, hash_file};
pub use mod_file::{ContentType, ModFile};
pub use process::{ProcessConfig, ProcessManager, SysinfoProcessManager};
