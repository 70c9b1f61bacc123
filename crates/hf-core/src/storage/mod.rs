//! Persistence layer
//!
//! This module provides the string key-value backends the store writes
//! through, and the versioned JSON schema of the persisted blob.

mod backend;
mod format;

pub use backend::*;
pub use format::*;
