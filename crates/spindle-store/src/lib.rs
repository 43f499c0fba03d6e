//! Entity storage for Spindle.
//!
//! The engines only see the [`Store`] trait. [`SqliteStore`] implements it on
//! a single SQLite file; claims are single conditional `UPDATE ... RETURNING`
//! statements, so two processes sharing one database never run the same job.

mod error;
mod sqlite;
mod store;
mod types;

pub use error::StoreError;
pub use sqlite::{INTERRUPTED_ERROR, SqliteStore};
pub use store::Store;
pub use types::*;
