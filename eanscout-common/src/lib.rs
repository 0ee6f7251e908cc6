//! # eanscout common library
//!
//! Shared code for the eanscout service crates:
//! - Error taxonomy (`Error`, `Result`)
//! - TOML configuration model and root folder resolution
//! - SQLite pool initialization and schema

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
