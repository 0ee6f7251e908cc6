//! Data models for eanscout-api
//!
//! - EAN normalization
//! - Product records, adapter output, stored images
//! - Background task state machine
//! - Parsed box and table input

pub mod ean;
pub mod input;
pub mod product;
pub mod task;

pub use ean::{normalize_ean, EAN_LENGTH};
pub use input::{BoxGroup, TableRow};
pub use product::{
    NewImage, NewProduct, ProductDetails, ProductImage, ProductRecord, ResolutionStatus,
};
pub use task::{TaskKind, TaskRecord, TaskStatus};
