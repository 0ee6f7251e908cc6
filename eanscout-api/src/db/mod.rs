//! Database access for eanscout-api
//!
//! Pool creation and schema live in `eanscout_common::db`; this module
//! holds the product store built on top of that pool.

pub mod products;

pub use products::ProductStore;
