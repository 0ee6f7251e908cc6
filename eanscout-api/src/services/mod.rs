//! Service modules for EAN resolution
//!
//! - `resolution_pipeline`: cache check, adapter fan-out, persistence
//! - `image_acquirer`: image download, upload, normalization, storage
//! - `task_registry`: background execution and status polling
//! - `text_extractor`: box text and CSV parsing

pub mod image_acquirer;
pub mod resolution_pipeline;
pub mod task_registry;
pub mod text_extractor;

pub use image_acquirer::ImageAcquirer;
pub use resolution_pipeline::ResolutionPipeline;
pub use task_registry::TaskRegistry;
pub use text_extractor::{parse_boxes, parse_table};
