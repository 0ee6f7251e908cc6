//! Parsed batch input

use serde::{Deserialize, Serialize};

/// One `BOX:` section of free-form packing text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxGroup {
    pub brand: String,
    pub box_id: String,
    /// Declared quantity (`TOTA QTE BOX n`), 0 when absent
    pub quantity: u32,
    /// 13-digit runs in order of appearance
    pub eans: Vec<String>,
}

/// One usable row of tabular input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub ean: String,
    pub brand: Option<String>,
    pub box_id: Option<String>,
}
