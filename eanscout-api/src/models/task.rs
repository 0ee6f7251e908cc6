//! Background task state machine
//!
//! PENDING → PROCESSING → COMPLETED | FAILED

use super::ProductRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Accepted, waiting for an execution slot
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Work carried by a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    Ean { ean: String, brand: Option<String> },
    Box { box_data: String },
    Table { csv_data: String },
}

impl TaskKind {
    fn id_prefix(&self) -> &'static str {
        match self {
            TaskKind::Ean { .. } => "ean_task",
            TaskKind::Box { .. } => "box_task",
            TaskKind::Table { .. } => "table_task",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Ean { .. } => "ean",
            TaskKind::Box { .. } => "box",
            TaskKind::Table { .. } => "table",
        }
    }

    fn pending_message(&self) -> String {
        match self {
            TaskKind::Ean { ean, .. } => format!("Processing EAN {}", ean),
            TaskKind::Box { .. } => "Processing box data".to_string(),
            TaskKind::Table { .. } => "Processing table data".to_string(),
        }
    }
}

/// Snapshot of one task, as returned to pollers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub kind: String,
    pub status: TaskStatus,
    pub message: String,
    /// Present once completed
    pub results: Option<Vec<ProductRecord>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn new(kind: &TaskKind) -> Self {
        Self {
            task_id: format!("{}_{}", kind.id_prefix(), Uuid::new_v4()),
            kind: kind.label().to_string(),
            status: TaskStatus::Pending,
            message: kind.pending_message(),
            results: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Apply a state change; terminal records never change again
    ///
    /// Returns false when the record was already terminal.
    pub fn transition_to(&mut self, new_status: TaskStatus, message: Option<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        self.status = new_status;
        if let Some(message) = message {
            self.message = message;
        }
        if new_status.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        true
    }

    pub fn complete(&mut self, results: Vec<ProductRecord>, message: String) -> bool {
        if !self.transition_to(TaskStatus::Completed, Some(message)) {
            return false;
        }
        self.results = Some(results);
        true
    }

    pub fn fail(&mut self, message: String) -> bool {
        self.transition_to(TaskStatus::Failed, Some(message))
    }
}
