use thiserror::Error;

use crate::models::SourcePosition;

/// A structural problem with a manifest. Fatal: the first one aborts the pass.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}{message}", .position.as_ref().map(|p| format!("{p}: ")).unwrap_or_default())]
pub struct BomError {
    pub message: String,
    pub position: Option<SourcePosition>,
}

impl BomError {
    pub fn new(message: impl Into<String>, position: Option<SourcePosition>) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}
