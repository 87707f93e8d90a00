use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Uploading,
    Ready,
    Processing,
    Displaying,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEvent {
    FileSelected,
    UploadSucceeded,
    UploadFailed,
    GenerateRequested,
    GenerationSucceeded,
    GenerationFailed,
    Reset,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("{event:?} is not allowed while {from}")]
pub struct InvalidTransition {
    pub from: WorkflowState,
    pub event: WorkflowEvent,
}

impl WorkflowState {
    pub fn apply(self, event: WorkflowEvent) -> Result<WorkflowState, InvalidTransition> {
        use WorkflowEvent::*;
        use WorkflowState::*;

        let next = match (self, event) {
            (_, Reset) => Idle,
            (Idle | Uploading | Ready | Displaying | Error, FileSelected) => Uploading,
            (Uploading, UploadSucceeded) => Ready,
            (Uploading, UploadFailed) => Error,
            (Ready, GenerateRequested) => Processing,
            (Processing, GenerationSucceeded) => Displaying,
            // the uploaded asset is still valid, so a failed run can be retried
            (Processing, GenerationFailed) => Ready,
            (from, event) => return Err(InvalidTransition { from, event }),
        };
        Ok(next)
    }

    pub fn action_enabled(self) -> bool {
        self == WorkflowState::Ready
    }

    pub fn holds_asset(self) -> bool {
        matches!(
            self,
            WorkflowState::Ready | WorkflowState::Processing | WorkflowState::Displaying
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Uploading => "uploading",
            WorkflowState::Ready => "ready",
            WorkflowState::Processing => "processing",
            WorkflowState::Displaying => "displaying",
            WorkflowState::Error => "error",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
