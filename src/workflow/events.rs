//! Events emitted as the workflow advances.
//!
//! Every observer sees the same stream: the terminal UI renders it live and
//! the HTTP server forwards it over WebSocket as JSON, one event per frame.

use crate::transcript::{ChatMessage, LogEntry};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A new run was kicked off
    RunStarted { run_id: Uuid, prompt: String },
    /// A stage began working
    StageStarted { id: u32, name: String },
    /// Progress report from a running stage
    StageProgress { id: u32, progress: u8 },
    /// A stage finished successfully
    StageCompleted { id: u32, name: String },
    /// A stage failed
    StageFailed { id: u32, name: String, error: String },
    /// A stage was blocked by an upstream failure
    StageBlocked { id: u32, waiting_on: Vec<u32> },
    /// A previously blocked stage returned to Idle
    StageUnblocked { id: u32 },
    /// A chat message was appended to the transcript
    Chat { message: ChatMessage },
    /// A line was appended to the activity log
    Log { entry: LogEntry },
    /// The Coder stage replaced the workspace file set
    FilesGenerated { count: usize, entry_point: Option<String> },
    /// The run settled, successfully or not
    RunFinished { run_id: Uuid, success: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_internally_tagged() {
        let event = WorkflowEvent::StageProgress { id: 3, progress: 40 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stage_progress");
        assert_eq!(json["id"], 3);
        assert_eq!(json["progress"], 40);
    }

    #[test]
    fn test_failed_event_round_trip() {
        let event = WorkflowEvent::StageFailed {
            id: 3,
            name: "Coder Agent".to_string(),
            error: "AI failed to generate code files".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: WorkflowEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_blocked_event_shape() {
        let event = WorkflowEvent::StageBlocked {
            id: 4,
            waiting_on: vec![3],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stage_blocked");
        assert_eq!(json["waiting_on"][0], 3);
    }
}
