// ABOUTME: Events emitted while streaming demo generation, regeneration and modification
// ABOUTME: Each event is a name plus a JSON payload, mapped one-to-one onto SSE events

use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::{DemoPlatform, DemoStructure, PlatformKind};

/// Ordered, finite sequence of demo events; always ends with a terminal event
pub type DemoEventStream = BoxStream<'static, DemoEvent>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DemoEvent {
    Init {
        total_pages: usize,
        project_name: String,
        platforms: Vec<DemoPlatform>,
        shared_state: Map<String, Value>,
    },
    PageStart {
        #[serde(skip_serializing_if = "Option::is_none")]
        platform: Option<PlatformKind>,
        page_id: String,
        page_name: String,
    },
    PageProgress {
        page_id: String,
        chunk: String,
    },
    PageComplete {
        page_id: String,
        code: String,
    },
    PageError {
        page_id: String,
        error: String,
    },
    Complete {
        demo_project: DemoStructure,
    },
    Error {
        message: String,
    },
    ModifyStart {
        page_id: String,
        instruction: String,
    },
    ModifyProgress {
        page_id: String,
        chunk: String,
    },
    ModifyComplete {
        page_id: String,
        code: String,
    },
}

impl DemoEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DemoEvent::Init { .. } => "init",
            DemoEvent::PageStart { .. } => "page_start",
            DemoEvent::PageProgress { .. } => "page_progress",
            DemoEvent::PageComplete { .. } => "page_complete",
            DemoEvent::PageError { .. } => "page_error",
            DemoEvent::Complete { .. } => "complete",
            DemoEvent::Error { .. } => "error",
            DemoEvent::ModifyStart { .. } => "modify_start",
            DemoEvent::ModifyProgress { .. } => "modify_progress",
            DemoEvent::ModifyComplete { .. } => "modify_complete",
        }
    }

    /// Events after which nothing else is emitted
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DemoEvent::Complete { .. } | DemoEvent::Error { .. } | DemoEvent::ModifyComplete { .. }
        )
    }

    pub fn payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub(crate) fn error(message: impl ToString) -> Self {
        DemoEvent::Error {
            message: message.to_string(),
        }
    }
}
