//! Event log for a test run
//!
//! Audit trail of what the pipeline and the platform dispatcher did.
//! - Event: envelope with id + timestamp + kind
//! - EventKind: pipeline level, task level and lifecycle variants
//! - EventLog: thread-safe, append-only log

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::platform::{BuildTarget, LifecycleEvent};

/// Single event in the run log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since the log was created (ms)
    pub timestamp_ms: u64,
    pub kind: EventKind,
}

/// All possible event types
///
/// Task names are `Arc<str>` so emitting per step stays cheap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // PIPELINE LEVEL
    // ═══════════════════════════════════════════
    PipelineStarted {
        task_count: usize,
    },
    PipelineSuspended {
        task_index: usize,
        step: usize,
    },
    PipelineResumed {
        task_index: usize,
        step: usize,
    },
    PipelineCompleted {
        total_duration_ms: u64,
    },
    PipelineFailed {
        error: String,
        failed_task: Option<Arc<str>>,
    },

    // ═══════════════════════════════════════════
    // TASK LEVEL
    // ═══════════════════════════════════════════
    TaskStarted {
        task: Arc<str>,
        index: usize,
    },
    TaskYielded {
        task: Arc<str>,
        step: usize,
    },
    TaskCompleted {
        task: Arc<str>,
        steps: usize,
        duration_ms: u64,
    },
    TaskFailed {
        task: Arc<str>,
        step: usize,
        error: String,
    },

    // ═══════════════════════════════════════════
    // CLASSIFIER / PLATFORM
    // ═══════════════════════════════════════════
    ModulesClassified {
        edit_mode: usize,
        play_mode: usize,
    },
    LifecycleDispatched {
        target: BuildTarget,
        event: LifecycleEvent,
    },
}

impl EventKind {
    /// Task name if the event is task-related
    pub fn task(&self) -> Option<&str> {
        match self {
            Self::TaskStarted { task, .. }
            | Self::TaskYielded { task, .. }
            | Self::TaskCompleted { task, .. }
            | Self::TaskFailed { task, .. } => Some(task),
            _ => None,
        }
    }

    pub fn is_pipeline_event(&self) -> bool {
        matches!(
            self,
            Self::PipelineStarted { .. }
                | Self::PipelineSuspended { .. }
                | Self::PipelineResumed { .. }
                | Self::PipelineCompleted { .. }
                | Self::PipelineFailed { .. }
        )
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        self.events.write().push(event);
        id
    }

    /// All events (cloned)
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    pub fn filter_task(&self, task: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.task() == Some(task))
            .collect()
    }

    pub fn pipeline_events(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.is_pipeline_event())
            .collect()
    }

    /// Lifecycle events handled so far, in order
    pub fn dispatched(&self) -> Vec<LifecycleEvent> {
        self.events
            .read()
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::LifecycleDispatched { event, .. } => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Serialize to JSON for persistence/debugging
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.events()).unwrap_or(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.len())
            .finish()
    }
}
