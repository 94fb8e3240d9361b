use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use spyglass_proto::{AgentUpdate, TaskPhase};

/// Most recent actions kept in the activity log, newest first.
pub const ACTIVITY_LOG_CAP: usize = 20;

/// How long the desktop overlay should stay out of the way after a
/// pointer-related action.
pub const POINTER_OVERLAY_HIDE: Duration = Duration::from_secs(3);

/// Title shown before the server names the thread.
pub const DEFAULT_TITLE: &str = "AI Agent Task";

pub const TASK_COMPLETED_MARKER: &str = "Task completed successfully";
pub const TASK_FAILED_MARKER: &str = "Task failed";

const POINTER_KEYWORDS: [&str; 7] = [
    "clicking",
    "double-clicking",
    "right-clicking",
    "dragging",
    "mouse",
    "moving mouse",
    "scroll",
];

/// Returns the pointer keyword matched by an action description, if any.
/// Case-insensitive substring match.
#[must_use]
pub fn pointer_keyword(description: &str) -> Option<&'static str> {
    let normalized = description.to_ascii_lowercase();
    POINTER_KEYWORDS
        .iter()
        .find(|keyword| normalized.contains(*keyword))
        .copied()
}

/// The three revealed fields of the snapshot. Used to route reveal-completion
/// signals back into [`ActivitySnapshot::settle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityField {
    Action,
    Thinking,
    Progress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityLogEntry {
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// Side effects of one fold step, returned as data rather than performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// The snapshot changed and a redraw is worthwhile.
    pub changed: bool,
    /// The desktop overlay should hide itself for this long. Set when an
    /// action description matches a pointer keyword, so the overlay never
    /// sits under the agent's own cursor.
    pub overlay_hide: Option<Duration>,
}

/// Folded view of everything the agent is currently doing on one thread.
///
/// The `*_live` flags mean "new content arrived and its reveal has not
/// finished"; they are set here and cleared by [`Self::settle`] when the
/// presentation layer reports the reveal complete. That keeps "content
/// arrived" and "animation finished" decoupled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivitySnapshot {
    pub title: String,
    pub current_action: String,
    pub action_live: bool,
    pub thinking: String,
    pub thinking_live: bool,
    pub progress: String,
    pub progress_live: bool,
    pub log: VecDeque<ActivityLogEntry>,
}

impl ActivitySnapshot {
    /// Fold one update into the snapshot, stamping log entries with `Utc::now()`.
    pub fn apply(&mut self, update: &AgentUpdate) -> ApplyOutcome {
        self.apply_at(update, Utc::now())
    }

    /// Fold one update with an injected clock.
    pub fn apply_at(&mut self, update: &AgentUpdate, now: DateTime<Utc>) -> ApplyOutcome {
        let mut outcome = ApplyOutcome {
            changed: true,
            overlay_hide: None,
        };
        match update {
            AgentUpdate::ConnectionEstablished { thread_title, .. } => {
                self.title = thread_title
                    .as_deref()
                    .filter(|title| !title.trim().is_empty())
                    .unwrap_or(DEFAULT_TITLE)
                    .to_string();
            }
            AgentUpdate::AgentAction { description, .. } => {
                self.set_action(description);
                self.log.push_front(ActivityLogEntry {
                    description: description.clone(),
                    timestamp: now,
                });
                self.log.truncate(ACTIVITY_LOG_CAP);
                if pointer_keyword(description).is_some() {
                    outcome.overlay_hide = Some(POINTER_OVERLAY_HIDE);
                }
            }
            AgentUpdate::AgentThinking { thinking, .. } => {
                if !self.thinking.is_empty() {
                    self.thinking.push('\n');
                }
                self.thinking.push_str(thinking);
                self.thinking_live = true;
            }
            AgentUpdate::TaskStatus {
                status,
                subtask_info,
                ..
            } => {
                if let Some(message) = subtask_info
                    .as_ref()
                    .and_then(|info| info.message.as_deref())
                {
                    self.progress = message.to_string();
                    self.progress_live = true;
                }
                match TaskPhase::parse(status) {
                    TaskPhase::TaskCompleted => {
                        self.set_action(TASK_COMPLETED_MARKER);
                        self.progress = TASK_COMPLETED_MARKER.to_string();
                        self.progress_live = true;
                    }
                    TaskPhase::TaskFailed => {
                        self.set_action(TASK_FAILED_MARKER);
                        self.progress = TASK_FAILED_MARKER.to_string();
                        self.progress_live = true;
                    }
                    TaskPhase::SubtaskStarted => {
                        // A new subtask starts its own thinking trace.
                        self.thinking.clear();
                    }
                    _ => {}
                }
            }
            AgentUpdate::Pong {} | AgentUpdate::Unknown { .. } => {
                outcome.changed = false;
            }
        }
        outcome
    }

    /// Clear the live flag for a field whose reveal has finished.
    pub fn settle(&mut self, field: ActivityField) {
        match field {
            ActivityField::Action => self.action_live = false,
            ActivityField::Thinking => self.thinking_live = false,
            ActivityField::Progress => self.progress_live = false,
        }
    }

    /// Return to the empty snapshot. Called when a subscription starts or
    /// definitively ends; completed and failed tasks keep their trace until
    /// then.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn set_action(&mut self, description: &str) {
        self.current_action = description.to_string();
        self.action_live = true;
    }
}
