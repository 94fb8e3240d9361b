//! Pure state for the activity view: the fold over server updates and the
//! word-chunked text reveal. No I/O and no timers live here; callers drive
//! both from their own event loop so tests can advance time deterministically.

mod activity;
mod reveal;

pub use activity::{
    ACTIVITY_LOG_CAP, ActivityField, ActivityLogEntry, ActivitySnapshot, ApplyOutcome,
    DEFAULT_TITLE, POINTER_OVERLAY_HIDE, TASK_COMPLETED_MARKER, TASK_FAILED_MARKER,
    pointer_keyword,
};
pub use reveal::{RevealProgress, RevealState};
