use crate::model::{AppointmentId, Span};
use crate::store::StoreError;

#[derive(Debug)]
pub enum ScheduleError {
    /// Invalid construction-time settings; the scheduler refuses to start.
    Config(&'static str),
    /// Caller-supplied data rejected before touching the store.
    Invalid(&'static str),
    /// No row with this id. An ordinary outcome, handled by callers.
    NotFound(i64),
    /// Would overlap an existing appointment for the same employee.
    Overlap {
        existing: AppointmentId,
        span: Span,
    },
    /// The store round-trip failed; cache state is unchanged.
    Store(StoreError),
    /// The store reported success but a post-condition re-check disagreed.
    /// Cache and store have diverged.
    Inconsistent(String),
}

impl std::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleError::Config(msg) => write!(f, "configuration error: {msg}"),
            ScheduleError::Invalid(msg) => write!(f, "invalid input: {msg}"),
            ScheduleError::NotFound(id) => write!(f, "not found: {id}"),
            ScheduleError::Overlap { existing, span } => write!(
                f,
                "[{}, {}) overlaps appointment {existing}",
                span.start, span.end
            ),
            ScheduleError::Store(e) => write!(f, "store failure: {e}"),
            ScheduleError::Inconsistent(msg) => write!(f, "cache/store divergence: {msg}"),
        }
    }
}

impl std::error::Error for ScheduleError {}

impl From<StoreError> for ScheduleError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ScheduleError::NotFound(id),
            other => ScheduleError::Store(other),
        }
    }
}
