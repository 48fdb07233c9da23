//! Event types for the unified store

/// Emitted when a deferred background upload ultimately fails.
///
/// The blob remains queued in the outbox and will be retried the next
/// time a `store` for its identifier is attempted, or at the next store
/// startup.
#[derive(Debug, Clone)]
pub struct UploadFailure {
    pub id: String,
    pub error: String,
}
