//! Lifecycle misuse errors

use thiserror::Error;

/// Raised when a scoped resource or a pipe is used outside its lifecycle
///
/// These travel inside an [`eyre::Report`] like every other error in the
/// crate; callers that care can recover them with `downcast_ref`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("resource is already active; a scope can only be entered once at a time")]
    AlreadyActive,

    #[error("resource has already been cleaned up and cannot be entered again")]
    AlreadyExited,

    #[error("single-pass source was already consumed")]
    Exhausted,

    #[error("source was read after its scope ended")]
    Closed,

    #[error("pipe has already been run")]
    PipeAlreadyRun,
}
