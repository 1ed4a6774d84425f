//=========================================================================
// Host Errors
//=========================================================================

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by [`super::GameHost::initialize`].
///
/// Teardown never fails: repeated teardown, teardown before initialize and
/// disposal of an engine that finished loading too late are all handled
/// silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// Another host holds the attachment point.
    #[error("attachment point '{0}' is already bound to another host")]
    AttachmentInUse(String),

    /// The factory failed to load or the engine failed to construct.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// The factory did not load within the configured limit.
    #[error("engine factory did not load within {0:?}")]
    LoadTimeout(Duration),

    /// Teardown ended this initialization before it completed.
    #[error("initialization cancelled by teardown")]
    Cancelled,
}
