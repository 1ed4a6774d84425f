//=========================================================================
// Host State Machine
//=========================================================================
//
//   Uninitialized ──► Initializing ──► Ready ──► Destroyed
//                          │   │                     │
//                          │   └──────► Destroyed    │
//                          └──────────► Failed       │
//                                          │         │
//   Destroyed | Failed ──► Initializing (new lineage)◄┘
//
// Destroyed and Failed end a lineage. A later initialize starts a new
// one; it never resumes the old engine or handle.
//
//=========================================================================

/// Lifecycle state of a [`super::GameHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HostState {
    /// No initialization has been attempted.
    #[default]
    Uninitialized,

    /// Waiting for the engine factory to load or the engine to construct.
    Initializing,

    /// An engine is live and bound to the handle.
    Ready,

    /// Torn down. Terminal for the lineage.
    Destroyed,

    /// Loading or construction failed. Terminal for the lineage.
    Failed,
}

impl HostState {
    /// True if the lineage in this state has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Destroyed | Self::Failed)
    }

    /// True if an initialization attempt is in flight or has completed.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Initializing | Self::Ready)
    }

    /// Whether the edge `self → next` exists.
    pub fn permits(self, next: HostState) -> bool {
        use HostState::*;
        matches!(
            (self, next),
            (Uninitialized | Destroyed | Failed, Initializing)
                | (Initializing, Ready | Failed | Destroyed)
                | (Ready, Destroyed)
        )
    }
}

/// State plus lineage, broadcast to callers queued behind an in-flight
/// initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LifecycleSnapshot {
    pub(crate) state: HostState,
    pub(crate) lineage: u64,
}

//=========================================================================
// Tests
//=========================================================================
