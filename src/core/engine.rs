//=========================================================================
// Engine Contracts
//=========================================================================
//
// The bridge's view of an embedded engine: something that can be
// constructed against an attachment point, identified, and destroyed.
//
// Architecture:
//   EngineLoader ──load().await──> EngineFactory ──construct()──> GameEngine
//   (async, may fail)              (sync, may fail)               (owned by host)
//
// The loader is the only suspension point in a host's initialization.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

//=== Internal Dependencies ===============================================

use super::event_channel::EventChannel;
use super::scene::SceneRef;

//=== EngineId ============================================================

/// Process-unique identity of an engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineId(u64);

impl EngineId {
    /// Allocates a fresh id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

//=== EngineError =========================================================

/// Failure while resolving a factory or constructing an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The factory could not be resolved.
    #[error("engine factory unavailable: {0}")]
    LoadFailed(String),

    /// The factory was resolved but construction failed.
    #[error("engine construction failed for '{container}': {reason}")]
    ConstructionFailed { container: String, reason: String },
}

//=== GameEngine ==========================================================

/// A running engine instance.
///
/// The engine drives its own update loop. The bridge only identifies it and
/// eventually destroys it; hosts reach engine-specific operations through
/// [`GameEngine::as_any`].
pub trait GameEngine: Send + Sync + 'static {
    fn id(&self) -> EngineId;

    /// Attachment point the engine was constructed against.
    fn container(&self) -> &str;

    /// Stops the engine and releases its resources.
    ///
    /// Called once, by the owning host only.
    fn destroy(&self);

    fn as_any(&self) -> &dyn Any;
}

//=== EngineContext =======================================================

/// Everything a factory needs to build one engine instance.
#[derive(Clone)]
pub struct EngineContext {
    /// Id the constructed engine (and its scenes) must report.
    pub engine_id: EngineId,

    /// Attachment point to bind to.
    pub container: String,

    /// Channel on which the engine's scenes publish readiness.
    pub events: EventChannel<SceneRef>,
}

//=== Factory and Loader ==================================================

/// Synchronous engine constructor.
pub trait EngineFactory: Send + Sync {
    fn construct(&self, ctx: &EngineContext) -> Result<Arc<dyn GameEngine>, EngineError>;
}

/// Asynchronous resolution of an [`EngineFactory`].
///
/// Stands in for a deferred module load: the engine code may not be
/// available until some I/O or startup work has completed.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn EngineFactory>, EngineError>;
}

/// Loader for a factory that is already available.
pub struct ReadyLoader {
    factory: Arc<dyn EngineFactory>,
}

impl ReadyLoader {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl EngineLoader for ReadyLoader {
    async fn load(&self) -> Result<Arc<dyn EngineFactory>, EngineError> {
        Ok(Arc::clone(&self.factory))
    }
}

//=========================================================================
// Tests
//=========================================================================
