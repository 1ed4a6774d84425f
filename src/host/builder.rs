//=========================================================================
// GameHost Builder
//=========================================================================
//
// Fluent configuration for a GameHost.
//
// ```text
//     GameHostBuilder ──build()──> GameHost ──initialize().await──> GameHandle
//         │
//         ├─ with_events()         shared event channel
//         ├─ with_attachments()    shared attachment registry
//         ├─ with_observer()       active-scene callback
//         └─ with_load_timeout()   bound on factory resolution
// ```
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::Arc;
use std::time::Duration;

//=== Internal Dependencies ===============================================

use super::GameHost;
use crate::core::attachment::AttachmentRegistry;
use crate::core::engine::EngineLoader;
use crate::core::event_channel::EventChannel;
use crate::core::scene::SceneRef;

//=== SceneObserver =======================================================

/// Host-application callback invoked with each newly active scene.
pub type SceneObserver = Arc<dyn Fn(&SceneRef) + Send + Sync>;

//=== GameHostBuilder =====================================================

/// Builder for a [`GameHost`].
///
/// # Default Values
///
/// - **Event channel**: a fresh private channel
/// - **Attachment registry**: a fresh private registry
/// - **Observer**: none
/// - **Load timeout**: none (wait indefinitely)
///
/// Hosts that should share a channel or compete for the same attachment
/// points must be given clones of the same instances.
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # use aetheric_bridge::core::{EventChannel, AttachmentRegistry, ReadyLoader, SceneRef};
/// # use aetheric_bridge::headless::HeadlessFactory;
/// # use aetheric_bridge::host::GameHost;
/// let events = EventChannel::new();
/// let attachments = AttachmentRegistry::new();
/// # let factory = HeadlessFactory::new("Boot");
///
/// let host = GameHost::builder(Arc::new(ReadyLoader::new(Arc::new(factory))))
///     .with_events(events.clone())
///     .with_attachments(attachments.clone())
///     .with_observer(Arc::new(|scene: &SceneRef| log::info!("active: {}", scene.key())))
///     .build();
/// ```
pub struct GameHostBuilder {
    pub(super) loader: Arc<dyn EngineLoader>,
    pub(super) events: EventChannel<SceneRef>,
    pub(super) attachments: AttachmentRegistry,
    pub(super) observer: Option<SceneObserver>,
    pub(super) load_timeout: Option<Duration>,
}

impl GameHostBuilder {
    /// Creates a builder around the loader that resolves the engine factory.
    pub fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            loader,
            events: EventChannel::new(),
            attachments: AttachmentRegistry::new(),
            observer: None,
            load_timeout: None,
        }
    }

    /// Uses `events` for readiness notifications.
    pub fn with_events(mut self, events: EventChannel<SceneRef>) -> Self {
        self.events = events;
        self
    }

    /// Uses `attachments` to enforce exclusive attachment points.
    pub fn with_attachments(mut self, attachments: AttachmentRegistry) -> Self {
        self.attachments = attachments;
        self
    }

    /// Installs the active-scene observer.
    pub fn with_observer(mut self, observer: SceneObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Fails initialization if the factory has not loaded within `limit`.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is zero.
    pub fn with_load_timeout(mut self, limit: Duration) -> Self {
        assert!(!limit.is_zero(), "Load timeout must be positive");
        self.load_timeout = Some(limit);
        self
    }

    /// Builds the host in the `Uninitialized` state.
    pub fn build(self) -> GameHost {
        GameHost::from_builder(self)
    }
}

//=========================================================================
// Tests
//=========================================================================
