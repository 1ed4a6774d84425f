//=========================================================================
// Core
//
// Engine-agnostic building blocks shared by hosts and engines.
//
// Responsibilities:
// - Event Channel: named publish/subscribe with snapshot delivery
// - Scene references and the readiness event contract
// - Engine contracts: identity, factory, async loader
// - Exclusive attachment-point registry
//
// Notes:
// Nothing here knows about a particular engine or UI layer. Engines
// depend on `core` to publish readiness; hosts depend on it to listen.
//
//=========================================================================

//=== Module Declarations =================================================

pub mod attachment;
pub mod engine;
pub mod event_channel;
pub mod scene;

//=== Public API ==========================================================

pub use attachment::{AttachmentClaim, AttachmentRegistry};
pub use engine::{
    EngineContext, EngineError, EngineFactory, EngineId, EngineLoader, GameEngine, ReadyLoader,
};
pub use event_channel::{Callback, EventChannel, SubscriptionToken, WildcardCallback};
pub use scene::{publish_scene_ready, Scene, SceneRef, SCENE_READY};
