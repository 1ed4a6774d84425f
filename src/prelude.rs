//=========================================================================
// Prelude
//=========================================================================
//
// Convenience module that re-exports commonly used types and traits.
//
// Usage:
//   use aetheric_bridge::prelude::*;
//
//=========================================================================

//=== Public API ==========================================================

// Host lifecycle
pub use crate::host::{GameHandle, GameHost, GameHostBuilder, HostError, HostState, SceneObserver};

// Engine contracts
pub use crate::core::{
    EngineContext, EngineError, EngineFactory, EngineId, EngineLoader, GameEngine, ReadyLoader,
};

// Event channel and scenes
pub use crate::core::{publish_scene_ready, EventChannel, Scene, SceneRef, SCENE_READY};

// Attachment points
pub use crate::core::AttachmentRegistry;

// Headless engine
pub use crate::headless::{
    HeadlessConfig, HeadlessEngine, HeadlessFactory, HeadlessScene, SceneContext,
};
