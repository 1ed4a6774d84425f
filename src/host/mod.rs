//=========================================================================
// Host
//=========================================================================
//
// Lifecycle management of one embedded engine per attachment point.
//
// Architecture:
//   GameHost
//     ├─ Lifecycle (HostState, lineage, engine, handle, pending events)
//     ├─ EventChannel<SceneRef>   (shared, SCENE_READY subscription)
//     ├─ AttachmentRegistry       (shared, exclusive container ids)
//     └─ EngineLoader             (async factory resolution)
//
// Flow:
//   initialize() → load().await → construct() → GameHandle → replay
//   SCENE_READY  → GameHandle::active_scene   → observer
//   teardown()   → unsubscribe → detach → destroy()
//
//=========================================================================

//=== Module Declarations =================================================

mod builder;
mod error;
mod game_host;
mod handle;
mod state;

//=== Public API ==========================================================

pub use builder::{GameHostBuilder, SceneObserver};
pub use error::HostError;
pub use game_host::GameHost;
pub use handle::GameHandle;
pub use state::HostState;
