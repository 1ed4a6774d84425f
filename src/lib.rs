//=========================================================================
// Aetheric Bridge — Library Root
//
// Lifecycle and event bridge between a host application and an embedded
// game engine that runs its own update loop.
//
// Responsibilities:
// - Create, guard and tear down exactly one engine per attachment point,
//   including when initialization and teardown race
// - Relay scene readiness from engine internals to the host through a
//   shared event channel, without the engine knowing about the host
// - Provide a headless reference engine for demos and tests
//
// Typical usage:
// ```no_run
// use std::sync::Arc;
// use aetheric_bridge::prelude::*;
//
// # async fn mount(factory: HeadlessFactory) -> Result<(), HostError> {
// let host = GameHost::builder(Arc::new(ReadyLoader::new(Arc::new(factory)))).build();
// let handle = host.initialize("game-container").await?;
// // ...
// host.teardown();
// # Ok(())
// # }
// ```
//
//=========================================================================

//--- Public Modules ------------------------------------------------------
//
// `core` holds the engine-agnostic contracts: event channel, scene
// references, engine traits and the attachment registry.
//
// `host` is the lifecycle manager the host application talks to.
//
// `headless` is a platform-free engine implementing the `core` contracts.
//
pub mod core;
pub mod headless;
pub mod host;
pub mod prelude;

//--- Public Exports ------------------------------------------------------

pub use crate::core::{EventChannel, SceneRef, SCENE_READY};
pub use crate::host::{GameHandle, GameHost, HostError, HostState};
