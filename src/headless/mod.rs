//=========================================================================
// Headless
//=========================================================================
//
// Reference engine that runs scenes on a fixed-rate logic thread without
// any platform layer. Used by the demo and the end-to-end tests, and as a
// template for wiring a real engine behind `EngineFactory`.
//
//=========================================================================

//=== Module Declarations =================================================

mod collector;
mod config;
mod engine;
mod scene;

//=== Public API ==========================================================

pub use config::HeadlessConfig;
pub use engine::{HeadlessEngine, HeadlessFactory};
pub use scene::{HeadlessScene, SceneContext};
