//=========================================================================
// Headless Scenes
//=========================================================================
//
// Scenes hosted by the headless engine and the context they are built
// with.
//
// Lifecycle of one activation (logic thread):
//   constructor(ctx) → create() → SCENE_READY → update(tick)...
//
// Scenes request transitions through their SceneContext. Requests are
// queued and applied at the next tick boundary.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};
use log::warn;

//=== Internal Dependencies ===============================================

use crate::core::engine::EngineId;
use crate::core::scene::{Scene, SceneRef};

//=== HeadlessScene =======================================================

/// A scene driven by the headless logic thread.
///
/// Hooks take `&self` because the scene is shared with the host through
/// [`SceneRef`]; keep mutable state behind interior mutability.
pub trait HeadlessScene: Scene {
    /// Runs once per activation, before readiness is announced.
    fn create(&self) {}

    /// Runs every tick while this scene is active.
    fn update(&self, _tick: u64) {}
}

//=== Engine Commands =====================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum EngineCommand {
    StartScene(String),
    Shutdown,
}

//=== SceneContext ========================================================

/// Everything a scene constructor gets from the engine.
#[derive(Clone)]
pub struct SceneContext {
    engine_id: EngineId,
    key: String,
    commands: Sender<EngineCommand>,
}

impl SceneContext {
    pub(super) fn new(engine_id: EngineId, key: &str, commands: Sender<EngineCommand>) -> Self {
        Self {
            engine_id,
            key: key.to_owned(),
            commands,
        }
    }

    pub fn engine_id(&self) -> EngineId {
        self.engine_id
    }

    /// Key the scene is being activated under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Asks the engine to switch to the scene registered under `key`.
    ///
    /// Returns `false` if the command queue is full or the engine stopped.
    pub fn start_scene(&self, key: &str) -> bool {
        request_scene(&self.commands, key)
    }
}

/// Queues a switch to `key` without blocking the caller.
pub(super) fn request_scene(commands: &Sender<EngineCommand>, key: &str) -> bool {
    match commands.try_send(EngineCommand::StartScene(key.to_owned())) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("Command queue full; dropping switch to '{}'", key);
            false
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

impl fmt::Debug for SceneContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneContext")
            .field("engine_id", &self.engine_id)
            .field("key", &self.key)
            .finish()
    }
}

//=== Scene Activation ====================================================

/// One constructed scene: the hooks the engine drives and the reference
/// announced to the host. Both point at the same allocation.
pub(super) struct Activation {
    pub(super) hooks: Arc<dyn HeadlessScene>,
    pub(super) scene: SceneRef,
}

pub(super) type SceneConstructor = Arc<dyn Fn(&SceneContext) -> Activation + Send + Sync>;

pub(super) fn constructor<S, F>(build: F) -> SceneConstructor
where
    S: HeadlessScene,
    F: Fn(&SceneContext) -> S + Send + Sync + 'static,
{
    Arc::new(move |ctx: &SceneContext| {
        let scene = Arc::new(build(ctx));
        Activation {
            hooks: scene.clone(),
            scene: SceneRef::from(scene),
        }
    })
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::any::Any;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Lobby {
        ctx: SceneContext,
        ticks: AtomicU64,
    }

    impl Scene for Lobby {
        fn key(&self) -> &str {
            self.ctx.key()
        }
        fn engine(&self) -> EngineId {
            self.ctx.engine_id()
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl HeadlessScene for Lobby {
        fn update(&self, _tick: u64) {
            self.ticks.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn context_queues_scene_requests() {
        let (tx, rx) = bounded(1);
        let ctx = SceneContext::new(EngineId::next(), "Lobby", tx);

        assert!(ctx.start_scene("Arena"));
        assert!(!ctx.start_scene("Overflow"));
        assert_eq!(rx.try_recv(), Ok(EngineCommand::StartScene("Arena".into())));
    }

    #[test]
    fn context_refuses_after_engine_stopped() {
        let (tx, rx) = bounded(4);
        let ctx = SceneContext::new(EngineId::next(), "Lobby", tx);
        drop(rx);

        assert!(!ctx.start_scene("Arena"));
    }

    #[test]
    fn activation_shares_one_allocation() {
        let (tx, _rx) = bounded(1);
        let id = EngineId::next();
        let build = constructor(|ctx: &SceneContext| Lobby {
            ctx: ctx.clone(),
            ticks: AtomicU64::new(0),
        });

        let activation = build(&SceneContext::new(id, "Lobby", tx));
        activation.hooks.update(1);

        assert_eq!(activation.scene.key(), "Lobby");
        assert_eq!(activation.scene.engine(), id);
        let lobby = activation.scene.downcast_ref::<Lobby>().unwrap();
        assert_eq!(lobby.ticks.load(Ordering::Relaxed), 1);
    }
}
