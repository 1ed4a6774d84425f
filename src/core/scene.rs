//=========================================================================
// Scene References
//=========================================================================
//
// Opaque handle to an engine's active internal object ("scene") and the
// readiness event that announces it.
//
// Architecture:
//   Scene (engine-side, any type)
//     └─ SceneRef (strong, carried by SCENE_READY)
//          └─ Weak<dyn Scene> (held by GameHandle)
//
// Hosts see a scene only through its key and owning engine. Anything
// scene-specific requires an explicit downcast via `SceneRef::downcast_ref`.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

//=== Internal Dependencies ===============================================

use super::engine::EngineId;
use super::event_channel::EventChannel;

//=== Constants ===========================================================

/// Name of the readiness event published by a scene once it is active.
pub const SCENE_READY: &str = "scene-ready";

//=== Scene Trait =========================================================

/// An engine-internal object that can become the active scene.
///
/// # Example
///
/// ```rust
/// use std::any::Any;
/// use aetheric_bridge::core::engine::EngineId;
/// use aetheric_bridge::core::scene::Scene;
///
/// struct MainMenu { engine: EngineId }
///
/// impl Scene for MainMenu {
///     fn key(&self) -> &str { "MainMenu" }
///     fn engine(&self) -> EngineId { self.engine }
///     fn as_any(&self) -> &dyn Any { self }
/// }
/// ```
pub trait Scene: Send + Sync + 'static {
    /// Declared name of the scene (e.g. `"MainMenu"`).
    fn key(&self) -> &str;

    /// Engine instance this scene belongs to.
    fn engine(&self) -> EngineId;

    /// Concrete-type access for capability checks.
    fn as_any(&self) -> &dyn Any;
}

//=== SceneRef ============================================================

/// Shared reference to an active scene.
///
/// This is the payload of [`SCENE_READY`]. Cloning shares the same scene.
#[derive(Clone)]
pub struct SceneRef {
    scene: Arc<dyn Scene>,
}

impl SceneRef {
    /// Wraps a scene for publication.
    pub fn new(scene: Arc<dyn Scene>) -> Self {
        Self { scene }
    }

    pub fn key(&self) -> &str {
        self.scene.key()
    }

    pub fn engine(&self) -> EngineId {
        self.scene.engine()
    }

    /// True if the scene's concrete type is `T`.
    pub fn is<T: Scene>(&self) -> bool {
        self.scene.as_any().is::<T>()
    }

    /// Borrows the scene as `T` if that is its concrete type.
    pub fn downcast_ref<T: Scene>(&self) -> Option<&T> {
        self.scene.as_any().downcast_ref::<T>()
    }

    /// True if both references point to the same scene object.
    pub fn ptr_eq(&self, other: &SceneRef) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.scene), Arc::as_ptr(&other.scene))
    }

    pub(crate) fn downgrade(&self) -> Weak<dyn Scene> {
        Arc::downgrade(&self.scene)
    }

    pub(crate) fn upgrade(weak: &Weak<dyn Scene>) -> Option<SceneRef> {
        weak.upgrade().map(|scene| SceneRef { scene })
    }
}

impl<T: Scene> From<Arc<T>> for SceneRef {
    fn from(scene: Arc<T>) -> Self {
        Self { scene }
    }
}

impl fmt::Debug for SceneRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneRef")
            .field("key", &self.key())
            .field("engine", &self.engine())
            .finish()
    }
}

//=== Publishing ==========================================================

/// Announces `scene` as the newly active scene.
///
/// Engine-side code calls this once per activation, after the scene has
/// finished its own setup.
pub fn publish_scene_ready(events: &EventChannel<SceneRef>, scene: SceneRef) -> usize {
    events.publish(SCENE_READY, &scene)
}

//=========================================================================
// Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct MainMenu {
        engine: EngineId,
    }

    impl Scene for MainMenu {
        fn key(&self) -> &str {
            "MainMenu"
        }
        fn engine(&self) -> EngineId {
            self.engine
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct GameOver {
        engine: EngineId,
    }

    impl Scene for GameOver {
        fn key(&self) -> &str {
            "GameOver"
        }
        fn engine(&self) -> EngineId {
            self.engine
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn capability_check_gates_downcast() {
        let engine = EngineId::next();
        let scene = SceneRef::from(Arc::new(MainMenu { engine }));

        assert_eq!(scene.key(), "MainMenu");
        assert_eq!(scene.engine(), engine);
        assert!(scene.is::<MainMenu>());
        assert!(!scene.is::<GameOver>());
        assert!(scene.downcast_ref::<MainMenu>().is_some());
        assert!(scene.downcast_ref::<GameOver>().is_none());
    }

    #[test]
    fn weak_reference_does_not_keep_scene_alive() {
        let scene = SceneRef::from(Arc::new(GameOver { engine: EngineId::next() }));
        let weak = scene.downgrade();

        assert!(SceneRef::upgrade(&weak).is_some_and(|s| s.ptr_eq(&scene)));

        drop(scene);
        assert!(SceneRef::upgrade(&weak).is_none());
    }

    #[test]
    fn publish_scene_ready_uses_the_fixed_event_name() {
        let events = EventChannel::<SceneRef>::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        events.subscribe(
            SCENE_READY,
            Arc::new(move |s: &SceneRef| sink.lock().unwrap().push(s.key().to_owned())),
        );

        let scene = SceneRef::from(Arc::new(MainMenu { engine: EngineId::next() }));
        assert_eq!(publish_scene_ready(&events, scene), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["MainMenu"]);
    }
}
