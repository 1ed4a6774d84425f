//=========================================================================
// Game Handle
//=========================================================================
//
// Upward-facing view of one host lineage: the engine the host owns and a
// weak reference to the engine's latest active scene.
//
// Invariant: an active scene is only ever recorded while an engine is
// attached. Detaching clears both slots for every clone of the handle.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

//=== Internal Dependencies ===============================================

use crate::core::engine::{EngineId, GameEngine};
use crate::core::scene::{Scene, SceneRef};

//=== GameHandle ==========================================================

/// Handle exposed to the host application after initialization.
///
/// Clones share the same slots. Each initialization lineage produces a new
/// handle identity; compare with [`GameHandle::same_lineage`].
#[derive(Clone)]
pub struct GameHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    lineage: u64,
    slots: RwLock<Slots>,
}

struct Slots {
    engine: Option<Arc<dyn GameEngine>>,
    scene: Option<Weak<dyn Scene>>,
}

impl GameHandle {
    pub(crate) fn new(lineage: u64, engine: Arc<dyn GameEngine>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                lineage,
                slots: RwLock::new(Slots {
                    engine: Some(engine),
                    scene: None,
                }),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Slots> {
        self.inner.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slots> {
        self.inner.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    //--- Identity ---------------------------------------------------------

    /// Initialization lineage that produced this handle.
    pub fn lineage(&self) -> u64 {
        self.inner.lineage
    }

    /// True if both handles came from the same initialization.
    pub fn same_lineage(&self, other: &GameHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    //--- Engine -----------------------------------------------------------

    /// The attached engine, or `None` once the host has torn down.
    pub fn engine(&self) -> Option<Arc<dyn GameEngine>> {
        self.read().engine.clone()
    }

    pub fn engine_id(&self) -> Option<EngineId> {
        self.read().engine.as_ref().map(|e| e.id())
    }

    pub fn is_attached(&self) -> bool {
        self.read().engine.is_some()
    }

    /// Runs `f` against the engine if it is attached and of type `T`.
    pub fn with_engine<T: GameEngine, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let engine = self.engine()?;
        engine.as_any().downcast_ref::<T>().map(f)
    }

    //--- Active Scene -----------------------------------------------------

    /// Latest active scene, if one was announced and is still alive.
    pub fn active_scene(&self) -> Option<SceneRef> {
        self.read().scene.as_ref().and_then(SceneRef::upgrade)
    }

    /// Runs `f` against the active scene if it is of type `T`.
    ///
    /// This is the capability check for scene-specific operations: a host
    /// that expects a particular scene gets `None` when another is active.
    pub fn with_active_scene<T: Scene, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let scene = self.active_scene()?;
        scene.downcast_ref::<T>().map(f)
    }

    //--- Host-side Mutation -----------------------------------------------

    /// Records `scene` as active. Refused once detached.
    pub(crate) fn set_active_scene(&self, scene: &SceneRef) -> bool {
        let mut slots = self.write();
        if slots.engine.is_none() {
            return false;
        }
        slots.scene = Some(scene.downgrade());
        true
    }

    /// Clears both slots and returns the engine that was attached.
    pub(crate) fn detach(&self) -> Option<Arc<dyn GameEngine>> {
        let mut slots = self.write();
        slots.scene = None;
        slots.engine.take()
    }
}

impl fmt::Debug for GameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameHandle")
            .field("lineage", &self.lineage())
            .field("engine", &self.engine_id())
            .field("scene", &self.active_scene().map(|s| s.key().to_owned()))
            .finish()
    }
}

//=========================================================================
// Tests
//=========================================================================
