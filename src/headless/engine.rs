//=========================================================================
// Headless Engine
//=========================================================================
//
// Reference engine with no platform layer. Each instance owns a logic
// thread that ticks the active scene at a fixed rate and announces every
// scene activation on the shared event channel.
//
// Architecture:
// ```text
//     HeadlessFactory ──construct()──> HeadlessEngine ──destroy()──> joined
//         │                              │
//         ├─ with_config()               ├─ start_scene()  ──┐
//         └─ with_scene()                └─ tick_count()     │ bounded
//                                                            ▼ channel
//                                        LogicLoop (thread @ TPS)
//                                          collect → activate → update
// ```
//
//=========================================================================

//=== External Dependencies ===============================================

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender};
use log::{debug, error, info, trace, warn};

//=== Internal Dependencies ===============================================

use super::collector::{CommandCollector, TickControl};
use super::scene::{
    constructor, request_scene, Activation, EngineCommand, HeadlessScene, SceneConstructor,
    SceneContext,
};
use super::HeadlessConfig;
use crate::core::engine::{EngineContext, EngineError, EngineFactory, EngineId, GameEngine};
use crate::core::event_channel::EventChannel;
use crate::core::scene::{publish_scene_ready, SceneRef};

//=== HeadlessFactory =====================================================

/// Builds [`HeadlessEngine`] instances from a fixed set of scenes.
///
/// # Examples
///
/// ```no_run
/// # use std::any::Any;
/// # use aetheric_bridge::core::{EngineId, Scene};
/// use aetheric_bridge::headless::{HeadlessConfig, HeadlessFactory, HeadlessScene, SceneContext};
///
/// struct Boot(SceneContext);
///
/// impl Scene for Boot {
///     fn key(&self) -> &str { self.0.key() }
///     fn engine(&self) -> EngineId { self.0.engine_id() }
///     fn as_any(&self) -> &dyn Any { self }
/// }
///
/// impl HeadlessScene for Boot {
///     fn create(&self) {
///         self.0.start_scene("MainMenu");
///     }
/// }
///
/// let factory = HeadlessFactory::new("Boot")
///     .with_config(HeadlessConfig::new().with_tps(30.0))
///     .with_scene("Boot", |ctx: &SceneContext| Boot(ctx.clone()));
/// ```
pub struct HeadlessFactory {
    config: HeadlessConfig,
    start_scene: String,
    scenes: HashMap<String, SceneConstructor>,
}

impl HeadlessFactory {
    /// Creates a factory whose engines open on the scene registered
    /// under `start_scene`.
    pub fn new(start_scene: impl Into<String>) -> Self {
        Self {
            config: HeadlessConfig::new(),
            start_scene: start_scene.into(),
            scenes: HashMap::new(),
        }
    }

    pub fn with_config(mut self, config: HeadlessConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers `build` as the constructor of the scene under `key`.
    ///
    /// A scene is constructed afresh on every activation.
    pub fn with_scene<S, F>(mut self, key: impl Into<String>, build: F) -> Self
    where
        S: HeadlessScene,
        F: Fn(&SceneContext) -> S + Send + Sync + 'static,
    {
        let key = key.into();
        if self.scenes.insert(key.clone(), constructor(build)).is_some() {
            warn!("Scene '{}' was already registered and has been replaced", key);
        }
        self
    }

    pub fn config(&self) -> HeadlessConfig {
        self.config
    }

    pub fn start_scene(&self) -> &str {
        &self.start_scene
    }

    pub fn has_scene(&self, key: &str) -> bool {
        self.scenes.contains_key(key)
    }
}

impl EngineFactory for HeadlessFactory {
    fn construct(&self, ctx: &EngineContext) -> Result<Arc<dyn GameEngine>, EngineError> {
        if !self.has_scene(&self.start_scene) {
            return Err(EngineError::ConstructionFailed {
                container: ctx.container.clone(),
                reason: format!("start scene '{}' is not registered", self.start_scene),
            });
        }

        let (commands, receiver) = bounded(self.config.command_capacity());
        let status = Arc::new(EngineStatus::new());

        let logic = LogicLoop {
            engine_id: ctx.engine_id,
            events: ctx.events.clone(),
            scenes: self.scenes.clone(),
            commands: commands.clone(),
            collector: CommandCollector::new(receiver),
            status: Arc::clone(&status),
            frame_duration: Duration::from_secs_f64(1.0 / self.config.tps()),
        };
        let start = self.start_scene.clone();

        let thread = thread::Builder::new()
            .name(format!("headless-{}", ctx.engine_id.as_u64()))
            .spawn(move || logic.run(&start))
            .map_err(|e| EngineError::ConstructionFailed {
                container: ctx.container.clone(),
                reason: e.to_string(),
            })?;

        info!(
            "Spawned logic thread for {} on '{}' (TPS: {})",
            ctx.engine_id,
            ctx.container,
            self.config.tps()
        );

        Ok(Arc::new(HeadlessEngine {
            id: ctx.engine_id,
            container: ctx.container.clone(),
            commands,
            status,
            thread: Mutex::new(Some(thread)),
        }))
    }
}

impl fmt::Debug for HeadlessFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.scenes.keys().collect();
        keys.sort();
        f.debug_struct("HeadlessFactory")
            .field("config", &self.config)
            .field("start_scene", &self.start_scene)
            .field("scenes", &keys)
            .finish()
    }
}

//=== EngineStatus ========================================================

/// State shared between a [`HeadlessEngine`] and its logic thread.
struct EngineStatus {
    running: AtomicBool,
    ticks: AtomicU64,
    history: Mutex<Vec<String>>,
}

impl EngineStatus {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            ticks: AtomicU64::new(0),
            history: Mutex::new(Vec::new()),
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn record(&self, key: &str) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key.to_owned());
    }

    fn history(&self) -> Vec<String> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

//=== HeadlessEngine ======================================================

/// Engine instance produced by [`HeadlessFactory`].
///
/// Dropping the last reference stops the logic thread if `destroy` was
/// never called.
pub struct HeadlessEngine {
    id: EngineId,
    container: String,
    commands: Sender<EngineCommand>,
    status: Arc<EngineStatus>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl HeadlessEngine {
    /// Requests a switch to the scene registered under `key`.
    ///
    /// Applied at the next tick boundary. Returns `false` once stopped or
    /// when the command queue is full.
    pub fn start_scene(&self, key: &str) -> bool {
        if !self.status.is_running() {
            debug!("{} is stopped; ignoring switch to '{}'", self.id, key);
            return false;
        }
        request_scene(&self.commands, key)
    }

    /// Number of completed logic ticks.
    pub fn tick_count(&self) -> u64 {
        self.status.ticks.load(Ordering::Acquire)
    }

    /// Keys of every activation so far, oldest first.
    pub fn scene_history(&self) -> Vec<String> {
        self.status.history()
    }

    pub fn current_scene(&self) -> Option<String> {
        self.status.history().pop()
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }
}

impl GameEngine for HeadlessEngine {
    fn id(&self) -> EngineId {
        self.id
    }

    fn container(&self) -> &str {
        &self.container
    }

    /// Stops the logic thread and waits for it, unless called from that
    /// thread (e.g. by a readiness subscriber).
    fn destroy(&self) {
        if !self.status.running.swap(false, Ordering::AcqRel) {
            trace!("{} already stopped", self.id);
            return;
        }
        info!("Stopping {}", self.id);

        // The loop also polls `running`, so a full queue only delays exit by a tick.
        if self.commands.try_send(EngineCommand::Shutdown).is_err() {
            debug!("Shutdown command for {} not queued", self.id);
        }

        let handle = self.thread.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(handle) = handle else {
            return;
        };

        if handle.thread().id() == thread::current().id() {
            debug!("{} destroyed from its own logic thread; not joining", self.id);
            return;
        }

        match handle.join() {
            Ok(()) => info!("Logic thread for {} terminated cleanly", self.id),
            Err(e) => error!("Logic thread for {} panicked: {:?}", self.id, e),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for HeadlessEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for HeadlessEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessEngine")
            .field("id", &self.id)
            .field("container", &self.container)
            .field("running", &self.is_running())
            .field("ticks", &self.tick_count())
            .finish()
    }
}

//=== LogicLoop ===========================================================

struct LogicLoop {
    engine_id: EngineId,
    events: EventChannel<SceneRef>,
    scenes: HashMap<String, SceneConstructor>,
    commands: Sender<EngineCommand>,
    collector: CommandCollector,
    status: Arc<EngineStatus>,
    frame_duration: Duration,
}

impl LogicLoop {
    //--- run() -------------------------------------------------------------
    //
    // Each tick:
    //  1. Collects queued commands (exits on shutdown)
    //  2. Activates requested scenes in order
    //  3. Updates the active scene
    //  4. Sleeps to maintain fixed pacing
    //
    fn run(mut self, start: &str) {
        debug!("Logic thread for {} started", self.engine_id);
        let mut active = self.activate(start);

        while self.status.is_running() {
            let frame_start = Instant::now();

            //--- Step 1: Gather commands -----------------------------------
            if self.collector.collect_tick(self.frame_duration) == TickControl::Exit {
                break;
            }

            //--- Step 2: Apply scene transitions ---------------------------
            for key in self.collector.take_requests() {
                if let Some(next) = self.activate(&key) {
                    active = Some(next);
                }
            }

            //--- Step 3: Update the active scene ---------------------------
            let tick = self.status.ticks.fetch_add(1, Ordering::AcqRel) + 1;
            if let Some(activation) = &active {
                activation.hooks.update(tick);
            }

            //--- Step 4: Maintain deterministic pacing ---------------------
            let elapsed = frame_start.elapsed();
            if elapsed < self.frame_duration {
                thread::sleep(self.frame_duration - elapsed);
            }
        }

        drop(active);
        info!("Logic thread for {} exiting", self.engine_id);
    }

    /// Builds the scene under `key`, runs its `create` hook and announces
    /// it. Returns `None` for unknown keys or once stopped.
    fn activate(&self, key: &str) -> Option<Activation> {
        if !self.status.is_running() {
            return None;
        }

        let Some(build) = self.scenes.get(key) else {
            warn!("Scene '{}' is not registered with {}", key, self.engine_id);
            return None;
        };

        let ctx = SceneContext::new(self.engine_id, key, self.commands.clone());
        let activation = build(&ctx);
        if activation.scene.engine() != self.engine_id {
            warn!(
                "Scene '{}' reports {} but runs on {}",
                key,
                activation.scene.engine(),
                self.engine_id
            );
        }

        debug!("Activating scene '{}' on {}", key, self.engine_id);
        activation.hooks.create();
        self.status.record(key);
        publish_scene_ready(&self.events, activation.scene.clone());

        Some(activation)
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scene::{Scene, SCENE_READY};
    use crossbeam_channel::{unbounded, Receiver};
    use std::sync::OnceLock;

    const WAIT: Duration = Duration::from_secs(2);

    //--- Test Scenes ------------------------------------------------------

    struct Probe {
        ctx: SceneContext,
        created: AtomicBool,
        next: Option<&'static str>,
    }

    impl Probe {
        fn leading_to(next: Option<&'static str>) -> impl Fn(&SceneContext) -> Probe {
            move |ctx: &SceneContext| Probe {
                ctx: ctx.clone(),
                created: AtomicBool::new(false),
                next,
            }
        }
    }

    impl Scene for Probe {
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

    impl HeadlessScene for Probe {
        fn create(&self) {
            self.created.store(true, Ordering::SeqCst);
            if let Some(next) = self.next {
                self.ctx.start_scene(next);
            }
        }
    }

    //--- Helpers ----------------------------------------------------------

    fn factory() -> HeadlessFactory {
        HeadlessFactory::new("Boot")
            .with_config(HeadlessConfig::new().with_tps(500.0))
            .with_scene("Boot", Probe::leading_to(None))
            .with_scene("Menu", Probe::leading_to(None))
    }

    fn context() -> EngineContext {
        EngineContext {
            engine_id: EngineId::next(),
            container: "game-container".into(),
            events: EventChannel::new(),
        }
    }

    fn readiness(events: &EventChannel<SceneRef>) -> Receiver<SceneRef> {
        let (tx, rx) = unbounded();
        events.subscribe(
            SCENE_READY,
            Arc::new(move |scene: &SceneRef| {
                let _ = tx.send(scene.clone());
            }),
        );
        rx
    }

    fn headless(engine: &Arc<dyn GameEngine>) -> &HeadlessEngine {
        engine.as_any().downcast_ref().unwrap()
    }

    fn next_key(rx: &Receiver<SceneRef>) -> String {
        rx.recv_timeout(WAIT).unwrap().key().to_owned()
    }

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    //--- Factory ----------------------------------------------------------

    #[test]
    fn factory_defaults() {
        let factory = HeadlessFactory::new("Boot");
        assert_eq!(factory.start_scene(), "Boot");
        assert_eq!(factory.config(), HeadlessConfig::default());
        assert!(!factory.has_scene("Boot"));
    }

    #[test]
    fn construct_requires_start_scene() {
        let ctx = context();
        let result = HeadlessFactory::new("Missing")
            .with_scene("Boot", Probe::leading_to(None))
            .construct(&ctx);

        match result {
            Err(EngineError::ConstructionFailed { container, reason }) => {
                assert_eq!(container, "game-container");
                assert!(reason.contains("Missing"));
            }
            other => panic!("expected construction failure, got {:?}", other.map(|e| e.id())),
        }
    }

    //--- Engine -----------------------------------------------------------

    #[test]
    fn start_scene_is_created_then_announced() {
        let ctx = context();
        let (tx, rx) = unbounded();
        ctx.events.subscribe(
            SCENE_READY,
            Arc::new(move |scene: &SceneRef| {
                let created = scene
                    .downcast_ref::<Probe>()
                    .is_some_and(|p| p.created.load(Ordering::SeqCst));
                let _ = tx.send((scene.key().to_owned(), scene.engine(), created));
            }),
        );

        let engine = factory().construct(&ctx).unwrap();

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), ("Boot".into(), ctx.engine_id, true));
        assert_eq!(engine.id(), ctx.engine_id);
        assert_eq!(engine.container(), "game-container");
        engine.destroy();
    }

    #[test]
    fn scene_requests_switch_in_order() {
        let ctx = context();
        let rx = readiness(&ctx.events);
        let factory = HeadlessFactory::new("Boot")
            .with_config(HeadlessConfig::new().with_tps(500.0))
            .with_scene("Boot", Probe::leading_to(Some("Menu")))
            .with_scene("Menu", Probe::leading_to(None));

        let engine = factory.construct(&ctx).unwrap();

        assert_eq!(next_key(&rx), "Boot");
        assert_eq!(next_key(&rx), "Menu");
        assert_eq!(headless(&engine).scene_history(), vec!["Boot", "Menu"]);
        assert_eq!(headless(&engine).current_scene().as_deref(), Some("Menu"));
        engine.destroy();
    }

    #[test]
    fn unknown_scene_is_skipped() {
        let ctx = context();
        let rx = readiness(&ctx.events);
        let engine = factory().construct(&ctx).unwrap();
        assert_eq!(next_key(&rx), "Boot");

        assert!(headless(&engine).start_scene("Nowhere"));
        assert!(headless(&engine).start_scene("Menu"));

        assert_eq!(next_key(&rx), "Menu");
        assert_eq!(headless(&engine).scene_history(), vec!["Boot", "Menu"]);
        engine.destroy();
    }

    #[test]
    fn logic_thread_ticks() {
        let ctx = context();
        let engine = factory().construct(&ctx).unwrap();

        assert!(wait_until(|| headless(&engine).tick_count() >= 3));
        engine.destroy();
    }

    #[test]
    fn destroy_stops_the_logic_thread() {
        let ctx = context();
        let rx = readiness(&ctx.events);
        let engine = factory().construct(&ctx).unwrap();
        assert_eq!(next_key(&rx), "Boot");

        engine.destroy();
        engine.destroy();

        let engine = headless(&engine);
        assert!(!engine.is_running());
        assert!(!engine.start_scene("Menu"));

        let ticks = engine.tick_count();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(engine.tick_count(), ticks);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn destroy_from_logic_thread_does_not_deadlock() {
        let ctx = context();
        let slot: Arc<OnceLock<Arc<dyn GameEngine>>> = Arc::new(OnceLock::new());
        let (tx, rx) = unbounded();

        let remote = Arc::clone(&slot);
        ctx.events.subscribe(
            SCENE_READY,
            Arc::new(move |_: &SceneRef| {
                // Runs on the logic thread; wait for the engine to be published.
                let deadline = Instant::now() + WAIT;
                while remote.get().is_none() && Instant::now() < deadline {
                    thread::yield_now();
                }
                if let Some(engine) = remote.get() {
                    engine.destroy();
                }
                let _ = tx.send(());
            }),
        );

        let engine = factory().construct(&ctx).unwrap();
        assert!(slot.set(Arc::clone(&engine)).is_ok());

        rx.recv_timeout(WAIT).unwrap();
        assert!(!headless(&engine).is_running());
    }
}
