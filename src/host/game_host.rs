//=========================================================================
// GameHost
//=========================================================================
//
// Owns the single engine instance bound to one attachment point.
//
// Lifecycle:
//   initialize(container)
//     1. claim attachment point, subscribe to SCENE_READY, → Initializing
//     2. loader.load().await                      (only suspension point)
//     3. factory.construct(ctx)
//     4. populate GameHandle, → Ready
//     5. replay readiness events buffered during 1-4, in arrival order
//   teardown()
//     → Destroyed, unsubscribe, detach handle, destroy engine, release point
//
// Races:
// - construction waits until no engine is being constructed or destroyed,
//   so at most one instance is alive at any instant.
// - teardown during 2 or 3 moves the lineage to Destroyed; whatever the
//   in-flight attempt produces afterwards is destroyed on the spot and
//   never reaches the handle.
// - readiness delivery and teardown are serialized by the delivery gate,
//   so nothing from a lineage is delivered after its teardown returns.
// - the lifecycle lock is never held while the engine is constructed or
//   destroyed, or while the observer runs.
// - lock order: gate → lifecycle. Nothing waits for a transient engine
//   or destroys an engine while holding the gate; teardown from inside
//   the observer defers destruction to the frame that owns the gate.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use tokio::sync::watch;

//=== Internal Dependencies ===============================================

use super::builder::{GameHostBuilder, SceneObserver};
use super::state::LifecycleSnapshot;
use super::{GameHandle, HostError, HostState};
use crate::core::attachment::{AttachmentClaim, AttachmentRegistry};
use crate::core::engine::{EngineContext, EngineFactory, EngineId, EngineLoader, GameEngine};
use crate::core::event_channel::{Callback, EventChannel, SubscriptionToken};
use crate::core::scene::{SceneRef, SCENE_READY};

//=== Delivery Scope ======================================================

thread_local! {
    // Hosts whose observer is running on this thread.
    static DELIVERING: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

struct DeliveryScope {
    host: u64,
}

impl DeliveryScope {
    fn enter(host: u64) -> Self {
        DELIVERING.with(|d| d.borrow_mut().push(host));
        Self { host }
    }

    fn is_active(host: u64) -> bool {
        DELIVERING.with(|d| d.borrow().contains(&host))
    }
}

impl Drop for DeliveryScope {
    fn drop(&mut self) {
        DELIVERING.with(|d| {
            let mut active = d.borrow_mut();
            if let Some(pos) = active.iter().rposition(|h| *h == self.host) {
                active.remove(pos);
            }
        });
    }
}

//=== TransientEngine =====================================================

/// Accounts for an engine that exists outside `Lifecycle::engine` while it
/// is being constructed or destroyed. Dropping it ends the transient phase.
struct TransientEngine<'a> {
    host: &'a HostShared,
    armed: bool,
}

impl TransientEngine<'_> {
    /// Ends the transient phase while the caller already holds the lock.
    fn settle(mut self, lc: &mut Lifecycle) {
        self.armed = false;
        lc.transient -= 1;
        self.host.transient_done.notify_all();
    }
}

impl Drop for TransientEngine<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut lc = self.host.lifecycle();
        lc.transient -= 1;
        self.host.transient_done.notify_all();
    }
}

//=== Lifecycle ===========================================================

struct Lifecycle {
    state: HostState,
    lineage: u64,
    container: Option<String>,
    engine: Option<Arc<dyn GameEngine>>,
    handle: Option<GameHandle>,
    claim: Option<AttachmentClaim>,
    subscription: Option<SubscriptionToken>,
    pending: Vec<SceneRef>,
    last_error: Option<HostError>,
    transient: usize,
    // Torn down from inside the observer; destroyed once the gate is free.
    retired: Vec<(Arc<dyn GameEngine>, Option<AttachmentClaim>)>,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: HostState::Uninitialized,
            lineage: 0,
            container: None,
            engine: None,
            handle: None,
            claim: None,
            subscription: None,
            pending: Vec::new(),
            last_error: None,
            transient: 0,
            retired: Vec::new(),
        }
    }

    fn advance(&mut self, next: HostState) -> bool {
        if !self.state.permits(next) {
            trace!("Ignoring transition {:?} -> {:?}", self.state, next);
            return false;
        }
        self.state = next;
        true
    }

    fn snapshot(&self) -> LifecycleSnapshot {
        LifecycleSnapshot {
            state: self.state,
            lineage: self.lineage,
        }
    }

    /// True while `lineage` is the attempt currently initializing.
    fn is_initializing(&self, lineage: u64) -> bool {
        self.lineage == lineage && self.state == HostState::Initializing
    }
}

//=== HostShared ==========================================================

struct HostShared {
    id: u64,
    events: EventChannel<SceneRef>,
    attachments: AttachmentRegistry,
    loader: Arc<dyn EngineLoader>,
    observer: Option<SceneObserver>,
    load_timeout: Option<Duration>,
    lifecycle: Mutex<Lifecycle>,
    transient_done: Condvar,
    gate: Mutex<()>,
    snapshot: watch::Sender<LifecycleSnapshot>,
    next_lineage: AtomicU64,
}

impl HostShared {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits until no engine is being constructed or destroyed.
    fn quiescent_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.transient_done
            .wait_while(self.lifecycle(), |lc| lc.transient > 0)
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn transient(&self, lc: &mut Lifecycle) -> TransientEngine<'_> {
        lc.transient += 1;
        TransientEngine {
            host: self,
            armed: true,
        }
    }

    /// Serializes delivery against teardown. Re-entrant calls from inside
    /// this host's observer skip the gate.
    fn enter_gate(&self) -> Option<MutexGuard<'_, ()>> {
        if DeliveryScope::is_active(self.id) {
            return None;
        }
        Some(self.gate.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn publish_snapshot(&self, lifecycle: &Lifecycle) {
        self.snapshot.send_replace(lifecycle.snapshot());
    }

    fn readiness_callback(self: &Arc<Self>, lineage: u64) -> Callback<SceneRef> {
        let host = Arc::downgrade(self);
        Arc::new(move |scene: &SceneRef| {
            if let Some(host) = host.upgrade() {
                host.on_scene_ready(lineage, scene);
            }
        })
    }

    //--- Readiness Relay --------------------------------------------------

    fn on_scene_ready(&self, lineage: u64, scene: &SceneRef) {
        let gate = self.enter_gate();

        let handle = {
            let mut lc = self.lifecycle();
            if lc.lineage != lineage {
                trace!("Readiness of '{}' belongs to a retired lineage", scene.key());
                return;
            }
            match lc.state {
                HostState::Initializing => {
                    debug!(
                        "Buffering readiness of '{}' until the handle is populated",
                        scene.key()
                    );
                    lc.pending.push(scene.clone());
                    return;
                }
                HostState::Ready => {}
                _ => return,
            }
            let Some(handle) = lc.handle.clone() else {
                return;
            };
            if handle.engine_id() != Some(scene.engine()) {
                trace!("Ignoring readiness of '{}' from {}", scene.key(), scene.engine());
                return;
            }
            handle
        };

        self.deliver(&handle, scene);

        if gate.is_some() {
            drop(gate);
            self.destroy_retired();
        }
    }

    /// Destroys engines retired by re-entrant teardown.
    fn destroy_retired(&self) {
        let retired = std::mem::take(&mut self.lifecycle().retired);
        for (engine, claim) in retired {
            info!("Destroying {} on '{}'", engine.id(), engine.container());
            engine.destroy();
            drop(claim);
            let mut lc = self.lifecycle();
            lc.transient -= 1;
            self.transient_done.notify_all();
        }
    }

    fn deliver(&self, handle: &GameHandle, scene: &SceneRef) {
        if !handle.set_active_scene(scene) {
            return;
        }
        debug!("Active scene is now '{}' ({})", scene.key(), scene.engine());

        if let Some(observer) = &self.observer {
            let _scope = DeliveryScope::enter(self.id);
            if panic::catch_unwind(AssertUnwindSafe(|| observer(scene))).is_err() {
                error!("Scene observer panicked while handling '{}'", scene.key());
            }
        }
    }
}

impl Drop for HostShared {
    fn drop(&mut self) {
        let lc = self.lifecycle.get_mut().unwrap_or_else(PoisonError::into_inner);

        if let Some(token) = lc.subscription.take() {
            self.events.unsubscribe_token(&token);
        }
        if let Some(handle) = lc.handle.take() {
            handle.detach();
        }
        let retired = std::mem::take(&mut lc.retired);
        if let Some(engine) = lc.engine.take() {
            info!("Host dropped while ready, destroying {}", engine.id());
            engine.destroy();
        }
        for (engine, _claim) in retired {
            engine.destroy();
        }
    }
}

//=== InitAttempt =========================================================

/// One in-flight initialization. Abandoning it (dropping the `initialize`
/// future) fails its lineage and releases the attachment point.
///
/// The attachment claim is held by `Lifecycle`; teardown releases it even
/// while the loader is still pending.
struct InitAttempt {
    host: Arc<HostShared>,
    lineage: u64,
    container: String,
    settled: bool,
}

impl InitAttempt {
    fn complete(
        mut self,
        loaded: Result<Arc<dyn EngineFactory>, HostError>,
    ) -> Result<GameHandle, HostError> {
        let factory = match loaded {
            Ok(factory) => factory,
            Err(err) => return Err(self.fail(err)),
        };

        let host = Arc::clone(&self.host);
        let transient = {
            let mut lc = host.quiescent_lifecycle();
            if !lc.is_initializing(self.lineage) {
                self.settled = true;
                debug!(
                    "Factory for '{}' loaded after teardown; skipping construction",
                    self.container
                );
                return Err(HostError::Cancelled);
            }
            host.transient(&mut lc)
        };

        let ctx = EngineContext {
            engine_id: EngineId::next(),
            container: self.container.clone(),
            events: host.events.clone(),
        };

        debug!("Constructing {} on '{}'", ctx.engine_id, ctx.container);
        match factory.construct(&ctx) {
            Ok(engine) => {
                if engine.id() != ctx.engine_id {
                    warn!(
                        "Factory returned {} instead of the assigned {}",
                        engine.id(),
                        ctx.engine_id
                    );
                }
                self.finish(engine, transient)
            }
            Err(err) => {
                drop(transient);
                Err(self.fail(HostError::Initialization(err.to_string())))
            }
        }
    }

    fn fail(&mut self, err: HostError) -> HostError {
        self.settled = true;

        let (token, claim) = {
            let mut lc = self.host.lifecycle();
            if !lc.is_initializing(self.lineage) {
                return HostError::Cancelled;
            }
            lc.advance(HostState::Failed);
            lc.pending.clear();
            lc.last_error = Some(err.clone());
            self.host.publish_snapshot(&lc);
            (lc.subscription.take(), lc.claim.take())
        };

        if let Some(token) = token {
            self.host.events.unsubscribe_token(&token);
        }
        drop(claim);
        error!("Initialization on '{}' failed: {}", self.container, err);
        err
    }

    fn finish(
        mut self,
        engine: Arc<dyn GameEngine>,
        transient: TransientEngine<'_>,
    ) -> Result<GameHandle, HostError> {
        self.settled = true;
        let host = Arc::clone(&self.host);
        let gate = host.enter_gate();

        let (handle, backlog) = {
            let mut lc = host.lifecycle();
            if !lc.is_initializing(self.lineage) {
                drop(lc);
                drop(gate);
                warn!(
                    "Discarding {} for '{}': host was torn down during initialization",
                    engine.id(),
                    self.container
                );
                engine.destroy();
                drop(transient);
                return Err(HostError::Cancelled);
            }

            let handle = GameHandle::new(self.lineage, Arc::clone(&engine));
            lc.engine = Some(Arc::clone(&engine));
            lc.handle = Some(handle.clone());
            lc.advance(HostState::Ready);
            transient.settle(&mut lc);
            (handle, std::mem::take(&mut lc.pending))
        };

        info!("{} ready on '{}'", engine.id(), self.container);

        for scene in backlog {
            if scene.engine() != engine.id() {
                trace!("Dropping buffered readiness of '{}' from {}", scene.key(), scene.engine());
                continue;
            }
            host.deliver(&handle, &scene);
        }

        if gate.is_some() {
            drop(gate);
            host.destroy_retired();
        }
        host.publish_snapshot(&host.lifecycle());
        Ok(handle)
    }
}

impl Drop for InitAttempt {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let (token, claim) = {
            let mut lc = self.host.lifecycle();
            if !lc.is_initializing(self.lineage) {
                return;
            }
            lc.advance(HostState::Failed);
            lc.pending.clear();
            lc.last_error = Some(HostError::Initialization(
                "initialization abandoned before completion".into(),
            ));
            self.host.publish_snapshot(&lc);
            (lc.subscription.take(), lc.claim.take())
        };

        if let Some(token) = token {
            self.host.events.unsubscribe_token(&token);
        }
        drop(claim);
        warn!("Initialization on '{}' was abandoned", self.container);
    }
}

//=== GameHost ============================================================

enum Begin {
    Existing(GameHandle),
    Queued(u64),
    Started(InitAttempt),
}

/// Lifecycle manager for one embedded engine instance.
///
/// Cloning yields another handle to the same host, so `initialize` and
/// `teardown` may be driven from different tasks.
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # use aetheric_bridge::core::{ReadyLoader, SceneRef};
/// # use aetheric_bridge::headless::HeadlessFactory;
/// # use aetheric_bridge::host::GameHost;
/// # async fn mount() -> Result<(), aetheric_bridge::host::HostError> {
/// # let factory = HeadlessFactory::new("Boot");
/// let host = GameHost::builder(Arc::new(ReadyLoader::new(Arc::new(factory))))
///     .with_observer(Arc::new(|scene: &SceneRef| println!("now showing {}", scene.key())))
///     .build();
///
/// let handle = host.initialize("game-container").await?;
/// assert!(handle.is_attached());
///
/// host.teardown();
/// assert!(!handle.is_attached());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GameHost {
    shared: Arc<HostShared>,
}

impl GameHost {
    //--- Construction -----------------------------------------------------

    /// Starts configuring a host around `loader`.
    pub fn builder(loader: Arc<dyn EngineLoader>) -> GameHostBuilder {
        GameHostBuilder::new(loader)
    }

    pub(super) fn from_builder(builder: GameHostBuilder) -> Self {
        static NEXT_HOST: AtomicU64 = AtomicU64::new(1);

        let lifecycle = Lifecycle::new();
        let (snapshot, _) = watch::channel(lifecycle.snapshot());

        Self {
            shared: Arc::new(HostShared {
                id: NEXT_HOST.fetch_add(1, Ordering::Relaxed),
                events: builder.events,
                attachments: builder.attachments,
                loader: builder.loader,
                observer: builder.observer,
                load_timeout: builder.load_timeout,
                lifecycle: Mutex::new(lifecycle),
                transient_done: Condvar::new(),
                gate: Mutex::new(()),
                snapshot,
                next_lineage: AtomicU64::new(1),
            }),
        }
    }

    //--- Lifecycle --------------------------------------------------------

    /// Starts (or joins) initialization of the engine on `container`.
    ///
    /// - `Ready`: returns the current handle; `container` is not re-bound.
    /// - `Initializing`: waits for the in-flight attempt and shares its result.
    /// - otherwise: starts a new lineage with a new handle identity.
    ///
    /// # Errors
    ///
    /// - [`HostError::AttachmentInUse`] if another host holds `container`
    /// - [`HostError::Initialization`] if loading or construction failed
    /// - [`HostError::LoadTimeout`] if the configured load limit elapsed
    /// - [`HostError::Cancelled`] if [`GameHost::teardown`] ran first
    pub async fn initialize(&self, container: &str) -> Result<GameHandle, HostError> {
        let attempt = match self.begin(container)? {
            Begin::Existing(handle) => return Ok(handle),
            Begin::Queued(lineage) => return self.wait_for(lineage).await,
            Begin::Started(attempt) => attempt,
        };

        let loaded = self.load_factory().await;
        attempt.complete(loaded)
    }

    fn begin(&self, container: &str) -> Result<Begin, HostError> {
        let host = &self.shared;
        let mut lc = host.lifecycle();

        match (lc.state, lc.handle.clone()) {
            (HostState::Ready, Some(handle)) => {
                if lc.container.as_deref() != Some(container) {
                    warn!(
                        "Host already bound to '{}'; ignoring request for '{}'",
                        lc.container.as_deref().unwrap_or_default(),
                        container
                    );
                }
                return Ok(Begin::Existing(handle));
            }
            (HostState::Initializing, _) => {
                debug!("Initialization already in flight; queueing");
                return Ok(Begin::Queued(lc.lineage));
            }
            _ => {}
        }

        let claim = host
            .attachments
            .claim(container)
            .ok_or_else(|| HostError::AttachmentInUse(container.to_owned()))?;

        let lineage = host.next_lineage.fetch_add(1, Ordering::Relaxed);
        let token = host.events.subscribe(SCENE_READY, host.readiness_callback(lineage));

        lc.lineage = lineage;
        lc.advance(HostState::Initializing);
        lc.container = Some(container.to_owned());
        lc.engine = None;
        lc.handle = None;
        lc.pending.clear();
        lc.last_error = None;
        lc.subscription = Some(token);
        lc.claim = Some(claim);
        host.publish_snapshot(&lc);

        info!("Initializing engine on '{}' (lineage {})", container, lineage);

        Ok(Begin::Started(InitAttempt {
            host: Arc::clone(host),
            lineage,
            container: container.to_owned(),
            settled: false,
        }))
    }

    async fn load_factory(&self) -> Result<Arc<dyn EngineFactory>, HostError> {
        let load = self.shared.loader.load();
        let loaded = match self.shared.load_timeout {
            Some(limit) => tokio::time::timeout(limit, load)
                .await
                .map_err(|_| HostError::LoadTimeout(limit))?,
            None => load.await,
        };
        loaded.map_err(|err| HostError::Initialization(err.to_string()))
    }

    async fn wait_for(&self, lineage: u64) -> Result<GameHandle, HostError> {
        let mut rx = self.shared.snapshot.subscribe();
        let settled = rx
            .wait_for(|s| s.lineage != lineage || s.state != HostState::Initializing)
            .await
            .map(|s| *s);

        let Ok(snapshot) = settled else {
            return Err(HostError::Cancelled);
        };
        if snapshot.lineage != lineage {
            return Err(HostError::Cancelled);
        }

        let lc = self.shared.lifecycle();
        if lc.lineage != lineage {
            return Err(HostError::Cancelled);
        }
        match (lc.state, lc.handle.clone()) {
            (HostState::Ready, Some(handle)) => Ok(handle),
            (HostState::Failed, _) => Err(lc
                .last_error
                .clone()
                .unwrap_or_else(|| HostError::Initialization("unknown failure".into()))),
            _ => Err(HostError::Cancelled),
        }
    }

    /// Destroys the engine (if any) and ends the current lineage.
    ///
    /// Safe to call repeatedly, before `initialize`, or while initialization
    /// is still in flight. In the last case the engine that attempt produces
    /// is destroyed as soon as it appears.
    pub fn teardown(&self) {
        let host = &self.shared;
        let gate = host.enter_gate();

        let (engine, transient, handle, token, claim) = {
            let mut lc = host.lifecycle();
            match lc.state {
                HostState::Initializing => {
                    info!(
                        "Teardown during initialization on '{}'; pending engine will be discarded",
                        lc.container.as_deref().unwrap_or_default()
                    );
                }
                HostState::Ready => {}
                state => {
                    trace!("Teardown in {:?} is a no-op", state);
                    return;
                }
            }

            lc.advance(HostState::Destroyed);
            lc.pending.clear();
            host.publish_snapshot(&lc);
            let mut engine = lc.engine.take();
            if gate.is_none() {
                if let Some(engine) = engine.take() {
                    debug!("Deferring destruction of {} until delivery completes", engine.id());
                    let claim = lc.claim.take();
                    lc.transient += 1;
                    lc.retired.push((engine, claim));
                }
            }
            let transient = engine.as_ref().map(|_| host.transient(&mut lc));
            (
                engine,
                transient,
                lc.handle.take(),
                lc.subscription.take(),
                lc.claim.take(),
            )
        };

        if let Some(token) = token {
            host.events.unsubscribe_token(&token);
        }
        if let Some(handle) = handle {
            handle.detach();
        }
        drop(gate);

        if let Some(engine) = engine {
            info!("Destroying {} on '{}'", engine.id(), engine.container());
            engine.destroy();
        }
        drop(transient);
        drop(claim);
    }

    //--- Query API --------------------------------------------------------

    pub fn state(&self) -> HostState {
        self.shared.lifecycle().state
    }

    /// Handle of the current lineage while `Ready`.
    pub fn handle(&self) -> Option<GameHandle> {
        self.shared.lifecycle().handle.clone()
    }

    /// Attachment point of the current or most recent lineage.
    pub fn container(&self) -> Option<String> {
        self.shared.lifecycle().container.clone()
    }

    /// Error that ended the most recent lineage, if it failed.
    pub fn last_error(&self) -> Option<HostError> {
        self.shared.lifecycle().last_error.clone()
    }

    pub fn events(&self) -> &EventChannel<SceneRef> {
        &self.shared.events
    }

    pub fn attachments(&self) -> &AttachmentRegistry {
        &self.shared.attachments
    }
}

impl std::fmt::Debug for GameHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lc = self.shared.lifecycle();
        f.debug_struct("GameHost")
            .field("state", &lc.state)
            .field("lineage", &lc.lineage)
            .field("container", &lc.container)
            .finish()
    }
}

//=========================================================================
// Tests
//=========================================================================
