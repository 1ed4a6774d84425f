//=========================================================================
// Host Demo
//=========================================================================
//
// Mounts a headless engine into a host, drives the main menu through
// scene-specific capabilities, then tears everything down.
//
// Run with:
//   RUST_LOG=debug cargo run --example host_demo
//
//=========================================================================

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aetheric_bridge::prelude::*;
use log::{info, warn};

//=== Scenes ==============================================================

struct Boot {
    ctx: SceneContext,
}

impl Scene for Boot {
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

impl HeadlessScene for Boot {
    fn create(&self) {
        self.ctx.start_scene("MainMenu");
    }
}

type PositionReporter = Box<dyn Fn(f32, f32) + Send>;

struct MainMenu {
    ctx: SceneContext,
    logo: Mutex<(f32, f32)>,
    reporter: Mutex<Option<PositionReporter>>,
}

impl MainMenu {
    fn new(ctx: &SceneContext) -> Self {
        Self {
            ctx: ctx.clone(),
            logo: Mutex::new((512.0, 300.0)),
            reporter: Mutex::new(None),
        }
    }

    fn change_scene(&self) {
        self.ctx.start_scene("Game");
    }

    /// Starts the logo moving, or stops it if it already is.
    fn move_logo(&self, report: impl Fn(f32, f32) + Send + 'static) {
        let Ok(mut reporter) = self.reporter.lock() else {
            return;
        };
        if reporter.take().is_none() {
            *reporter = Some(Box::new(report));
        }
    }
}

impl Scene for MainMenu {
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

impl HeadlessScene for MainMenu {
    fn update(&self, _tick: u64) {
        let (Ok(reporter), Ok(mut logo)) = (self.reporter.lock(), self.logo.lock()) else {
            return;
        };
        if let Some(report) = reporter.as_ref() {
            logo.0 = (logo.0 + 4.0) % 1024.0;
            logo.1 = (logo.1 + 2.0) % 768.0;
            report(logo.0, logo.1);
        }
    }
}

struct Game {
    ctx: SceneContext,
    sprites: Mutex<Vec<(u32, u32)>>,
}

impl Game {
    fn add_sprite(&self) -> usize {
        let Ok(mut sprites) = self.sprites.lock() else {
            return 0;
        };
        let n = sprites.len() as u32;
        sprites.push((64 + (n * 97) % 896, 64 + (n * 53) % 640));
        sprites.len()
    }
}

impl Scene for Game {
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

impl HeadlessScene for Game {}

//=== Helpers =============================================================

/// Polls until the active scene is a `T` or the deadline passes.
async fn wait_for_scene<T: Scene>(handle: &GameHandle) -> bool {
    for _ in 0..200 {
        if handle.with_active_scene(|_: &T| ()).is_some() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

//=== Main ================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), HostError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let factory = HeadlessFactory::new("Boot")
        .with_config(HeadlessConfig::new().with_tps(60.0))
        .with_scene("Boot", |ctx: &SceneContext| Boot { ctx: ctx.clone() })
        .with_scene("MainMenu", MainMenu::new)
        .with_scene("Game", |ctx: &SceneContext| Game {
            ctx: ctx.clone(),
            sprites: Mutex::new(Vec::new()),
        });

    let can_move_logo = Arc::new(AtomicBool::new(false));
    let observer: SceneObserver = {
        let can_move_logo = Arc::clone(&can_move_logo);
        Arc::new(move |scene: &SceneRef| {
            info!("Active scene: {}", scene.key());
            can_move_logo.store(scene.is::<MainMenu>(), Ordering::Release);
        })
    };

    let host = GameHost::builder(Arc::new(ReadyLoader::new(Arc::new(factory))))
        .with_observer(observer)
        .build();

    let handle = host.initialize("game-container").await?;

    //--- Main menu --------------------------------------------------------

    if !wait_for_scene::<MainMenu>(&handle).await {
        warn!("Main menu never became active");
    }

    if can_move_logo.load(Ordering::Acquire) {
        handle.with_active_scene(|menu: &MainMenu| {
            menu.move_logo(|x, y| log::debug!("Logo at ({x:.0}, {y:.0})"));
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.with_active_scene(|menu: &MainMenu| menu.move_logo(|_, _| {}));
    }

    if handle.with_active_scene(|menu: &MainMenu| menu.change_scene()).is_none() {
        warn!("Change scene is only available from the main menu");
    }

    //--- Game -------------------------------------------------------------

    if wait_for_scene::<Game>(&handle).await {
        for _ in 0..3 {
            if let Some(count) = handle.with_active_scene(|game: &Game| game.add_sprite()) {
                info!("Sprites on screen: {}", count);
            }
        }
    }

    if let Some(ticks) = handle.with_engine(|engine: &HeadlessEngine| engine.tick_count()) {
        info!("Engine ran {} ticks", ticks);
    }

    //--- Teardown ---------------------------------------------------------

    host.teardown();
    info!(
        "Host is {:?}; handle attached: {}",
        host.state(),
        handle.is_attached()
    );

    Ok(())
}
