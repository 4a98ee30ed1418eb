//! # Watch Face Engine
//!
//! [`WatchFace`] is the single cooperative event loop behind the face. It owns
//! every piece of mutable state and is the only place that state changes:
//!
//! - host callbacks arrive as [`FaceEvent`]s and go through the
//!   [`DisplayModeController`]
//! - the resulting [`Effect`]s arm or cancel the render timer, connect or suspend
//!   the companion channel, and request redraws
//! - results of channel operations come back as [`SyncMessage`]s
//! - expired render ticks come back as [`TickToken`]s
//!
//! Redraws requested while handling one event are coalesced into a single frame.

use crate::config::{Config, LayoutConfig};
use crate::display_mode::{DisplayModeController, Effect, FaceEvent};
use crate::geometry::GeometryConfig;
use crate::remote::RemoteChannel;
use crate::renderer::{draw_face, FaceStyle, Framebuffer, FrameInputs};
use crate::scheduler::{TickScheduler, TickToken};
use crate::weather_sync::{SyncMessage, WeatherSyncService};
use crate::{DisplayMode, WeatherSnapshot};
use chrono::{DateTime, FixedOffset, Local, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Called with every finished frame
pub type Presenter = Box<dyn FnMut(&Framebuffer, DisplayMode) + Send>;

pub struct WatchFace<C: RemoteChannel> {
    controller: DisplayModeController,
    sync: WeatherSyncService<C>,
    scheduler: TickScheduler,
    layout: LayoutConfig,
    geometry: Option<GeometryConfig>,
    style: FaceStyle,
    smoothing: bool,
    time_zone: FixedOffset,
    frame: Framebuffer,
    frames: u64,
    presenter: Option<Presenter>,
    sync_rx: mpsc::UnboundedReceiver<SyncMessage>,
    tick_rx: mpsc::UnboundedReceiver<TickToken>,
}

impl<C: RemoteChannel> WatchFace<C> {
    /// Hidden face talking to the companion through `channel`.
    pub fn new(channel: Arc<C>, config: &Config) -> Self {
        let (sync_tx, sync_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();

        WatchFace {
            controller: DisplayModeController::new(config.timing.interactive_update_ms),
            sync: WeatherSyncService::new(channel, &config.sync, sync_tx),
            scheduler: TickScheduler::new(tick_tx),
            layout: config.layout.clone(),
            geometry: None,
            style: FaceStyle::from(&config.theme),
            smoothing: true,
            time_zone: *Local::now().offset(),
            frame: Framebuffer::new(config.display.width, config.display.height),
            frames: 0,
            presenter: None,
            sync_rx,
            tick_rx,
        }
    }

    /// Hand every finished frame to `presenter`.
    pub fn set_presenter(
        &mut self,
        presenter: impl FnMut(&Framebuffer, DisplayMode) + Send + 'static,
    ) {
        self.presenter = Some(Box::new(presenter));
    }

    pub fn mode(&self) -> DisplayMode {
        self.controller.mode()
    }

    /// Number of frames drawn so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn frame(&self) -> &Framebuffer {
        &self.frame
    }

    pub fn weather(&self) -> Arc<WeatherSnapshot> {
        self.sync.snapshot()
    }

    pub fn sync(&self) -> &WeatherSyncService<C> {
        &self.sync
    }

    pub fn geometry(&self) -> Option<&GeometryConfig> {
        self.geometry.as_ref()
    }

    pub fn smoothing(&self) -> bool {
        self.smoothing
    }

    /// Offset used to format the time, refreshed on visibility and zone changes.
    pub fn time_zone(&self) -> FixedOffset {
        self.time_zone
    }

    /// Whether a render tick is outstanding.
    pub fn timer_armed(&self) -> bool {
        self.scheduler.is_armed()
    }

    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.time_zone)
    }

    /// Apply one host event (or timer fire) and execute its effects.
    pub fn handle(&mut self, event: FaceEvent) {
        if let FaceEvent::TimerFired(token) = event {
            if !self.scheduler.accept(token) {
                return;
            }
        }
        let now_ms = self.now().timestamp_millis();
        let effects = self.controller.transition(&event, now_ms);
        log::trace!("{:?} -> {:?}", event, effects);
        self.execute(effects);
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        let mut redraw = false;
        for effect in effects {
            match effect {
                Effect::Redraw => redraw = true,
                Effect::ArmTimer { delay_ms } => {
                    self.scheduler.arm(delay_ms);
                }
                Effect::DisarmTimer => self.scheduler.disarm(),
                Effect::SetSmoothing(on) => self.smoothing = on,
                Effect::RefreshTimeZone => {
                    self.time_zone = *Local::now().offset();
                    log::debug!("time zone offset {}", self.time_zone);
                }
                Effect::ConnectRemote => self.sync.connect(),
                Effect::SuspendRemote => self.sync.suspend(),
                Effect::ResolveGeometry(shape) => {
                    log::info!("screen shape {:?}", shape);
                    self.geometry = Some(GeometryConfig::resolve(shape, &self.layout));
                }
            }
        }
        if redraw {
            self.invalidate();
        }
    }

    fn on_sync_message(&mut self, message: SyncMessage) {
        if self.sync.apply(message) {
            self.invalidate();
        }
    }

    /// Redraw unless the screen is hidden.
    fn invalidate(&mut self) {
        if self.controller.is_visible() {
            self.draw();
        } else {
            log::trace!("redraw skipped while hidden");
        }
    }

    /// Render one frame with the data available right now.
    pub fn draw(&mut self) {
        let mode = self.controller.mode();
        let snapshot = self.sync.snapshot();
        let inputs = FrameInputs {
            mode,
            snapshot: &snapshot,
            geometry: self.geometry.as_ref(),
            now: self.now(),
            style: &self.style,
            smoothing: self.smoothing,
        };
        // Framebuffer drawing cannot fail
        draw_face(&mut self.frame, &inputs).unwrap_or_else(|never| match never {});
        self.frames += 1;

        if let Some(presenter) = self.presenter.as_mut() {
            presenter(&self.frame, mode);
        }
    }

    /// Run until the host closes its event channel.
    ///
    /// State is left as is; a host tearing the face down sends
    /// `VisibilityChanged(false)` first. Calling `run` again resumes the loop.
    pub async fn run(&mut self, mut host_events: mpsc::UnboundedReceiver<FaceEvent>) {
        log::debug!("event loop started");
        loop {
            tokio::select! {
                event = host_events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
                Some(message) = self.sync_rx.recv() => self.on_sync_message(message),
                Some(token) = self.tick_rx.recv() => self.handle(FaceEvent::TimerFired(token)),
            }
        }
        log::info!("host event channel closed after {} frames", self.frames);
    }
}
