//! # Display Mode State Machine
//!
//! [`DisplayModeController`] turns host callbacks into a list of [`Effect`]s.
//! It performs no I/O itself: the face engine executes the effects (arming the
//! render timer, connecting the companion channel, redrawing).
//!
//! ## Timer Policy
//!
//! The per-second render timer runs if and only if the face is visible and not
//! in ambient mode. Every transition re-evaluates that rule: a timer is armed when
//! it should run and is not running, and cancelled when it should not run.
//!
//! Each fired tick redraws once and re-arms for the next wall-clock boundary:
//!
//! ```text
//! delay = interval − (now mod interval)
//! ```
//!
//! Re-arming from the current time instead of adding a fixed interval to the
//! previous fire keeps ticks on true second boundaries no matter how late a
//! single tick is delivered.

use crate::geometry::ScreenShape;
use crate::scheduler::TickToken;
use crate::DisplayMode;

/// Phase of a tap gesture as reported by the host
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapKind {
    /// Finger down
    Touch,
    /// Gesture turned into something else (drag, swipe)
    TouchCancel,
    /// Tap completed
    Tap,
}

/// Everything the host (or the render timer) can tell the face
#[derive(Clone, Debug, PartialEq)]
pub enum FaceEvent {
    VisibilityChanged(bool),
    AmbientModeChanged(bool),
    PropertiesChanged {
        low_bit_ambient: bool,
    },
    InsetsChanged {
        shape: ScreenShape,
    },
    /// Once-a-minute host tick, delivered in every mode
    TimeTick,
    /// The system time zone changed
    TimeZoneChanged,
    Tap {
        kind: TapKind,
        x: i32,
        y: i32,
        timestamp_ms: i64,
    },
    TimerFired(TickToken),
}

/// Side effect requested by a transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Redraw,
    ArmTimer { delay_ms: u64 },
    DisarmTimer,
    /// Enable or disable text/icon smoothing (off in low-bit ambient)
    SetSmoothing(bool),
    RefreshTimeZone,
    ConnectRemote,
    SuspendRemote,
    ResolveGeometry(ScreenShape),
}

/// Milliseconds until the next multiple of `interval_ms`, in `1..=interval_ms`.
///
/// # Example
/// ```
/// use sunshine_face_lib::display_mode::next_tick_delay;
///
/// assert_eq!(next_tick_delay(12_345, 1000), 655);
/// assert_eq!(next_tick_delay(13_000, 1000), 1000);
/// ```
pub fn next_tick_delay(now_ms: i64, interval_ms: u64) -> u64 {
    let interval = interval_ms.max(1);
    let phase = now_ms.rem_euclid(interval as i64) as u64;
    interval - phase
}

/// Tracks visibility and ambient state and owns the timer policy
#[derive(Debug)]
pub struct DisplayModeController {
    visible: bool,
    ambient: bool,
    low_bit_ambient: bool,
    timer_armed: bool,
    interval_ms: u64,
}

impl DisplayModeController {
    /// Hidden, non-ambient, timer disarmed.
    pub fn new(interval_ms: u64) -> Self {
        DisplayModeController {
            visible: false,
            ambient: false,
            low_bit_ambient: false,
            timer_armed: false,
            interval_ms: interval_ms.max(1),
        }
    }

    pub fn mode(&self) -> DisplayMode {
        DisplayMode::derive(self.visible, self.ambient, self.low_bit_ambient)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_ambient(&self) -> bool {
        self.ambient
    }

    pub fn timer_armed(&self) -> bool {
        self.timer_armed
    }

    /// Smoothing is only dropped in ambient mode on low-bit displays.
    pub fn smoothing(&self) -> bool {
        !(self.ambient && self.low_bit_ambient)
    }

    /// Whether the per-second timer should be running right now.
    pub fn should_run(&self) -> bool {
        self.visible && !self.ambient
    }

    /// Apply one event at wall-clock time `now_ms`.
    pub fn transition(&mut self, event: &FaceEvent, now_ms: i64) -> Vec<Effect> {
        match *event {
            FaceEvent::VisibilityChanged(visible) => self.set_visible(visible, now_ms),
            FaceEvent::AmbientModeChanged(ambient) => self.set_ambient(ambient, now_ms),
            FaceEvent::PropertiesChanged { low_bit_ambient } => {
                self.set_low_bit_ambient(low_bit_ambient)
            }
            FaceEvent::InsetsChanged { shape } => {
                vec![Effect::ResolveGeometry(shape), Effect::Redraw]
            }
            FaceEvent::TimeTick => vec![Effect::Redraw],
            FaceEvent::TimeZoneChanged => self.on_time_zone_changed(),
            FaceEvent::Tap { kind, .. } => self.on_tap(kind),
            FaceEvent::TimerFired(_) => self.on_timer_fired(now_ms),
        }
    }

    fn set_visible(&mut self, visible: bool, now_ms: i64) -> Vec<Effect> {
        let mut effects = Vec::new();
        if visible != self.visible {
            self.visible = visible;
            if visible {
                effects.push(Effect::RefreshTimeZone);
                effects.push(Effect::ConnectRemote);
                effects.push(Effect::Redraw);
            } else {
                effects.push(Effect::SuspendRemote);
            }
        }
        self.update_timer(now_ms, &mut effects);
        effects
    }

    fn set_ambient(&mut self, ambient: bool, now_ms: i64) -> Vec<Effect> {
        let mut effects = Vec::new();
        if ambient != self.ambient {
            self.ambient = ambient;
            if self.low_bit_ambient {
                effects.push(Effect::SetSmoothing(!ambient));
            }
            effects.push(Effect::Redraw);
        }
        self.update_timer(now_ms, &mut effects);
        effects
    }

    /// Only matters while ambient, where it flips smoothing and the mode.
    fn set_low_bit_ambient(&mut self, low_bit_ambient: bool) -> Vec<Effect> {
        let smoothing = self.smoothing();
        self.low_bit_ambient = low_bit_ambient;
        if self.smoothing() == smoothing {
            return Vec::new();
        }
        vec![Effect::SetSmoothing(self.smoothing()), Effect::Redraw]
    }

    /// A hidden face picks the zone up when it becomes visible again.
    fn on_time_zone_changed(&mut self) -> Vec<Effect> {
        if self.visible {
            vec![Effect::RefreshTimeZone, Effect::Redraw]
        } else {
            Vec::new()
        }
    }

    fn on_tap(&mut self, kind: TapKind) -> Vec<Effect> {
        match kind {
            TapKind::Tap => vec![Effect::Redraw],
            TapKind::Touch | TapKind::TouchCancel => Vec::new(),
        }
    }

    fn on_timer_fired(&mut self, now_ms: i64) -> Vec<Effect> {
        if !self.timer_armed {
            return Vec::new();
        }
        let mut effects = vec![Effect::Redraw];
        if self.should_run() {
            effects.push(Effect::ArmTimer {
                delay_ms: next_tick_delay(now_ms, self.interval_ms),
            });
        } else {
            self.timer_armed = false;
        }
        effects
    }

    fn update_timer(&mut self, now_ms: i64, effects: &mut Vec<Effect>) {
        if self.should_run() {
            if !self.timer_armed {
                self.timer_armed = true;
                effects.push(Effect::ArmTimer {
                    delay_ms: next_tick_delay(now_ms, self.interval_ms),
                });
            }
        } else if self.timer_armed {
            self.timer_armed = false;
            effects.push(Effect::DisarmTimer);
        }
    }
}
