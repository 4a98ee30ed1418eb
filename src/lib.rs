//! # Sunshine Face Core Library
//!
//! This library provides the building blocks of a low-power digital watch face that
//! shows the time, the date and a small weather summary synced from a paired
//! companion device (typically a phone).
//!
//! ## Design Philosophy
//!
//! ### Battery Discipline
//! - **No idle timers**: the per-second render timer only runs while the face is
//!   visible and interactive. In ambient mode the host's once-a-minute time tick is
//!   the only source of redraws.
//! - **Phase-aligned ticks**: every interactive tick is scheduled for the next true
//!   wall-clock second boundary, so the displayed second never drifts.
//! - **No listening while hidden**: the live-update feed is unsubscribed and the
//!   channel disconnected as soon as the face becomes invisible.
//!
//! ### Never Block the Draw
//! Weather data arrives asynchronously. A draw always renders with whatever data
//! exists at that moment; a missing payload or icon simply means "draw less".
//!
//! ### Data Flow
//! 1. **Host events** (visibility, ambient, tick, tap) → [`display_mode`] transition
//!    function → list of effects
//! 2. **Effects** → [`face`] engine arms/disarms the [`scheduler`], connects or
//!    suspends the [`weather_sync`] service, requests redraws
//! 3. **Remote channel** results re-enter the same loop as messages and atomically
//!    swap the [`WeatherSnapshot`]
//! 4. **Draw**: [`renderer::draw_face`] is a pure function of mode, snapshot,
//!    geometry and time
//!
//! ## Core Types
//! - [`DisplayMode`]: what the screen is currently doing
//! - [`WeatherSnapshot`]: the cached weather summary, replaced wholesale

use std::sync::Arc;

// Module declarations
pub mod companion;
pub mod config;
pub mod display_mode;
pub mod face;
pub mod geometry;
pub mod icon;
pub mod remote;
pub mod renderer;
pub mod scheduler;
pub mod weather_sync;

#[cfg(test)]
mod tests;

use icon::Icon;

/// Current display state of the face.
///
/// Derived from the host's `visible` and `ambient` flags plus the low-bit ambient
/// capability reported once at startup. It is never stored independently of those
/// flags, so it cannot disagree with them.
///
/// # Example
/// ```
/// use sunshine_face_lib::DisplayMode;
///
/// assert_eq!(DisplayMode::derive(false, true, true), DisplayMode::Hidden);
/// assert_eq!(DisplayMode::derive(true, true, true), DisplayMode::AmbientLowPower);
/// assert_eq!(DisplayMode::derive(true, true, false), DisplayMode::AmbientNormal);
/// assert_eq!(DisplayMode::derive(true, false, true), DisplayMode::Interactive);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayMode {
    /// Screen is off or covered; nothing is drawn and no timer runs
    Hidden,
    /// Ambient mode on a display with reduced colour depth
    AmbientLowPower,
    /// Ambient mode on a full colour display
    AmbientNormal,
    /// Visible and awake; seconds are shown and ticked
    Interactive,
}

impl DisplayMode {
    /// Derive the mode from the host flags.
    pub fn derive(visible: bool, ambient: bool, low_bit_ambient: bool) -> Self {
        match (visible, ambient) {
            (false, _) => DisplayMode::Hidden,
            (true, true) if low_bit_ambient => DisplayMode::AmbientLowPower,
            (true, true) => DisplayMode::AmbientNormal,
            (true, false) => DisplayMode::Interactive,
        }
    }

    /// True for both ambient variants.
    pub fn is_ambient(self) -> bool {
        matches!(
            self,
            DisplayMode::AmbientLowPower | DisplayMode::AmbientNormal
        )
    }
}

/// Cached weather summary received from the companion.
///
/// A snapshot is immutable. Updates build a new record and the owner swaps the
/// `Arc` in one step, so a draw observes either the whole previous temperature
/// pair or the whole next one, never a mix.
///
/// The temperature pair and the icon are independent optional fields: a new
/// payload replaces the temperatures immediately and keeps the current icon,
/// while a decoded icon replaces only the icon. An icon that fails to decode
/// clears it.
///
/// # Example
/// ```
/// use sunshine_face_lib::WeatherSnapshot;
///
/// let empty = WeatherSnapshot::default();
/// assert!(empty.is_empty());
///
/// let next = empty.with_temperatures(Some("75°".into()), Some("54°".into()));
/// assert_eq!(next.temperature_pair(), Some(("75°", "54°")));
/// assert!(next.icon.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct WeatherSnapshot {
    /// Display-ready high temperature (e.g. "75°")
    pub high_temp: Option<String>,
    /// Display-ready low temperature (e.g. "54°")
    pub low_temp: Option<String>,
    /// Decoded condition icon, if one has been resolved
    pub icon: Option<Arc<Icon>>,
}

impl WeatherSnapshot {
    /// New record with the given temperatures and the current icon.
    pub fn with_temperatures(&self, high_temp: Option<String>, low_temp: Option<String>) -> Self {
        WeatherSnapshot {
            high_temp,
            low_temp,
            icon: self.icon.clone(),
        }
    }

    /// New record with the current temperatures and the given icon.
    pub fn with_icon(&self, icon: Arc<Icon>) -> Self {
        WeatherSnapshot {
            high_temp: self.high_temp.clone(),
            low_temp: self.low_temp.clone(),
            icon: Some(icon),
        }
    }

    /// New record with the current temperatures and no icon.
    pub fn without_icon(&self) -> Self {
        WeatherSnapshot {
            high_temp: self.high_temp.clone(),
            low_temp: self.low_temp.clone(),
            icon: None,
        }
    }

    /// Both temperatures, only when both are present.
    pub fn temperature_pair(&self) -> Option<(&str, &str)> {
        match (&self.high_temp, &self.low_temp) {
            (Some(high), Some(low)) => Some((high.as_str(), low.as_str())),
            _ => None,
        }
    }

    /// True when nothing has been received yet.
    pub fn is_empty(&self) -> bool {
        self.high_temp.is_none() && self.low_temp.is_none() && self.icon.is_none()
    }
}
