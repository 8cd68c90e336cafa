//! View and announcement coordination.
//!
//! Turns session events into map and voice effects through narrow
//! capability traits the shell implements. Also owns the view mode
//! (follow, overview, north-up, tilt) and the two timers of the UI:
//! the delayed stop after arrival and the tilt auto-revert. Time
//! arrives through `now_ms`; deadlines fire in [`Coordinator::tick`].

use log::debug;
use serde::Serialize;

use crate::geo::{Coordinate, GeoBounds};
use crate::indicators::{self, DirectionArrow, TurnMarker};
use crate::session::{NavEvent, NavigationSession};
use crate::track::UserMarker;

/// Zoom for the position-centered modes.
pub const FOLLOW_ZOOM: u8 = 16;
/// Zoom for the perspective mode, closer to the ground.
pub const TILT_ZOOM: u8 = 18;
/// The perspective view reverts to follow after this long.
pub const TILT_REVERT_MS: u64 = 8_000;
/// Pause between the arrival announcement and the automatic stop.
pub const ARRIVAL_STOP_DELAY_MS: u64 = 3_000;
/// Haptic feedback length for user taps.
pub const TAP_PULSE_MS: u32 = 20;

/// Spoken when voice guidance is switched back on.
pub const VOICE_ENABLED_ANNOUNCEMENT: &str = "Voice guidance enabled";

/// Map operations the shell provides. All are fire-and-forget; the
/// core never reads map state back.
pub trait MapSurface {
    fn draw_route(&mut self, geometry: &[Coordinate]);
    fn clear_route(&mut self);
    fn set_endpoint_markers(&mut self, origin: Coordinate, destination: Coordinate);
    fn clear_endpoint_markers(&mut self);
    fn update_user_marker(&mut self, marker: &UserMarker);
    fn show_arrows(&mut self, arrows: &[DirectionArrow], next_turn: Option<&TurnMarker>);
    fn clear_arrows(&mut self);
    fn fit_bounds(&mut self, bounds: GeoBounds);
    /// Centers and zooms, animated.
    fn fly_to(&mut self, center: Coordinate, zoom: u8);
    /// Centers at the current zoom.
    fn pan_to(&mut self, center: Coordinate);
    fn set_perspective(&mut self, enabled: bool);
    fn reset_orientation(&mut self);
}

/// Speech synthesis seam.
pub trait VoiceSink {
    fn announce(&mut self, text: &str);
}

/// Vibration seam.
pub trait Haptics {
    fn pulse_ms(&mut self, duration_ms: u32);
}

/// How the map camera behaves during navigation. Exactly one mode is
/// active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViewMode {
    Follow,
    Overview,
    NorthUp,
    Tilt,
}

/// Applies session events and view-mode switches to the surfaces.
#[derive(Debug)]
pub struct Coordinator {
    mode: ViewMode,
    stop_at_ms: Option<u64>,
    tilt_revert_at_ms: Option<u64>,
}

impl Coordinator {
    pub fn new() -> Self {
        Coordinator {
            mode: ViewMode::Follow,
            stop_at_ms: None,
            tilt_revert_at_ms: None,
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// React to one session event. Announcements go out only while
    /// voice guidance is on; map effects always happen.
    pub fn on_event(
        &mut self,
        event: &NavEvent,
        session: &NavigationSession,
        now_ms: u64,
        surface: &mut dyn MapSurface,
        voice: &mut dyn VoiceSink,
    ) {
        match event {
            NavEvent::Started { instruction } => {
                if let Some(nav) = session.nav_state() {
                    let route = &nav.route;
                    surface.draw_route(&route.geometry);
                    if let (Some(origin), Some(destination)) =
                        (route.origin(), route.destination())
                    {
                        surface.set_endpoint_markers(origin, destination);
                    }
                    if let Some(bounds) = route.bounds() {
                        surface.fit_bounds(bounds);
                    }
                    self.refresh_arrows(session, surface);
                }
                self.announce(session, voice, instruction);
            }
            NavEvent::StepAdvanced { instruction, .. } => {
                self.announce(session, voice, instruction);
                self.refresh_arrows(session, surface);
            }
            NavEvent::Arrived { instruction } => {
                self.announce(session, voice, instruction);
                self.stop_at_ms = Some(now_ms + ARRIVAL_STOP_DELAY_MS);
            }
            NavEvent::Stopped => {
                surface.clear_route();
                surface.clear_endpoint_markers();
                surface.clear_arrows();
                surface.reset_orientation();
                surface.set_perspective(false);
                self.mode = ViewMode::Follow;
                self.stop_at_ms = None;
                self.tilt_revert_at_ms = None;
            }
        }
    }

    /// Switch the camera mode. Position-centered modes do nothing to
    /// the camera until a fix exists; the mode still changes.
    pub fn set_mode(
        &mut self,
        mode: ViewMode,
        session: &NavigationSession,
        last_fix: Option<Coordinate>,
        now_ms: u64,
        surface: &mut dyn MapSurface,
    ) {
        debug!("view mode {:?}", mode);
        self.mode = mode;

        match mode {
            ViewMode::Follow => {
                if let Some(center) = last_fix {
                    surface.fly_to(center, FOLLOW_ZOOM);
                }
            }
            ViewMode::Overview => {
                if let Some(bounds) = session.nav_state().and_then(|nav| nav.route.bounds()) {
                    surface.fit_bounds(bounds);
                }
            }
            ViewMode::NorthUp => {
                if let Some(center) = last_fix {
                    surface.fly_to(center, FOLLOW_ZOOM);
                }
                surface.reset_orientation();
            }
            ViewMode::Tilt => {
                if let Some(center) = last_fix {
                    surface.fly_to(center, TILT_ZOOM);
                }
                surface.set_perspective(true);
                self.tilt_revert_at_ms = Some(now_ms + TILT_REVERT_MS);
            }
        }
    }

    /// Fire due deadlines: the post-arrival stop and the tilt revert.
    /// Returns the events produced by a fired stop.
    pub fn tick(
        &mut self,
        now_ms: u64,
        session: &mut NavigationSession,
        last_fix: Option<Coordinate>,
        surface: &mut dyn MapSurface,
        voice: &mut dyn VoiceSink,
    ) -> Vec<NavEvent> {
        let mut events = Vec::new();

        if self.tilt_revert_at_ms.is_some_and(|at| now_ms >= at) {
            self.tilt_revert_at_ms = None;
            surface.set_perspective(false);
            if self.mode == ViewMode::Tilt {
                self.set_mode(ViewMode::Follow, session, last_fix, now_ms, surface);
            }
        }

        if self.stop_at_ms.is_some_and(|at| now_ms >= at) {
            self.stop_at_ms = None;
            if let Some(stopped) = session.stop() {
                self.on_event(&stopped, session, now_ms, surface, voice);
                events.push(stopped);
            }
        }

        events
    }

    /// The enable announcement of the voice toggle. Disabling is
    /// silent by definition.
    pub fn voice_toggled(&self, enabled: bool, voice: &mut dyn VoiceSink) {
        if enabled {
            voice.announce(VOICE_ENABLED_ANNOUNCEMENT);
        }
    }

    fn announce(&self, session: &NavigationSession, voice: &mut dyn VoiceSink, text: &str) {
        if session.voice_enabled() {
            voice.announce(text);
        }
    }

    fn refresh_arrows(&self, session: &NavigationSession, surface: &mut dyn MapSurface) {
        if let Some(nav) = session.nav_state() {
            let arrows = indicators::arrows_along_route(&nav.route.geometry);
            let next_turn = indicators::next_turn_marker(&nav.route, nav.current_step);
            surface.show_arrows(&arrows, next_turn.as_ref());
        }
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}
