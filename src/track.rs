//! Position tracking adapter.
//!
//! Bridges the platform's position watch to the session: owns the
//! watch handle, derives the rendered user marker (with a heading
//! that ignores stationary jitter), forwards fixes into the session
//! while it is active, and asks for a recentre in follow mode. Errors
//! surface as messages and never tear down a running session.

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::geo::{self, Coordinate};
use crate::session::{NavEvent, NavigationSession};

/// Movement below this distance keeps the previous heading, so a
/// stationary user's marker does not spin on GPS noise (1 m).
const HEADING_RETENTION_KM: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PositionErrorKind {
    PermissionDenied,
    Unavailable,
    Timeout,
}

impl PositionErrorKind {
    /// The message shown to the user, verbatim.
    pub fn user_message(self) -> &'static str {
        match self {
            PositionErrorKind::PermissionDenied => {
                "Location permission denied. Please enable location services."
            }
            PositionErrorKind::Unavailable => {
                "Location information is unavailable. Please try again later."
            }
            PositionErrorKind::Timeout => "Location request timed out. Please try again.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[error("{}", .kind.user_message())]
pub struct PositionError {
    pub kind: PositionErrorKind,
}

impl PositionError {
    pub fn new(kind: PositionErrorKind) -> Self {
        PositionError { kind }
    }
}

/// Handle of a running position subscription, issued by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WatchId(pub u64);

/// Platform seam for continuous position delivery. `clear` cancels
/// synchronously; no reading for a cleared id may be forwarded.
pub trait PositionSource {
    fn watch(&mut self) -> Result<WatchId, PositionError>;
    fn clear(&mut self, id: WatchId);
}

/// One fix as delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionReading {
    pub coord: Coordinate,
    pub accuracy_m: f64,
}

/// Everything the shell needs to render the user's position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UserMarker {
    pub position: Coordinate,
    /// Compass heading of travel, degrees.
    pub heading_deg: f64,
    pub accuracy_m: f64,
    /// Switches the marker between the plain dot and the directional
    /// navigation variant.
    pub navigating: bool,
}

/// Result of feeding one reading through the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackUpdate {
    pub marker: UserMarker,
    /// Set when the map should recentre on the user (follow mode).
    pub recentre: Option<Coordinate>,
    /// Session transitions triggered by this fix.
    pub events: Vec<NavEvent>,
}

/// Owns the position subscription and the marker state.
#[derive(Debug)]
pub struct PositionTracker {
    watch: Option<WatchId>,
    follow: bool,
    last_fix: Option<PositionReading>,
    heading_deg: f64,
}

impl PositionTracker {
    pub fn new() -> Self {
        PositionTracker {
            watch: None,
            follow: true,
            last_fix: None,
            heading_deg: 0.0,
        }
    }

    /// Start the platform watch. Reuses a watch that is already
    /// running instead of stacking a second subscription.
    pub fn begin(&mut self, source: &mut dyn PositionSource) -> Result<WatchId, PositionError> {
        match self.watch {
            Some(id) => Ok(id),
            None => {
                let id = source.watch()?;
                info!("position watch {} started", id.0);
                self.watch = Some(id);
                Ok(id)
            }
        }
    }

    /// Cancel the platform watch synchronously. Idempotent.
    pub fn end(&mut self, source: &mut dyn PositionSource) {
        if let Some(id) = self.watch.take() {
            source.clear(id);
            info!("position watch {} cleared", id.0);
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    pub fn set_follow(&mut self, follow: bool) {
        self.follow = follow;
    }

    pub fn follow(&self) -> bool {
        self.follow
    }

    pub fn last_fix(&self) -> Option<PositionReading> {
        self.last_fix
    }

    /// Process one fix: refresh the marker, feed the session while it
    /// is active, and decide whether the map should recentre.
    pub fn on_reading(
        &mut self,
        reading: PositionReading,
        session: &mut NavigationSession,
        now_ms: u64,
    ) -> TrackUpdate {
        if session.is_navigating() {
            if let Some(previous) = self.last_fix {
                let moved_km = geo::distance_km(previous.coord, reading.coord);
                if moved_km > HEADING_RETENTION_KM {
                    self.heading_deg = geo::bearing_degrees(previous.coord, reading.coord);
                }
            }
        }

        let marker = UserMarker {
            position: reading.coord,
            heading_deg: self.heading_deg,
            accuracy_m: reading.accuracy_m,
            navigating: session.is_navigating(),
        };

        let events = if session.is_active() {
            session.update(reading.coord, now_ms)
        } else {
            Vec::new()
        };

        let recentre = if self.follow && session.is_navigating() {
            Some(reading.coord)
        } else {
            None
        };

        self.last_fix = Some(reading);

        TrackUpdate {
            marker,
            recentre,
            events,
        }
    }

    /// A position error leaves the watch, the session, and the last
    /// fix untouched; only the message travels to the user.
    pub fn on_error(&mut self, error: PositionError) -> &'static str {
        warn!("position error: {error}");
        error.kind.user_message()
    }
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::new()
    }
}
