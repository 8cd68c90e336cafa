//! Application facade.
//!
//! Wires the trip plan, the route request lifecycle, the session, the
//! tracker, and the coordinator together the way a shell drives them.
//! Owns request identity: every route fetch gets a monotonically
//! increasing id, and only a response for the currently pending id may
//! start a session. Late responses for superseded or cancelled
//! requests are discarded, never applied.

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::geo::Coordinate;
use crate::panel::DirectionsPanel;
use crate::route::{DistanceReport, Route, RouteError, RouteSummary};
use crate::search::Place;
use crate::session::{NavEvent, NavigationSession, StartError};
use crate::track::{
    PositionError, PositionReading, PositionSource, PositionTracker, TrackUpdate,
};
use crate::view::{Coordinator, Haptics, MapSurface, ViewMode, VoiceSink, TAP_PULSE_MS};

/// Zoom applied when a searched place is revealed.
pub const SEARCH_ZOOM: u8 = 15;
/// Zoom applied by the locate-me flow.
pub const LOCATE_ZOOM: u8 = 16;

/// A trip plan that is not ready to be routed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    #[error("no starting point selected")]
    MissingOrigin,
    #[error("no destination selected")]
    MissingDestination,
    #[error("start and destination are the same place")]
    IdenticalEndpoints,
}

/// Any failure the facade can hand back to the shell.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Start(#[from] StartError),
    #[error(transparent)]
    Position(#[from] PositionError),
}

/// Origin and destination picked by the user, each from a search
/// result, a map tap, or the current fix. Validated before any
/// routing call goes out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TripPlan {
    origin: Option<Coordinate>,
    destination: Option<Coordinate>,
}

impl TripPlan {
    pub fn set_origin(&mut self, coord: Coordinate) {
        self.origin = Some(coord);
    }

    pub fn set_destination(&mut self, coord: Coordinate) {
        self.destination = Some(coord);
    }

    pub fn origin(&self) -> Option<Coordinate> {
        self.origin
    }

    pub fn destination(&self) -> Option<Coordinate> {
        self.destination
    }

    pub fn clear(&mut self) {
        *self = TripPlan::default();
    }

    /// Both endpoints, or the precondition that is missing.
    pub fn validate(&self) -> Result<(Coordinate, Coordinate), PlanError> {
        let origin = self.origin.ok_or(PlanError::MissingOrigin)?;
        let destination = self.destination.ok_or(PlanError::MissingDestination)?;
        if origin == destination {
            return Err(PlanError::IdenticalEndpoints);
        }
        Ok((origin, destination))
    }
}

/// Identity of one route fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RequestId(pub u64);

/// Everything the shell needs to issue one routing call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteRequest {
    pub id: RequestId,
    pub origin: Coordinate,
    pub destination: Coordinate,
}

/// Outcome of handing a routing response back to the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDelivery {
    /// The response matched the pending request; navigation started.
    Started,
    /// The response belonged to a superseded or cancelled request.
    Discarded,
}

/// The one instance tying the core together for a shell.
#[derive(Debug)]
pub struct App {
    session: NavigationSession,
    tracker: PositionTracker,
    coordinator: Coordinator,
    plan: TripPlan,
    last_request: u64,
    pending_request: Option<RequestId>,
}

impl App {
    pub fn new() -> Self {
        App {
            session: NavigationSession::new(),
            tracker: PositionTracker::new(),
            coordinator: Coordinator::new(),
            plan: TripPlan::default(),
            last_request: 0,
            pending_request: None,
        }
    }

    pub fn session(&self) -> &NavigationSession {
        &self.session
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn view_mode(&self) -> ViewMode {
        self.coordinator.mode()
    }

    pub fn plan(&self) -> &TripPlan {
        &self.plan
    }

    pub fn plan_mut(&mut self) -> &mut TripPlan {
        &mut self.plan
    }

    /// Validate the plan and issue the identity for one route fetch.
    /// A new request supersedes any still-pending one.
    pub fn begin_route_request(&mut self) -> Result<RouteRequest, PlanError> {
        let (origin, destination) = self.plan.validate()?;
        self.last_request += 1;
        let id = RequestId(self.last_request);
        if self.pending_request.replace(id).is_some() {
            info!("route request {} supersedes a pending one", id.0);
        }
        Ok(RouteRequest {
            id,
            origin,
            destination,
        })
    }

    /// Hand a routing response body back under the id it was issued
    /// with. A stale id is discarded without touching the session; a
    /// current one builds the route, starts the session and the
    /// position watch, and runs the start effects.
    ///
    /// A watch failure is reported but leaves the session running; the
    /// user still sees the route and can stop it.
    pub fn deliver_route(
        &mut self,
        id: RequestId,
        body: &str,
        now_ms: u64,
        source: &mut dyn PositionSource,
        surface: &mut dyn MapSurface,
        voice: &mut dyn VoiceSink,
    ) -> Result<RouteDelivery, AppError> {
        if self.pending_request != Some(id) {
            info!("discarding routing response for superseded request {}", id.0);
            return Ok(RouteDelivery::Discarded);
        }
        self.pending_request = None;

        let route = Route::from_json(body)?;
        let origin = route
            .origin()
            .or_else(|| self.plan.origin())
            .ok_or(StartError::EmptyRoute)?;

        let started = self.session.start(route, origin, now_ms)?;
        self.coordinator
            .on_event(&started, &self.session, now_ms, surface, voice);
        self.tracker.begin(source)?;
        Ok(RouteDelivery::Started)
    }

    /// A failed fetch clears the pending request so a retry can be
    /// issued. Returns false for a stale id.
    pub fn fail_route(&mut self, id: RequestId) -> bool {
        if self.pending_request == Some(id) {
            warn!("route request {} failed", id.0);
            self.pending_request = None;
            true
        } else {
            false
        }
    }

    /// User-initiated stop. The watch is cancelled before the session
    /// resets, so no reading can land in between; an in-flight route
    /// request is abandoned.
    pub fn stop_navigation(
        &mut self,
        now_ms: u64,
        source: &mut dyn PositionSource,
        surface: &mut dyn MapSurface,
        voice: &mut dyn VoiceSink,
    ) -> bool {
        self.pending_request = None;
        self.tracker.end(source);
        match self.session.stop() {
            Some(stopped) => {
                self.coordinator
                    .on_event(&stopped, &self.session, now_ms, surface, voice);
                true
            }
            None => false,
        }
    }

    /// One fix from the platform watch. Returns the processed update
    /// so the shell can refresh the panel alongside.
    pub fn on_position(
        &mut self,
        reading: PositionReading,
        now_ms: u64,
        surface: &mut dyn MapSurface,
        voice: &mut dyn VoiceSink,
    ) -> TrackUpdate {
        let update = self.tracker.on_reading(reading, &mut self.session, now_ms);
        surface.update_user_marker(&update.marker);
        if let Some(center) = update.recentre {
            surface.pan_to(center);
        }
        for event in &update.events {
            self.coordinator
                .on_event(event, &self.session, now_ms, surface, voice);
        }
        update
    }

    /// A position failure surfaces its message and changes nothing
    /// else; a running session keeps waiting for the next fix.
    pub fn on_position_error(&mut self, error: PositionError) -> &'static str {
        self.tracker.on_error(error)
    }

    /// Advance the UI timers. A fired post-arrival stop also cancels
    /// the position watch.
    pub fn tick(
        &mut self,
        now_ms: u64,
        source: &mut dyn PositionSource,
        surface: &mut dyn MapSurface,
        voice: &mut dyn VoiceSink,
    ) -> Vec<NavEvent> {
        let last_fix = self.tracker.last_fix().map(|fix| fix.coord);
        let events = self
            .coordinator
            .tick(now_ms, &mut self.session, last_fix, surface, voice);
        if events.contains(&NavEvent::Stopped) {
            self.tracker.end(source);
        }
        events
    }

    /// User tapped a view-mode control. Follow mode also re-arms the
    /// tracker's recentre behavior.
    pub fn set_view_mode(
        &mut self,
        mode: ViewMode,
        now_ms: u64,
        surface: &mut dyn MapSurface,
        haptics: &mut dyn Haptics,
    ) {
        haptics.pulse_ms(TAP_PULSE_MS);
        let last_fix = self.tracker.last_fix().map(|fix| fix.coord);
        self.coordinator
            .set_mode(mode, &self.session, last_fix, now_ms, surface);
        self.tracker.set_follow(mode == ViewMode::Follow);
    }

    /// Flip voice guidance; enabling announces itself.
    pub fn toggle_voice(&mut self, voice: &mut dyn VoiceSink, haptics: &mut dyn Haptics) -> bool {
        haptics.pulse_ms(TAP_PULSE_MS);
        let enabled = self.session.toggle_voice();
        self.coordinator.voice_toggled(enabled, voice);
        enabled
    }

    /// Locate-me flow: one reading refreshes the marker and recentres
    /// the map, independent of navigation.
    pub fn show_current_location(
        &mut self,
        reading: PositionReading,
        now_ms: u64,
        surface: &mut dyn MapSurface,
        voice: &mut dyn VoiceSink,
        haptics: &mut dyn Haptics,
    ) -> TrackUpdate {
        haptics.pulse_ms(TAP_PULSE_MS);
        let update = self.on_position(reading, now_ms, surface, voice);
        surface.fly_to(reading.coord, LOCATE_ZOOM);
        update
    }

    /// Jump the viewport to a search result.
    pub fn reveal_place(&self, place: &Place, surface: &mut dyn MapSurface) {
        surface.fly_to(place.coord, SEARCH_ZOOM);
    }

    /// Straight-line versus road distance for the planned endpoints,
    /// from an overview-only routing response.
    pub fn distance_report(&self, summary_json: &str) -> Result<DistanceReport, AppError> {
        let (origin, destination) = self.plan.validate()?;
        let summary = RouteSummary::from_json(summary_json)?;
        Ok(DistanceReport::new(origin, destination, &summary))
    }

    /// Current panel view model, `None` while nothing is navigating.
    pub fn directions_panel(&self, now_ms: u64) -> Option<DirectionsPanel> {
        DirectionsPanel::from_session(&self.session, now_ms)
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}
