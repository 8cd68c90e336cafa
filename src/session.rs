//! Navigation session state machine.
//!
//! A session moves `Idle -> Active -> Arrived` and back to `Idle`
//! through [`NavigationSession::stop`]. While active it consumes
//! position fixes, advances through the route's steps, and keeps the
//! remaining distance and time estimates current. It never reads a
//! clock and never touches the map; callers inject `now_ms` and react
//! to the returned [`NavEvent`]s.

use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

use crate::geo::{self, Coordinate};
use crate::route::{Route, RouteStep};

/// Proximity threshold for reaching a step end or the destination,
/// in kilometers (20 m).
pub const ARRIVAL_THRESHOLD_KM: f64 = 0.02;

/// Spoken on arrival, distinct from the final step's instruction.
pub const ARRIVAL_ANNOUNCEMENT: &str = "You have reached your destination";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StartError {
    #[error("route has no steps to navigate")]
    EmptyRoute,
}

/// One state transition, reported to the coordinator. Announcement
/// gating by the voice toggle happens there, not here; every
/// transition produces its event exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NavEvent {
    Started { instruction: String },
    StepAdvanced { step_index: usize, instruction: String },
    Arrived { instruction: String },
    Stopped,
}

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    Idle,
    Active,
    Arrived,
}

/// Live data of a running (or just-arrived) session.
#[derive(Debug, Clone)]
pub struct NavState {
    /// Immutable for the lifetime of the session.
    pub route: Route,
    /// Index into `route.steps`, only ever increases.
    pub current_step: usize,
    pub remaining_distance_km: f64,
    pub remaining_time_min: u32,
    pub started_at_ms: u64,
    pub last_position: Coordinate,
}

impl NavState {
    /// Recompute remaining distance and time from the current step.
    ///
    /// Remaining distance is the suffix sum of step distances, an
    /// accepted overestimate while partway through a step. The time
    /// estimate switches from the provider's figure to a projection
    /// from live average speed once more than a minute has elapsed and
    /// more than 0.1 km is covered; before that the provider estimate
    /// stands.
    fn refresh_remaining(&mut self, now_ms: u64) {
        let remaining_km = self.route.remaining_from_step_m(self.current_step) / 1000.0;
        let elapsed_min = now_ms.saturating_sub(self.started_at_ms) as f64 / 60_000.0;
        let traveled_km = self.route.total_distance_km - remaining_km;

        let mut remaining_min = f64::from(self.route.total_duration_min);
        if traveled_km > 0.1 && elapsed_min > 1.0 {
            let speed_km_per_min = traveled_km / elapsed_min;
            remaining_min = remaining_km / speed_km_per_min;
        }

        self.remaining_distance_km = remaining_km;
        self.remaining_time_min = remaining_min.round() as u32;
    }

    /// Average speed since the session started, km/h. Zero until time
    /// has passed and ground has been covered.
    pub fn average_speed_kmh(&self, now_ms: u64) -> f64 {
        let elapsed_h = now_ms.saturating_sub(self.started_at_ms) as f64 / 3_600_000.0;
        if elapsed_h <= 0.0 {
            return 0.0;
        }
        let traveled_km = self.route.total_distance_km - self.remaining_distance_km;
        (traveled_km / elapsed_h).max(0.0)
    }

    /// Estimated arrival instant, from the current time estimate.
    pub fn eta_ms(&self, now_ms: u64) -> u64 {
        now_ms + u64::from(self.remaining_time_min) * 60_000
    }

    fn current_step_end(&self) -> Option<Coordinate> {
        self.route.steps.get(self.current_step).and_then(RouteStep::end)
    }
}

#[derive(Debug)]
enum Phase {
    Idle,
    Active(NavState),
    Arrived(NavState),
}

/// The one live navigation session of the application.
#[derive(Debug)]
pub struct NavigationSession {
    phase: Phase,
    voice_enabled: bool,
}

impl NavigationSession {
    pub fn new() -> Self {
        NavigationSession {
            phase: Phase::Idle,
            voice_enabled: true,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match self.phase {
            Phase::Idle => SessionPhase::Idle,
            Phase::Active(_) => SessionPhase::Active,
            Phase::Arrived(_) => SessionPhase::Arrived,
        }
    }

    /// True only while position fixes should feed the session.
    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active(_))
    }

    /// True from start until the session returns to idle, including
    /// the window between arrival and the delayed stop.
    pub fn is_navigating(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    /// Session data while active or arrived, for panels and overlays.
    pub fn nav_state(&self) -> Option<&NavState> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Active(nav) | Phase::Arrived(nav) => Some(nav),
        }
    }

    pub fn voice_enabled(&self) -> bool {
        self.voice_enabled
    }

    /// Flip voice guidance. Orthogonal to the lifecycle; survives
    /// stop and restart.
    pub fn toggle_voice(&mut self) -> bool {
        self.voice_enabled = !self.voice_enabled;
        info!(
            "voice guidance {}",
            if self.voice_enabled { "enabled" } else { "muted" }
        );
        self.voice_enabled
    }

    /// Begin navigating `route` from `origin`. A session that is
    /// already running or arrived is replaced.
    pub fn start(
        &mut self,
        route: Route,
        origin: Coordinate,
        now_ms: u64,
    ) -> Result<NavEvent, StartError> {
        if route.steps.is_empty() {
            return Err(StartError::EmptyRoute);
        }
        if !matches!(self.phase, Phase::Idle) {
            info!("replacing the running session");
        }

        info!(
            "navigation started: {:.1} km, {} min, {} steps",
            route.total_distance_km,
            route.total_duration_min,
            route.steps.len()
        );

        let first_instruction = route.steps[0].instruction.clone();
        let remaining_distance_km = route.total_distance_km;
        let remaining_time_min = route.total_duration_min;
        self.phase = Phase::Active(NavState {
            route,
            current_step: 0,
            remaining_distance_km,
            remaining_time_min,
            started_at_ms: now_ms,
            last_position: origin,
        });

        Ok(NavEvent::Started {
            instruction: first_instruction,
        })
    }

    /// Consume one position fix.
    ///
    /// In order: measure proximity to the current step's end and to
    /// the destination; arrival wins over step advance; a crossed step
    /// boundary advances the index and reports the new instruction;
    /// then remaining distance/time are refreshed and the position is
    /// recorded. After arrival further fixes are ignored until the
    /// stop lands.
    ///
    /// # Panics
    ///
    /// Panics when called on an idle session; the tracker must not
    /// forward fixes without a running session.
    pub fn update(&mut self, position: Coordinate, now_ms: u64) -> Vec<NavEvent> {
        let nav = match &mut self.phase {
            Phase::Idle => panic!("position update on an idle session"),
            Phase::Arrived(_) => {
                debug!("position update after arrival, ignoring");
                return Vec::new();
            }
            Phase::Active(nav) => nav,
        };

        let to_step_end = nav
            .current_step_end()
            .map_or(f64::INFINITY, |end| geo::distance_km(position, end));
        let to_destination = nav
            .route
            .destination()
            .map_or(f64::INFINITY, |dest| geo::distance_km(position, dest));

        if to_destination < ARRIVAL_THRESHOLD_KM {
            return vec![self.arrive()];
        }

        let mut events = Vec::new();
        if to_step_end < ARRIVAL_THRESHOLD_KM {
            let next = nav.current_step + 1;
            if next >= nav.route.steps.len() {
                // Reaching the last step's end is reaching the
                // destination; the index stays in range
                return vec![self.arrive()];
            }
            nav.current_step = next;

            let step = &nav.route.steps[nav.current_step];
            info!("advanced to step {}: {}", nav.current_step, step.instruction);
            events.push(NavEvent::StepAdvanced {
                step_index: nav.current_step,
                instruction: step.instruction.clone(),
            });
        }

        nav.refresh_remaining(now_ms);
        nav.last_position = position;
        events
    }

    /// End the session. Idempotent; reports `Stopped` only when a
    /// session was actually running.
    pub fn stop(&mut self) -> Option<NavEvent> {
        if matches!(self.phase, Phase::Idle) {
            return None;
        }
        info!("navigation stopped");
        self.phase = Phase::Idle;
        Some(NavEvent::Stopped)
    }

    fn arrive(&mut self) -> NavEvent {
        if let Phase::Active(nav) = std::mem::replace(&mut self.phase, Phase::Idle) {
            self.phase = Phase::Arrived(nav);
        }
        info!("destination reached");
        NavEvent::Arrived {
            instruction: ARRIVAL_ANNOUNCEMENT.to_string(),
        }
    }
}

impl Default for NavigationSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::ManeuverType;

    fn pt(lat: f64, lng: f64) -> Coordinate {
        Coordinate { lat, lng }
    }

    fn step(instruction: &str, distance_m: f64, geometry: Vec<Coordinate>) -> RouteStep {
        RouteStep {
            instruction: instruction.to_string(),
            distance_m,
            duration_s: distance_m / 10.0,
            road: String::new(),
            geometry,
            maneuver: ManeuverType::Turn,
            modifier: None,
        }
    }

    // Two steps heading north along a meridian. 0.001 deg of latitude
    // is roughly 111 m, so the step ends sit well apart.
    fn two_step_route() -> Route {
        let a = pt(48.0, 16.0);
        let b = pt(48.005, 16.0);
        let c = pt(48.009, 16.0);
        Route {
            total_distance_km: 1.0,
            total_duration_min: 10,
            steps: vec![
                step("Head north on Ring", 600.0, vec![a, b]),
                step("Turn right onto Kai", 400.0, vec![b, c]),
            ],
            geometry: vec![a, b, c],
            step_offsets_m: vec![0.0, 600.0],
        }
    }

    fn started(route: Route) -> NavigationSession {
        let origin = route.origin().unwrap();
        let mut session = NavigationSession::new();
        session.start(route, origin, 0).unwrap();
        session
    }

    #[test]
    fn start_announces_the_first_instruction() {
        let mut session = NavigationSession::new();
        let route = two_step_route();
        let origin = route.origin().unwrap();

        let event = session.start(route, origin, 0).unwrap();
        assert_eq!(
            event,
            NavEvent::Started {
                instruction: "Head north on Ring".to_string()
            }
        );
        assert_eq!(session.phase(), SessionPhase::Active);

        let nav = session.nav_state().unwrap();
        assert!((nav.remaining_distance_km - 1.0).abs() < 1e-9);
        assert_eq!(nav.remaining_time_min, 10);
        assert_eq!(nav.current_step, 0);
    }

    #[test]
    fn start_rejects_an_empty_route() {
        let mut session = NavigationSession::new();
        let route = Route {
            total_distance_km: 0.0,
            total_duration_min: 0,
            steps: vec![],
            geometry: vec![],
            step_offsets_m: vec![],
        };

        assert_eq!(
            session.start(route, pt(48.0, 16.0), 0),
            Err(StartError::EmptyRoute)
        );
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[test]
    fn start_replaces_a_running_session() {
        let mut session = started(two_step_route());

        let mut replacement = two_step_route();
        replacement.total_distance_km = 2.0;
        let origin = replacement.origin().unwrap();
        session.start(replacement, origin, 5_000).unwrap();

        let nav = session.nav_state().unwrap();
        assert_eq!(nav.current_step, 0);
        assert!((nav.route.total_distance_km - 2.0).abs() < 1e-9);
        assert_eq!(nav.started_at_ms, 5_000);
    }

    #[test]
    fn reaching_a_step_end_advances_to_the_next_instruction() {
        let mut session = started(two_step_route());

        // Exactly at the end of step 0, 445 m short of the destination
        let events = session.update(pt(48.005, 16.0), 30_000);
        assert_eq!(
            events,
            vec![NavEvent::StepAdvanced {
                step_index: 1,
                instruction: "Turn right onto Kai".to_string()
            }]
        );

        let nav = session.nav_state().unwrap();
        assert_eq!(nav.current_step, 1);
        assert!((nav.remaining_distance_km - 0.4).abs() < 1e-9);
        assert!((nav.last_position.lat - 48.005).abs() < 1e-12);
    }

    #[test]
    fn step_index_never_decreases_when_backtracking() {
        let mut session = started(two_step_route());
        session.update(pt(48.005, 16.0), 30_000);
        assert_eq!(session.nav_state().unwrap().current_step, 1);

        // Wandering back toward the start must not rewind the step
        let events = session.update(pt(48.001, 16.0), 45_000);
        assert!(events.is_empty(), "Expected no events, got {events:?}");
        assert_eq!(session.nav_state().unwrap().current_step, 1);
    }

    #[test]
    fn arriving_within_threshold_reports_arrival() {
        let mut session = started(two_step_route());
        session.update(pt(48.005, 16.0), 30_000);

        // 48.00899 is about a meter from the destination
        let events = session.update(pt(48.00899, 16.0), 60_000);
        assert_eq!(
            events,
            vec![NavEvent::Arrived {
                instruction: ARRIVAL_ANNOUNCEMENT.to_string()
            }]
        );
        assert_eq!(session.phase(), SessionPhase::Arrived);
    }

    #[test]
    fn arrival_wins_over_step_advance() {
        // Step 0 ends 10 m short of the destination, so one fix sits
        // inside both thresholds at once
        let a = pt(48.0, 16.0);
        let b = pt(48.005, 16.0);
        let c = pt(48.00509, 16.0);
        let route = Route {
            total_distance_km: 0.57,
            total_duration_min: 6,
            steps: vec![
                step("Head north on Ring", 560.0, vec![a, b]),
                step("Turn right onto Kai", 10.0, vec![b, c]),
            ],
            geometry: vec![a, b, c],
            step_offsets_m: vec![0.0, 560.0],
        };
        let mut session = started(route);

        let events = session.update(b, 30_000);
        assert_eq!(events.len(), 1, "Expected a single event, got {events:?}");
        assert!(matches!(events[0], NavEvent::Arrived { .. }));
        // The step index never moved; arrival preempted the advance
        assert_eq!(session.nav_state().unwrap().current_step, 0);
    }

    #[test]
    fn updates_after_arrival_are_ignored() {
        let mut session = started(two_step_route());
        session.update(pt(48.005, 16.0), 30_000);
        session.update(pt(48.009, 16.0), 60_000);
        assert_eq!(session.phase(), SessionPhase::Arrived);

        // No second arrival while the delayed stop is pending
        let events = session.update(pt(48.009, 16.0), 61_000);
        assert!(events.is_empty(), "Expected no events, got {events:?}");
        assert_eq!(session.phase(), SessionPhase::Arrived);
    }

    #[test]
    #[should_panic(expected = "idle session")]
    fn update_on_an_idle_session_panics() {
        let mut session = NavigationSession::new();
        session.update(pt(48.0, 16.0), 0);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut session = started(two_step_route());

        assert_eq!(session.stop(), Some(NavEvent::Stopped));
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.stop(), None);
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[test]
    fn time_estimate_stays_at_provider_figure_early_on() {
        let mut session = started(two_step_route());

        // 30 s in, still on step 0: no ground covered by the suffix
        // sum, so the provider estimate stands
        session.update(pt(48.002, 16.0), 30_000);
        let nav = session.nav_state().unwrap();
        assert_eq!(nav.remaining_time_min, 10);
        assert!((nav.remaining_distance_km - 1.0).abs() < 1e-9);
    }

    #[test]
    fn time_estimate_projects_from_live_speed() {
        let mut session = started(two_step_route());

        // Step boundary crossed 2 min in: 0.6 km covered, 0.4 km left,
        // 0.3 km/min pace, so about 1.3 min remain
        session.update(pt(48.005, 16.0), 120_000);
        let nav = session.nav_state().unwrap();
        assert_eq!(nav.remaining_time_min, 1);
    }

    #[test]
    fn average_speed_and_eta_follow_progress() {
        let mut session = started(two_step_route());
        session.update(pt(48.005, 16.0), 120_000);

        let nav = session.nav_state().unwrap();
        // 0.6 km in 2 minutes is 18 km/h
        assert!(
            (nav.average_speed_kmh(120_000) - 18.0).abs() < 1e-9,
            "Expected ~18 km/h, got {}",
            nav.average_speed_kmh(120_000)
        );
        assert_eq!(nav.eta_ms(120_000), 120_000 + 60_000);
    }

    #[test]
    fn average_speed_is_zero_at_the_first_instant() {
        let session = started(two_step_route());
        let nav = session.nav_state().unwrap();
        assert_eq!(nav.average_speed_kmh(0), 0.0);
    }

    #[test]
    fn voice_toggle_flips_and_survives_stop() {
        let mut session = started(two_step_route());
        assert!(session.voice_enabled());

        assert!(!session.toggle_voice());
        session.stop();
        assert!(!session.voice_enabled());
        assert!(session.toggle_voice());
    }
}
