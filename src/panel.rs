//! Directions panel view model.
//!
//! A serializable snapshot of what the turn-by-turn panel shows: the
//! current instruction, up to three upcoming steps, the destination
//! row, and the remaining distance/ETA header. The shell renders it;
//! nothing here touches the map.

use serde::Serialize;

use crate::route::{ManeuverType, RouteStep, ARRIVAL_INSTRUCTION};
use crate::session::NavigationSession;

/// Glyph for one maneuver row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ManeuverIcon {
    Arrive,
    Depart,
    Left,
    Right,
    SlightLeft,
    SlightRight,
    SharpLeft,
    SharpRight,
    UTurn,
    Straight,
    Roundabout,
    Generic,
}

impl ManeuverIcon {
    /// Icon table of the panel. Turn modifiers match exactly; anything
    /// unknown falls back to the generic glyph.
    pub fn classify(maneuver: &ManeuverType, modifier: Option<&str>) -> Self {
        match maneuver {
            ManeuverType::Arrive => ManeuverIcon::Arrive,
            ManeuverType::Depart => ManeuverIcon::Depart,
            ManeuverType::Turn => match modifier {
                Some("left") => ManeuverIcon::Left,
                Some("right") => ManeuverIcon::Right,
                Some("slight left") => ManeuverIcon::SlightLeft,
                Some("slight right") => ManeuverIcon::SlightRight,
                Some("sharp left") => ManeuverIcon::SharpLeft,
                Some("sharp right") => ManeuverIcon::SharpRight,
                Some("uturn") => ManeuverIcon::UTurn,
                _ => ManeuverIcon::Generic,
            },
            ManeuverType::Continue => ManeuverIcon::Straight,
            ManeuverType::Roundabout => ManeuverIcon::Roundabout,
            _ => ManeuverIcon::Generic,
        }
    }
}

/// One instruction row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelStep {
    pub icon: ManeuverIcon,
    pub instruction: String,
    /// Step length, one decimal ("0.6 km").
    pub distance_text: String,
}

impl PanelStep {
    fn from_step(step: &RouteStep) -> Self {
        PanelStep {
            icon: ManeuverIcon::classify(&step.maneuver, step.modifier.as_deref()),
            instruction: step.instruction.clone(),
            distance_text: format!("{:.1} km", step.distance_m / 1000.0),
        }
    }
}

/// The fixed bottom row of the panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DestinationRow {
    pub instruction: String,
    /// Route total ("Total: 5.2 km").
    pub total_text: String,
}

/// Full panel snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionsPanel {
    /// Remaining distance, one decimal ("0.4 km").
    pub remaining_text: String,
    /// Estimated arrival instant; the shell turns it into clock time.
    pub eta_ms: u64,
    pub current: PanelStep,
    /// At most three rows.
    pub upcoming: Vec<PanelStep>,
    pub destination: DestinationRow,
}

impl DirectionsPanel {
    /// Snapshot the running session, `None` while idle.
    pub fn from_session(session: &NavigationSession, now_ms: u64) -> Option<Self> {
        let nav = session.nav_state()?;
        let route = &nav.route;
        let current = route.steps.get(nav.current_step)?;

        let upcoming = route
            .steps
            .iter()
            .skip(nav.current_step + 1)
            .take(3)
            .map(PanelStep::from_step)
            .collect();

        Some(DirectionsPanel {
            remaining_text: format!("{:.1} km", nav.remaining_distance_km),
            eta_ms: nav.eta_ms(now_ms),
            current: PanelStep::from_step(current),
            upcoming,
            destination: DestinationRow {
                instruction: ARRIVAL_INSTRUCTION.to_string(),
                total_text: format!("Total: {:.1} km", route.total_distance_km),
            },
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
