//! Direction indicators along the active route.
//!
//! Computes the positions and headings of the animated arrows the map
//! shows during navigation, plus the highlighted marker at the next
//! turn. Pure geometry; the shell decides how to render the results.

use serde::Serialize;

use crate::geo::{self, Coordinate};
use crate::route::{ManeuverType, Route};

/// Nominal distance between arrows, meters.
pub const ARROW_SPACING_M: f64 = 100.0;

/// Upper bound on arrows shown at once.
pub const MAX_ARROWS: usize = 5;

/// One arrow placed on the route geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectionArrow {
    pub position: Coordinate,
    /// Travel direction at this point, compass degrees.
    pub heading_deg: f64,
    /// The arrow closest to the destination gets the pulse treatment.
    pub is_final: bool,
}

/// Direction glyph for the next-turn marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TurnDirection {
    Left,
    Right,
    UTurn,
    Ahead,
}

/// Highlighted marker at the upcoming maneuver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnMarker {
    pub position: Coordinate,
    pub direction: TurnDirection,
    pub instruction: String,
}

struct Segment {
    start: Coordinate,
    end: Coordinate,
    length_m: f64,
    cumulative_m: f64,
}

/// Place up to [`MAX_ARROWS`] arrows at even intervals along
/// `geometry`, one per [`ARROW_SPACING_M`] of route length. Routes
/// shorter than the spacing get none.
pub fn arrows_along_route(geometry: &[Coordinate]) -> Vec<DirectionArrow> {
    let mut segments = Vec::new();
    let mut total_m = 0.0;
    for pair in geometry.windows(2) {
        let length_m = geo::distance_km(pair[0], pair[1]) * 1000.0;
        total_m += length_m;
        segments.push(Segment {
            start: pair[0],
            end: pair[1],
            length_m,
            cumulative_m: total_m,
        });
    }

    let count = MAX_ARROWS.min((total_m / ARROW_SPACING_M).floor() as usize);
    if count == 0 {
        return Vec::new();
    }

    let interval_m = total_m / count as f64;
    let mut arrows = Vec::with_capacity(count);

    for i in 1..=count {
        let target_m = interval_m * i as f64;
        if let Some(segment) = segments.iter().find(|s| s.cumulative_m >= target_m) {
            let offset_m = target_m - (segment.cumulative_m - segment.length_m);
            let portion = if segment.length_m > 0.0 {
                offset_m / segment.length_m
            } else {
                0.0
            };
            let position = Coordinate {
                lat: segment.start.lat + (segment.end.lat - segment.start.lat) * portion,
                lng: segment.start.lng + (segment.end.lng - segment.start.lng) * portion,
            };
            arrows.push(DirectionArrow {
                position,
                heading_deg: geo::bearing_degrees(segment.start, segment.end),
                is_final: i == count,
            });
        }
    }

    arrows
}

/// Marker for the step after `current_step`, if that step is an
/// actual turn (turn, roundabout, fork, merge); straight-ahead steps
/// get no marker.
pub fn next_turn_marker(route: &Route, current_step: usize) -> Option<TurnMarker> {
    let next = route.steps.get(current_step + 1)?;

    let is_turn = matches!(
        next.maneuver,
        ManeuverType::Turn | ManeuverType::Roundabout | ManeuverType::Fork | ManeuverType::Merge
    );
    if !is_turn {
        return None;
    }

    let position = *next.geometry.first()?;
    let direction = next
        .modifier
        .as_deref()
        .map_or(TurnDirection::Ahead, turn_direction);

    Some(TurnMarker {
        position,
        direction,
        instruction: next.instruction.clone(),
    })
}

fn turn_direction(modifier: &str) -> TurnDirection {
    if modifier.contains("right") {
        TurnDirection::Right
    } else if modifier.contains("left") {
        TurnDirection::Left
    } else if modifier.contains("u-turn") || modifier.contains("uturn") {
        TurnDirection::UTurn
    } else {
        TurnDirection::Ahead
    }
}
