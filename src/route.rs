//! Route model building.
//!
//! Parses the routing provider's JSON response (OSRM shape) and
//! normalizes it into a [`Route`]: decoded geometry, ordered maneuver
//! steps, aggregate distance in kilometers and duration in whole
//! minutes. Per-step values keep the provider's meters/seconds
//! granularity for progress math.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::{self, Coordinate, GeoBounds};
use crate::polyline::{self, DecodeError};

/// Fixed instruction for arrival maneuvers, regardless of provider text.
pub const ARRIVAL_INSTRUCTION: &str = "Arrive at destination";

/// Failure of a route fetch. Always surfaced to the caller; never
/// reduced to an empty route.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The provider reported a non-success code or no routes.
    #[error("routing provider could not supply a route")]
    Unavailable,
    /// A geometry string in the response did not decode.
    #[error("route geometry could not be decoded: {0}")]
    Geometry(#[from] DecodeError),
    /// The response body was not the expected shape.
    #[error("malformed routing response: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Maneuver classification. The provider's set is open; unrecognized
/// kinds are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ManeuverType {
    Turn,
    Continue,
    Depart,
    Arrive,
    Roundabout,
    Fork,
    Merge,
    EndOfRoad,
    NewName,
    Other(String),
}

impl From<String> for ManeuverType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "turn" => ManeuverType::Turn,
            "continue" => ManeuverType::Continue,
            "depart" => ManeuverType::Depart,
            "arrive" => ManeuverType::Arrive,
            "roundabout" => ManeuverType::Roundabout,
            "fork" => ManeuverType::Fork,
            "merge" => ManeuverType::Merge,
            "end of road" => ManeuverType::EndOfRoad,
            "new name" => ManeuverType::NewName,
            _ => ManeuverType::Other(value),
        }
    }
}

impl From<ManeuverType> for String {
    fn from(value: ManeuverType) -> Self {
        match value {
            ManeuverType::Turn => "turn".to_string(),
            ManeuverType::Continue => "continue".to_string(),
            ManeuverType::Depart => "depart".to_string(),
            ManeuverType::Arrive => "arrive".to_string(),
            ManeuverType::Roundabout => "roundabout".to_string(),
            ManeuverType::Fork => "fork".to_string(),
            ManeuverType::Merge => "merge".to_string(),
            ManeuverType::EndOfRoad => "end of road".to_string(),
            ManeuverType::NewName => "new name".to_string(),
            ManeuverType::Other(kind) => kind,
        }
    }
}

/// Raw provider response, top level.
#[derive(Debug, Deserialize)]
pub struct DirectionsResponse {
    pub code: String,
    #[serde(default)]
    pub routes: Vec<ProviderRoute>,
}

/// One route alternative as the provider reports it.
#[derive(Debug, Deserialize)]
pub struct ProviderRoute {
    /// Meters.
    pub distance: f64,
    /// Seconds.
    pub duration: f64,
    /// Encoded overview polyline.
    pub geometry: String,
    #[serde(default)]
    pub legs: Vec<ProviderLeg>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderLeg {
    #[serde(default)]
    pub steps: Vec<ProviderStep>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderStep {
    pub distance: f64,
    pub duration: f64,
    #[serde(default)]
    pub name: String,
    pub geometry: String,
    pub maneuver: ProviderManeuver,
}

#[derive(Debug, Deserialize)]
pub struct ProviderManeuver {
    #[serde(rename = "type")]
    pub kind: ManeuverType,
    #[serde(default)]
    pub modifier: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
}

/// One maneuver of a navigable route.
#[derive(Debug, Clone, Serialize)]
pub struct RouteStep {
    /// Human-readable text, announced when the step becomes current.
    pub instruction: String,
    pub distance_m: f64,
    pub duration_s: f64,
    /// Road name, possibly empty.
    pub road: String,
    /// Decoded path covered by this step.
    pub geometry: Vec<Coordinate>,
    pub maneuver: ManeuverType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
}

impl RouteStep {
    fn from_provider(step: ProviderStep) -> Result<Self, DecodeError> {
        let geometry = polyline::decode(&step.geometry)?;
        let instruction = step_instruction(&step);

        Ok(RouteStep {
            instruction,
            distance_m: step.distance,
            duration_s: step.duration,
            road: step.name,
            geometry,
            maneuver: step.maneuver.kind,
            modifier: step.maneuver.modifier,
        })
    }

    /// Last coordinate of this step's path, the point that must be
    /// reached before the next step becomes current.
    pub fn end(&self) -> Option<Coordinate> {
        self.geometry.last().copied()
    }
}

/// The full navigable plan between two coordinates.
#[derive(Debug, Clone, Serialize)]
pub struct Route {
    pub total_distance_km: f64,
    pub total_duration_min: u32,
    /// Ordered start-to-destination maneuver sequence.
    pub steps: Vec<RouteStep>,
    /// Full decoded overview geometry, independent of per-step
    /// geometry; used for drawing and arrow placement.
    pub geometry: Vec<Coordinate>,
    /// Distance from the route start to each step's start, in meters.
    pub step_offsets_m: Vec<f64>,
}

impl Route {
    /// Build a turn-by-turn route from the provider's JSON body.
    pub fn from_json(json: &str) -> Result<Self, RouteError> {
        let response: DirectionsResponse = serde_json::from_str(json)?;
        Self::from_response(response)
    }

    /// Build a turn-by-turn route from an already-parsed response.
    pub fn from_response(response: DirectionsResponse) -> Result<Self, RouteError> {
        let provider_route = best_route(response)?;
        let geometry = polyline::decode(&provider_route.geometry)?;

        let provider_steps = provider_route
            .legs
            .into_iter()
            .next()
            .map(|leg| leg.steps)
            .unwrap_or_default();

        let steps = provider_steps
            .into_iter()
            .map(RouteStep::from_provider)
            .collect::<Result<Vec<_>, _>>()?;

        let mut step_offsets_m = Vec::with_capacity(steps.len());
        let mut offset = 0.0;
        for step in &steps {
            step_offsets_m.push(offset);
            offset += step.distance_m;
        }

        Ok(Route {
            total_distance_km: provider_route.distance / 1000.0,
            total_duration_min: (provider_route.duration / 60.0).round() as u32,
            steps,
            geometry,
            step_offsets_m,
        })
    }

    /// Final coordinate of the last step's path: the destination used
    /// by the arrival check.
    pub fn destination(&self) -> Option<Coordinate> {
        self.steps.last().and_then(RouteStep::end)
    }

    /// First coordinate of the first step's path: the origin.
    pub fn origin(&self) -> Option<Coordinate> {
        self.steps.first().and_then(|step| step.geometry.first().copied())
    }

    /// Sum of step distances from `step_index` to the end, in meters.
    pub fn remaining_from_step_m(&self, step_index: usize) -> f64 {
        self.steps
            .iter()
            .skip(step_index)
            .map(|step| step.distance_m)
            .sum()
    }

    /// Bounding box of the overview geometry, for fit-to-route views.
    pub fn bounds(&self) -> Option<GeoBounds> {
        GeoBounds::from_points(&self.geometry)
    }
}

/// Route reduced to totals and overview geometry, the shape returned
/// when turn-by-turn steps were not requested.
#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    pub distance_km: f64,
    pub duration_min: u32,
    pub geometry: Vec<Coordinate>,
}

impl RouteSummary {
    pub fn from_json(json: &str) -> Result<Self, RouteError> {
        let response: DirectionsResponse = serde_json::from_str(json)?;
        Self::from_response(response)
    }

    pub fn from_response(response: DirectionsResponse) -> Result<Self, RouteError> {
        let provider_route = best_route(response)?;
        let geometry = polyline::decode(&provider_route.geometry)?;

        Ok(RouteSummary {
            distance_km: provider_route.distance / 1000.0,
            duration_min: (provider_route.duration / 60.0).round() as u32,
            geometry,
        })
    }
}

/// Straight-line versus road distance between two points.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DistanceReport {
    pub straight_line_km: f64,
    pub road_km: f64,
    pub duration_min: u32,
}

impl DistanceReport {
    pub fn new(a: Coordinate, b: Coordinate, summary: &RouteSummary) -> Self {
        DistanceReport {
            straight_line_km: geo::distance_km(a, b),
            road_km: summary.distance_km,
            duration_min: summary.duration_min,
        }
    }

    pub fn straight_line_miles(&self) -> f64 {
        geo::km_to_miles(self.straight_line_km)
    }

    pub fn road_miles(&self) -> f64 {
        geo::km_to_miles(self.road_km)
    }
}

fn best_route(response: DirectionsResponse) -> Result<ProviderRoute, RouteError> {
    if response.code != "Ok" {
        return Err(RouteError::Unavailable);
    }
    response
        .routes
        .into_iter()
        .next()
        .ok_or(RouteError::Unavailable)
}

/// Instruction text for one provider step.
///
/// Arrival maneuvers always get the fixed literal. Other maneuvers use
/// the provider's text when present and a synthesized phrase otherwise.
fn step_instruction(step: &ProviderStep) -> String {
    if step.maneuver.kind == ManeuverType::Arrive {
        return ARRIVAL_INSTRUCTION.to_string();
    }

    if let Some(text) = step.maneuver.instruction.as_deref() {
        if !text.is_empty() {
            return text.to_string();
        }
    }

    synthesize_instruction(step)
}

fn synthesize_instruction(step: &ProviderStep) -> String {
    let modifier = step.maneuver.modifier.as_deref();

    let action = match (&step.maneuver.kind, modifier) {
        (ManeuverType::Depart, _) => "Head out".to_string(),
        (ManeuverType::Turn, Some(m)) => format!("Turn {m}"),
        (ManeuverType::Turn, None) => "Turn".to_string(),
        (ManeuverType::Continue, None) | (ManeuverType::Continue, Some("straight")) => {
            "Continue straight".to_string()
        }
        (ManeuverType::Continue, Some(m)) => format!("Continue {m}"),
        (ManeuverType::Roundabout, _) => "Take the roundabout".to_string(),
        (ManeuverType::Fork, Some(m)) => format!("Keep {m} at the fork"),
        (ManeuverType::Fork, None) => "Keep ahead at the fork".to_string(),
        (ManeuverType::Merge, Some(m)) => format!("Merge {m}"),
        (ManeuverType::Merge, None) => "Merge".to_string(),
        (ManeuverType::EndOfRoad, Some(m)) => format!("Turn {m} at the end of the road"),
        (ManeuverType::EndOfRoad, None) => "Continue at the end of the road".to_string(),
        (ManeuverType::NewName, _) => "Continue".to_string(),
        (ManeuverType::Other(kind), Some(m)) => format!("{} {m}", capitalize(kind)),
        (ManeuverType::Other(kind), None) => capitalize(kind),
        (ManeuverType::Arrive, _) => ARRIVAL_INSTRUCTION.to_string(),
    };

    if step.name.is_empty() {
        action
    } else {
        format!("{action} onto {}", step.name)
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyline::encode;
    use serde_json::json;

    fn pt(lat: f64, lng: f64) -> Coordinate {
        Coordinate { lat, lng }
    }

    fn step_json(
        kind: &str,
        modifier: Option<&str>,
        instruction: Option<&str>,
        name: &str,
        distance: f64,
        duration: f64,
        geometry: &[Coordinate],
    ) -> serde_json::Value {
        let mut maneuver = json!({ "type": kind });
        if let Some(m) = modifier {
            maneuver["modifier"] = json!(m);
        }
        if let Some(i) = instruction {
            maneuver["instruction"] = json!(i);
        }
        json!({
            "distance": distance,
            "duration": duration,
            "name": name,
            "geometry": encode(geometry),
            "maneuver": maneuver,
        })
    }

    fn directions_json(steps: Vec<serde_json::Value>, overview: &[Coordinate]) -> String {
        json!({
            "code": "Ok",
            "routes": [{
                "distance": 1000.0,
                "duration": 600.0,
                "geometry": encode(overview),
                "legs": [{ "steps": steps }],
            }],
        })
        .to_string()
    }

    fn two_step_route_json() -> String {
        let overview = [pt(48.0, 16.0), pt(48.001, 16.0), pt(48.002, 16.0)];
        let steps = vec![
            step_json(
                "depart",
                None,
                Some("Head north on Ring"),
                "Ring",
                600.0,
                360.0,
                &overview[..2],
            ),
            step_json(
                "arrive",
                None,
                Some("You have arrived"),
                "",
                400.0,
                240.0,
                &overview[1..],
            ),
        ];
        directions_json(steps, &overview)
    }

    #[test]
    fn builds_route_from_provider_payload() {
        let route = Route::from_json(&two_step_route_json()).unwrap();

        assert_eq!(route.steps.len(), 2);
        assert!((route.total_distance_km - 1.0).abs() < 1e-9);
        assert_eq!(route.total_duration_min, 10);
        assert_eq!(route.geometry.len(), 3);
        assert_eq!(route.step_offsets_m, vec![0.0, 600.0]);
    }

    #[test]
    fn arrival_instruction_is_overridden() {
        let route = Route::from_json(&two_step_route_json()).unwrap();
        // Provider said "You have arrived"; the model does not care
        assert_eq!(route.steps[1].instruction, ARRIVAL_INSTRUCTION);
    }

    #[test]
    fn provider_instruction_is_kept_for_other_steps() {
        let route = Route::from_json(&two_step_route_json()).unwrap();
        assert_eq!(route.steps[0].instruction, "Head north on Ring");
    }

    #[test]
    fn empty_route_list_is_unavailable() {
        // Success code with no routes must not produce a route
        let json = json!({ "code": "Ok", "routes": [] }).to_string();
        assert!(matches!(
            Route::from_json(&json),
            Err(RouteError::Unavailable)
        ));
    }

    #[test]
    fn non_success_code_is_unavailable() {
        let json = json!({
            "code": "NoRoute",
            "routes": [{
                "distance": 1.0,
                "duration": 1.0,
                "geometry": "",
                "legs": [],
            }],
        })
        .to_string();
        assert!(matches!(
            Route::from_json(&json),
            Err(RouteError::Unavailable)
        ));
    }

    #[test]
    fn malformed_step_geometry_propagates() {
        let json = json!({
            "code": "Ok",
            "routes": [{
                "distance": 100.0,
                "duration": 60.0,
                "geometry": "",
                "legs": [{ "steps": [{
                    "distance": 100.0,
                    "duration": 60.0,
                    "name": "",
                    "geometry": "_p~i",
                    "maneuver": { "type": "depart" },
                }]}],
            }],
        })
        .to_string();

        assert!(matches!(
            Route::from_json(&json),
            Err(RouteError::Geometry(_))
        ));
    }

    #[test]
    fn malformed_body_is_a_payload_error() {
        assert!(matches!(
            Route::from_json("not json"),
            Err(RouteError::Payload(_))
        ));
    }

    #[test]
    fn missing_instruction_is_synthesized() {
        let geometry = [pt(48.0, 16.0), pt(48.001, 16.0)];
        let steps = vec![step_json(
            "turn",
            Some("left"),
            None,
            "High Street",
            100.0,
            30.0,
            &geometry,
        )];
        let route = Route::from_json(&directions_json(steps, &geometry)).unwrap();

        assert_eq!(route.steps[0].instruction, "Turn left onto High Street");
    }

    #[test]
    fn synthesized_instruction_without_road_name() {
        let geometry = [pt(48.0, 16.0), pt(48.001, 16.0)];
        let steps = vec![step_json("merge", Some("slight right"), None, "", 50.0, 10.0, &geometry)];
        let route = Route::from_json(&directions_json(steps, &geometry)).unwrap();

        assert_eq!(route.steps[0].instruction, "Merge slight right");
    }

    #[test]
    fn duration_rounds_to_nearest_minute() {
        let json = json!({
            "code": "Ok",
            "routes": [{
                "distance": 1500.0,
                "duration": 330.0,
                "geometry": "",
                "legs": [],
            }],
        })
        .to_string();
        let route = Route::from_json(&json).unwrap();

        assert!((route.total_distance_km - 1.5).abs() < 1e-9);
        assert_eq!(route.total_duration_min, 6);
    }

    #[test]
    fn route_endpoints_come_from_step_geometry() {
        let route = Route::from_json(&two_step_route_json()).unwrap();

        let origin = route.origin().unwrap();
        let destination = route.destination().unwrap();
        assert!((origin.lat - 48.0).abs() < 1e-9);
        assert!((destination.lat - 48.002).abs() < 1e-9);
    }

    #[test]
    fn remaining_from_step_sums_suffix() {
        let route = Route::from_json(&two_step_route_json()).unwrap();

        assert!((route.remaining_from_step_m(0) - 1000.0).abs() < 1e-9);
        assert!((route.remaining_from_step_m(1) - 400.0).abs() < 1e-9);
        assert_eq!(route.remaining_from_step_m(2), 0.0);
    }

    #[test]
    fn maneuver_type_open_set() {
        assert_eq!(ManeuverType::from("turn".to_string()), ManeuverType::Turn);
        assert_eq!(
            ManeuverType::from("end of road".to_string()),
            ManeuverType::EndOfRoad
        );
        assert_eq!(
            ManeuverType::from("rotary".to_string()),
            ManeuverType::Other("rotary".to_string())
        );
        assert_eq!(String::from(ManeuverType::Other("rotary".to_string())), "rotary");
    }

    #[test]
    fn summary_parses_without_steps() {
        let overview = [pt(51.505, -0.09), pt(51.51, -0.1)];
        let json = json!({
            "code": "Ok",
            "routes": [{
                "distance": 2500.0,
                "duration": 480.0,
                "geometry": encode(&overview),
            }],
        })
        .to_string();

        let summary = RouteSummary::from_json(&json).unwrap();
        assert!((summary.distance_km - 2.5).abs() < 1e-9);
        assert_eq!(summary.duration_min, 8);
        assert_eq!(summary.geometry.len(), 2);
    }

    #[test]
    fn distance_report_compares_straight_line_and_road() {
        let a = pt(48.2082, 16.3738);
        let b = pt(48.1486, 17.1077);
        let summary = RouteSummary {
            distance_km: 65.0,
            duration_min: 55,
            geometry: vec![a, b],
        };

        let report = DistanceReport::new(a, b, &summary);
        assert!(report.straight_line_km < report.road_km);
        assert!((report.road_miles() - 65.0 * 0.621371).abs() < 1e-6);
        assert_eq!(report.duration_min, 55);
    }
}
