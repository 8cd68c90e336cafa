//! Geodesy primitives.
//!
//! Pure WGS84 (lat/lng in degrees) helpers shared by the route model,
//! the navigation session, and direction-arrow placement. No state.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometers to statute miles.
const MILES_PER_KM: f64 = 0.621371;

/// A geographic coordinate in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True when both components are inside the WGS84 value range
    /// (lat in [-90, 90], lng in [-180, 180]).
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Haversine great-circle distance between two coordinates in kilometers.
///
/// Pure and total: symmetric in its arguments, zero for identical points.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Initial compass bearing from `a` to `b` in degrees, normalized to [0, 360).
///
/// Returns a stable 0.0 for identical points; degenerate input is not an
/// error.
pub fn bearing_degrees(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();

    let bearing = y.atan2(x).to_degrees();
    (bearing + 360.0) % 360.0
}

/// Total length of a point sequence in kilometers.
pub fn path_length_km(points: &[Coordinate]) -> f64 {
    points.windows(2).map(|w| distance_km(w[0], w[1])).sum()
}

pub fn km_to_miles(km: f64) -> f64 {
    km * MILES_PER_KM
}

/// Axis-aligned bounding box over a coordinate set, used to fit the
/// viewport to a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    /// Smallest box containing every point. Returns None for an empty slice.
    pub fn from_points(points: &[Coordinate]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = GeoBounds {
            south: first.lat,
            west: first.lng,
            north: first.lat,
            east: first.lng,
        };

        for p in &points[1..] {
            bounds.south = bounds.south.min(p.lat);
            bounds.west = bounds.west.min(p.lng);
            bounds.north = bounds.north.max(p.lat);
            bounds.east = bounds.east.max(p.lng);
        }

        Some(bounds)
    }

    pub fn center(&self) -> Coordinate {
        Coordinate {
            lat: (self.south + self.north) / 2.0,
            lng: (self.west + self.east) / 2.0,
        }
    }
}
