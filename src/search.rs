//! Geocoding result parsing.
//!
//! The search provider returns a JSON array of candidates whose
//! coordinates are decimal strings. This module turns that payload
//! into typed [`Place`] values; an empty array is a valid empty
//! result, not an error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::Coordinate;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The response body was not the expected shape.
    #[error("malformed geocoding response: {0}")]
    Payload(#[from] serde_json::Error),
    /// A candidate's coordinate string did not parse as a number.
    #[error("geocoding candidate {index} has an unparseable coordinate {value:?}")]
    Coordinate { index: usize, value: String },
}

/// One named location returned by the search provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
    pub display_name: String,
    pub coord: Coordinate,
}

#[derive(Debug, Deserialize)]
struct ProviderPlace {
    display_name: String,
    lat: String,
    lon: String,
}

/// Parse the provider's candidate list, best match first.
pub fn parse_candidates(json: &str) -> Result<Vec<Place>, SearchError> {
    let raw: Vec<ProviderPlace> = serde_json::from_str(json)?;

    raw.into_iter()
        .enumerate()
        .map(|(index, candidate)| {
            let lat = parse_coordinate(index, &candidate.lat)?;
            let lng = parse_coordinate(index, &candidate.lon)?;
            Ok(Place {
                display_name: candidate.display_name,
                coord: Coordinate { lat, lng },
            })
        })
        .collect()
}

fn parse_coordinate(index: usize, value: &str) -> Result<f64, SearchError> {
    value.trim().parse::<f64>().map_err(|_| SearchError::Coordinate {
        index,
        value: value.to_string(),
    })
}
