//! Google polyline codec.
//!
//! Decodes the encoded geometry strings returned by the routing provider
//! into coordinate lists, and encodes coordinate lists back (used to
//! verify the round-trip property). Coordinates are scaled by 1e5 and
//! delta-encoded as zig-zag varints in 5-bit groups.

use thiserror::Error;

use crate::geo::Coordinate;

/// Decoding failure. Malformed geometry is reported, never turned into
/// an empty or partial coordinate list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The input ended in the middle of a varint group.
    #[error("encoded polyline truncated at byte {index}")]
    Truncated { index: usize },
    /// A byte outside the range the format can produce ('?' through '~').
    #[error("invalid byte {byte:#04x} at offset {index} in encoded polyline")]
    InvalidByte { byte: u8, index: usize },
}

/// Decode an encoded polyline into an ordered coordinate list.
///
/// An empty string decodes to an empty list.
pub fn decode(encoded: &str) -> Result<Vec<Coordinate>, DecodeError> {
    let bytes = encoded.as_bytes();
    let mut coordinates = Vec::new();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;

    while index < bytes.len() {
        lat += read_delta(bytes, &mut index)?;
        lng += read_delta(bytes, &mut index)?;
        coordinates.push(Coordinate {
            lat: lat as f64 / 1e5,
            lng: lng as f64 / 1e5,
        });
    }

    Ok(coordinates)
}

/// Encode a coordinate list with the standard 5-decimal precision.
pub fn encode(coordinates: &[Coordinate]) -> String {
    let mut out = String::new();
    let mut prev_lat: i64 = 0;
    let mut prev_lng: i64 = 0;

    for c in coordinates {
        let lat = scale(c.lat);
        let lng = scale(c.lng);
        write_delta(lat - prev_lat, &mut out);
        write_delta(lng - prev_lng, &mut out);
        prev_lat = lat;
        prev_lng = lng;
    }

    out
}

/// Read one zig-zag varint group and return the signed delta.
fn read_delta(bytes: &[u8], index: &mut usize) -> Result<i64, DecodeError> {
    let mut shift = 0u32;
    let mut result: i64 = 0;

    loop {
        let byte = match bytes.get(*index) {
            Some(&b) => b,
            None => return Err(DecodeError::Truncated { index: *index }),
        };
        if !(63..=126).contains(&byte) {
            return Err(DecodeError::InvalidByte {
                byte,
                index: *index,
            });
        }
        *index += 1;

        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;

        if chunk < 0x20 {
            break;
        }
    }

    // Zig-zag: low bit carries the sign
    Ok(if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

fn scale(value: f64) -> i64 {
    (value * 1e5).round() as i64
}

fn write_delta(delta: i64, out: &mut String) {
    let mut value = if delta < 0 { !(delta << 1) } else { delta << 1 };

    while value >= 0x20 {
        out.push(((0x20 | (value & 0x1f)) + 63) as u8 as char);
        value >>= 5;
    }
    out.push((value + 63) as u8 as char);
}
