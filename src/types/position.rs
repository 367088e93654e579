//! GPS coordinates as carried on the wire

use serde::Serialize;

const SIGN_BIT: u32 = 0x8000_0000;
const MICRO_DEGREES: f64 = 1_000_000.0;

/// Latitude/longitude pair in signed micro-degrees.
///
/// Devices encode each axis as sign-magnitude: bit 31 marks south/west and the low
/// 31 bits hold the magnitude in millionths of a degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub lat_micro: i32,
    pub lon_micro: i32,
}

impl Position {
    /// Decode both axes from their raw sign-magnitude words.
    pub fn from_wire(lat: u32, lon: u32) -> Self {
        Self { lat_micro: sign_magnitude(lat), lon_micro: sign_magnitude(lon) }
    }

    /// Latitude in degrees.
    pub fn latitude(&self) -> f64 {
        f64::from(self.lat_micro) / MICRO_DEGREES
    }

    /// Longitude in degrees.
    pub fn longitude(&self) -> f64 {
        f64::from(self.lon_micro) / MICRO_DEGREES
    }

    /// Devices report 0,0 when no location was acquired.
    pub fn is_null(&self) -> bool {
        self.lat_micro == 0 && self.lon_micro == 0
    }

    /// Whether both axes are inside the valid degree range.
    pub fn is_plausible(&self) -> bool {
        self.lat_micro.abs() <= 90_000_000 && self.lon_micro.abs() <= 180_000_000
    }
}

fn sign_magnitude(raw: u32) -> i32 {
    // Masked to 31 bits, so the cast is lossless.
    let magnitude = (raw & !SIGN_BIT) as i32;
    if raw & SIGN_BIT != 0 { -magnitude } else { magnitude }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captured_scan_position_decodes_to_langley() {
        let position = Position::from_wire(0x02ED_F43C, 0x874F_5A2A);
        assert_eq!(position.lat_micro, 49_148_988);
        assert_eq!(position.lon_micro, -122_640_938);
        assert!(position.is_plausible());
    }

    #[test]
    fn degrees_are_exact_for_micro_degree_inputs() {
        let position = Position::from_wire(31_230_000, 121_470_000);
        assert_eq!(position.latitude(), 31.23);
        assert_eq!(position.longitude(), 121.47);
    }

    #[test]
    fn sign_bit_marks_southern_and_western_hemispheres() {
        let position = Position::from_wire(SIGN_BIT | 33_868_820, SIGN_BIT | 151_209_290);
        assert_eq!(position.latitude(), -33.86882);
        assert_eq!(position.longitude(), -151.20929);
    }

    #[test]
    fn null_island_is_treated_as_missing() {
        assert!(Position::from_wire(0, 0).is_null());
        assert!(Position::from_wire(SIGN_BIT, SIGN_BIT).is_null());
        assert!(!Position::from_wire(1, 0).is_null());
    }

    #[test]
    fn out_of_range_magnitudes_are_flagged() {
        assert!(!Position::from_wire(91_000_000, 0).is_plausible());
        assert!(!Position::from_wire(0, 0x7FFF_FFFF).is_plausible());
    }
}
