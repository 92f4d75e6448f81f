//! Identifier and numeric field helpers shared by the encoder.

use crate::error::{FusionError, Result};

const ZONE_PREFIX: &str = "zone";
const SOURCE_PREFIX: &str = "source";

/// Number of output zones on the stereo
pub const ZONE_COUNT: usize = 4;

/// Convert a `zone<N>` identifier (N = 1..=4) to a zero-based index
pub fn zone_index(id: &str) -> Result<u32> {
    let n = id
        .strip_prefix(ZONE_PREFIX)
        .and_then(|rest| rest.parse::<u32>().ok())
        .ok_or_else(|| FusionError::MalformedIdentifier(id.to_string()))?;

    if n == 0 || n as usize > ZONE_COUNT {
        return Err(FusionError::MalformedIdentifier(id.to_string()));
    }

    Ok(n - 1)
}

/// Convert a `source<N>` identifier to its numeric index
///
/// An absent identifier maps to source 0. Callers that require a real
/// source must check for `None` themselves.
pub fn source_index(id: Option<&str>) -> Result<u32> {
    let Some(id) = id else {
        return Ok(0);
    };

    id.strip_prefix(SOURCE_PREFIX)
        .and_then(|rest| rest.parse::<u32>().ok())
        .ok_or_else(|| FusionError::MalformedIdentifier(id.to_string()))
}

/// Lower-case hex rendering, zero padded to at least two characters
pub fn hex2(value: u32) -> String {
    format!("{:02x}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_ids_map_to_zero_based_indices() {
        assert_eq!(zone_index("zone1").unwrap(), 0);
        assert_eq!(zone_index("zone2").unwrap(), 1);
        assert_eq!(zone_index("zone3").unwrap(), 2);
        assert_eq!(zone_index("zone4").unwrap(), 3);
    }

    #[test]
    fn zone_ids_outside_range_are_rejected() {
        for id in ["zone0", "zone5", "zone", "zoneX", "zone-1", "source1", ""] {
            assert!(
                matches!(zone_index(id), Err(FusionError::MalformedIdentifier(_))),
                "{id} should be rejected"
            );
        }
    }

    #[test]
    fn source_ids_parse_suffix() {
        assert_eq!(source_index(Some("source0")).unwrap(), 0);
        assert_eq!(source_index(Some("source11")).unwrap(), 11);
        assert!(source_index(Some("aux")).is_err());
    }

    #[test]
    fn absent_source_id_quietly_becomes_zero() {
        // Suspicious: a missing source silently selects source 0.
        assert_eq!(source_index(None).unwrap(), 0);
    }

    #[test]
    fn hex2_pads_to_two_characters() {
        assert_eq!(hex2(0), "00");
        assert_eq!(hex2(12), "0c");
        assert_eq!(hex2(24), "18");
        assert_eq!(hex2(255), "ff");
        assert_eq!(hex2(300), "12c");
    }
}
