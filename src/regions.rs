//! Lookup table for the sixteen German federal states.
//!
//! Ids follow the official state keys (`AGS` prefix) used by `IdBundesland`
//! and `BundeslandId` in the feature services.

/// Identifier of a federal state (1..=16).
pub type RegionId = u8;

/// A federal state's static metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Official state key.
    pub id: RegionId,
    /// Two-letter abbreviation.
    pub abbreviation: &'static str,
    /// Display name.
    pub name: &'static str,
}

const REGIONS: [Region; 16] = [
    Region { id: 1, abbreviation: "SH", name: "Schleswig-Holstein" },
    Region { id: 2, abbreviation: "HH", name: "Hamburg" },
    Region { id: 3, abbreviation: "NI", name: "Niedersachsen" },
    Region { id: 4, abbreviation: "HB", name: "Bremen" },
    Region { id: 5, abbreviation: "NW", name: "Nordrhein-Westfalen" },
    Region { id: 6, abbreviation: "HE", name: "Hessen" },
    Region { id: 7, abbreviation: "RP", name: "Rheinland-Pfalz" },
    Region { id: 8, abbreviation: "BW", name: "Baden-Württemberg" },
    Region { id: 9, abbreviation: "BY", name: "Bayern" },
    Region { id: 10, abbreviation: "SL", name: "Saarland" },
    Region { id: 11, abbreviation: "BE", name: "Berlin" },
    Region { id: 12, abbreviation: "BB", name: "Brandenburg" },
    Region { id: 13, abbreviation: "MV", name: "Mecklenburg-Vorpommern" },
    Region { id: 14, abbreviation: "SN", name: "Sachsen" },
    Region { id: 15, abbreviation: "ST", name: "Sachsen-Anhalt" },
    Region { id: 16, abbreviation: "TH", name: "Thüringen" },
];

/// Look up a state by id.
pub fn by_id(id: RegionId) -> Option<&'static Region> {
    REGIONS.iter().find(|r| r.id == id)
}

/// Look up a state by abbreviation, ignoring case.
pub fn by_abbreviation(abbreviation: &str) -> Option<&'static Region> {
    REGIONS
        .iter()
        .find(|r| r.abbreviation.eq_ignore_ascii_case(abbreviation))
}

/// The abbreviation for a state id.
pub fn abbreviation(id: RegionId) -> Option<&'static str> {
    by_id(id).map(|r| r.abbreviation)
}

/// Two-digit, zero-padded state code as expected by the alternate source.
pub fn region_code(id: RegionId) -> String {
    format!("{:02}", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_id() {
        assert_eq!(abbreviation(1), Some("SH"));
        assert_eq!(abbreviation(16), Some("TH"));
        assert_eq!(abbreviation(0), None);
        assert_eq!(abbreviation(17), None);
    }

    #[test]
    fn test_lookup_by_abbreviation() {
        assert_eq!(by_abbreviation("by").map(|r| r.id), Some(9));
        assert!(by_abbreviation("XX").is_none());
    }

    #[test]
    fn test_region_code_is_zero_padded() {
        assert_eq!(region_code(3), "03");
        assert_eq!(region_code(11), "11");
    }

    #[test]
    fn test_table_is_ordered_and_complete() {
        let ids: Vec<RegionId> = REGIONS.iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=16).collect::<Vec<_>>());
        assert!((1..=16).all(|id| by_id(id).is_some()));
    }
}
