use serde::{Deserialize, Serialize};

/// Destination classification the remote ERP uses for tax treatment of a case.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DestinationZone {
    Domestic,
    RegionalBloc,
    RestOfWorld,
}

const REGIONAL_BLOC: &[&str] = &[
    "AT", "BE", "BG", "CY", "CZ", "DE", "DK", "EE", "ES", "FI", "FR", "GR", "HR", "HU", "IE",
    "IT", "LT", "LU", "LV", "MT", "NL", "PL", "PT", "RO", "SE", "SI", "SK",
];

impl DestinationZone {
    /// Missing or blank countries are treated as domestic. Any other code
    /// outside the home country and the bloc is rest of world.
    pub fn classify(country: Option<&str>, home_country: &str) -> Self {
        let code = match country.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => code.to_uppercase(),
            None => return DestinationZone::Domestic,
        };

        if code.eq_ignore_ascii_case(home_country) {
            DestinationZone::Domestic
        } else if REGIONAL_BLOC.contains(&code.as_str()) {
            DestinationZone::RegionalBloc
        } else {
            DestinationZone::RestOfWorld
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_country_is_domestic() {
        assert_eq!(DestinationZone::classify(Some("es"), "ES"), DestinationZone::Domestic);
        assert_eq!(DestinationZone::classify(None, "ES"), DestinationZone::Domestic);
        assert_eq!(DestinationZone::classify(Some("  "), "ES"), DestinationZone::Domestic);
    }

    #[test]
    fn test_bloc_and_rest_of_world() {
        assert_eq!(DestinationZone::classify(Some("PT"), "ES"), DestinationZone::RegionalBloc);
        assert_eq!(DestinationZone::classify(Some("MA"), "ES"), DestinationZone::RestOfWorld);
        assert_eq!(DestinationZone::classify(Some("GB"), "ES"), DestinationZone::RestOfWorld);
    }

    #[test]
    fn test_unrecognized_code_is_rest_of_world() {
        assert_eq!(DestinationZone::classify(Some("XX"), "ES"), DestinationZone::RestOfWorld);
        assert_eq!(DestinationZone::classify(Some(" xx "), "ES"), DestinationZone::RestOfWorld);
    }

    #[test]
    fn test_home_country_outside_bloc() {
        assert_eq!(DestinationZone::classify(Some("ES"), "GB"), DestinationZone::RegionalBloc);
        assert_eq!(DestinationZone::classify(Some("gb"), "GB"), DestinationZone::Domestic);
    }
}
