use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Distance decay applied to supply and demand within the catchment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecayFunction {
    /// `exp(-0.5 * (x / d0)^2)`
    Gaussian,
}

impl DecayFunction {
    pub const ALL: [DecayFunction; 1] = [DecayFunction::Gaussian];

    /// Weight of a partner at `distance` for catchment size `d0`.
    #[inline]
    pub fn weight(self, distance: f64, d0: f64) -> f64 {
        match self {
            DecayFunction::Gaussian => (-0.5 * (distance / d0).powi(2)).exp(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DecayFunction::Gaussian => "Gaussian",
        }
    }
}

impl fmt::Display for DecayFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for DecayFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DecayFunction::ALL.into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known = DecayFunction::ALL.map(DecayFunction::name).join(", ");
                Error::configuration(format!("unknown decay function {s:?}; available: {known}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaussian_weights() {
        let g = DecayFunction::Gaussian;
        assert_eq!(g.weight(0.0, 1000.0), 1.0);
        assert!((g.weight(1000.0, 1000.0) - (-0.5f64).exp()).abs() < 1e-15);
        assert!(g.weight(500.0, 1000.0) > g.weight(900.0, 1000.0));
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("gaussian".parse::<DecayFunction>().unwrap(), DecayFunction::Gaussian);
        let err = "Linear".parse::<DecayFunction>().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
        assert!(err.to_string().contains("Gaussian"));
    }
}
