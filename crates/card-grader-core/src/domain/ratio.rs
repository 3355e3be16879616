//! Centering ratios such as "55/45".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Split of two opposing margins, expressed as percentages of their sum.
///
/// Displayed larger side first ("60/40"), regardless of which side is wider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CenteringRatio {
    /// Share of the first margin (left or top), 0-100.
    first_percent: f64,
}

impl CenteringRatio {
    /// A perfectly centered 50/50 ratio.
    pub const CENTERED: Self = Self {
        first_percent: 50.0,
    };

    /// Builds a ratio from two opposing margin widths.
    ///
    /// Two zero-width margins are treated as centered.
    #[must_use]
    pub fn from_margins(first: f64, second: f64) -> Self {
        let first = first.max(0.0);
        let second = second.max(0.0);
        let total = first + second;
        if total <= f64::EPSILON {
            return Self::CENTERED;
        }
        Self {
            first_percent: first / total * 100.0,
        }
    }

    /// Builds a ratio from the larger side's percentage (e.g. 55 for "55/45").
    #[must_use]
    pub fn from_larger_percent(percent: f64) -> Self {
        Self {
            first_percent: percent.clamp(50.0, 100.0),
        }
    }

    /// Share of the first margin (left or top), 0-100.
    #[must_use]
    pub const fn first_percent(&self) -> f64 {
        self.first_percent
    }

    /// Unrounded share of the wider margin, 50-100.
    #[must_use]
    pub fn larger_percent(&self) -> f64 {
        self.first_percent.max(100.0 - self.first_percent)
    }

    /// Wider margin share rounded to whole percent, as displayed.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn rounded_larger(&self) -> u8 {
        self.larger_percent().round().clamp(50.0, 100.0) as u8
    }

    /// Deviation from 50/50 in percentage points (0-50).
    #[must_use]
    pub fn deviation(&self) -> f64 {
        (self.first_percent - 50.0).abs()
    }

    /// Returns `true` when this ratio is no worse than `bound`, as displayed.
    #[must_use]
    pub fn within(&self, bound: &Self) -> bool {
        self.rounded_larger() <= bound.rounded_larger()
    }
}

impl fmt::Display for CenteringRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let larger = self.rounded_larger();
        write!(f, "{larger}/{}", 100 - larger)
    }
}

impl FromStr for CenteringRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s
            .split_once('/')
            .ok_or_else(|| format!("centering ratio '{s}' must look like '55/45'"))?;
        let a: f64 = a
            .trim()
            .parse()
            .map_err(|_| format!("'{a}' in centering ratio '{s}' is not a number"))?;
        let b: f64 = b
            .trim()
            .parse()
            .map_err(|_| format!("'{b}' in centering ratio '{s}' is not a number"))?;
        if a < 0.0 || b < 0.0 || ((a + b) - 100.0).abs() > 0.5 {
            return Err(format!("centering ratio '{s}' must add up to 100"));
        }
        Ok(Self::from_margins(a, b))
    }
}

impl TryFrom<String> for CenteringRatio {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CenteringRatio> for String {
    fn from(value: CenteringRatio) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_puts_larger_side_first() {
        assert_eq!(CenteringRatio::from_margins(45.0, 55.0).to_string(), "55/45");
        assert_eq!(CenteringRatio::from_margins(55.0, 45.0).to_string(), "55/45");
        assert_eq!(CenteringRatio::from_margins(70.0, 70.0).to_string(), "50/50");
    }

    #[test]
    fn test_zero_margins_are_centered() {
        assert_eq!(CenteringRatio::from_margins(0.0, 0.0), CenteringRatio::CENTERED);
    }

    #[test]
    fn test_parse() {
        let ratio: CenteringRatio = "60/40".parse().expect("valid ratio");
        assert_eq!(ratio.rounded_larger(), 60);
        assert!((ratio.deviation() - 10.0).abs() < 1e-9);

        assert!("60-40".parse::<CenteringRatio>().is_err());
        assert!("60/30".parse::<CenteringRatio>().is_err());
        assert!("x/40".parse::<CenteringRatio>().is_err());
    }

    #[test]
    fn test_within_compares_displayed_values() {
        let bound: CenteringRatio = "55/45".parse().expect("valid ratio");
        assert!(CenteringRatio::from_margins(55.2, 44.8).within(&bound));
        assert!(!CenteringRatio::from_margins(60.0, 40.0).within(&bound));
        assert!(CenteringRatio::CENTERED.within(&bound));
    }
}
