use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CreditCapitalError;
use crate::CreditCapitalResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Number of rating states in every transition matrix, default included.
pub const NUM_RATINGS: usize = 8;

/// Base letter ratings, best first. `D` is the absorbing default state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rating {
    AAA,
    AA,
    A,
    BBB,
    BB,
    B,
    CCC,
    D,
}

/// Debt seniority, used to derive LGD when none is supplied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seniority {
    SeniorSecured,
    #[default]
    SeniorUnsecured,
    Subordinated,
    Equity,
}

/// Tolerance on log-PD distance below which two bands count as a tie.
const TIE_TOLERANCE: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Rating
// ---------------------------------------------------------------------------

impl Rating {
    /// All states in matrix order, best first.
    pub const ALL: [Rating; NUM_RATINGS] = [
        Rating::AAA,
        Rating::AA,
        Rating::A,
        Rating::BBB,
        Rating::BB,
        Rating::B,
        Rating::CCC,
        Rating::D,
    ];

    /// Column/row index in a transition matrix.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Rating> {
        Rating::ALL.get(idx).copied()
    }

    pub fn is_default(self) -> bool {
        self == Rating::D
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rating::AAA => "AAA",
            Rating::AA => "AA",
            Rating::A => "A",
            Rating::BBB => "BBB",
            Rating::BB => "BB",
            Rating::B => "B",
            Rating::CCC => "CCC",
            Rating::D => "D",
        }
    }

    /// Parse a rating label, folding notches into the base letter grade
    /// ("BBB-" -> BBB, "aa+" -> AA, "below_CCC-" -> CCC).
    pub fn parse(label: &str) -> Option<Rating> {
        let upper = label.trim().to_ascii_uppercase();
        if upper == "BELOW_CCC-" {
            return Some(Rating::CCC);
        }
        let base = upper.trim_end_matches(['+', '-']);
        Rating::ALL.iter().copied().find(|r| r.as_str() == base)
    }

    /// Parse a rating carried on a position, failing with `UnknownRating`.
    pub fn parse_for(position: &str, label: &str) -> CreditCapitalResult<Rating> {
        Rating::parse(label).ok_or_else(|| CreditCapitalError::UnknownRating {
            position: position.to_string(),
            rating: label.to_string(),
        })
    }

    /// Representative one-year PD of the letter grade, used to band PD inputs.
    pub fn reference_pd(self) -> f64 {
        match self {
            Rating::AAA => 0.0001,
            Rating::AA => 0.0003,
            Rating::A => 0.0009,
            Rating::BBB => 0.0040,
            Rating::BB => 0.0200,
            Rating::B => 0.0900,
            Rating::CCC => 0.2700,
            Rating::D => 1.0,
        }
    }

    /// Map a PD onto the nearest performing rating band.
    ///
    /// Distance is |ln(pd) - ln(band_pd)|; ties go to the riskier band.
    /// Callers validate `pd` first (see [`validate_pd`]).
    pub fn from_pd(pd: f64) -> Rating {
        let ln_pd = pd.max(f64::MIN_POSITIVE).ln();
        let mut best = Rating::AAA;
        let mut best_distance = f64::INFINITY;
        for rating in Rating::ALL.iter().copied().filter(|r| !r.is_default()) {
            let distance = (ln_pd - rating.reference_pd().ln()).abs();
            if distance < best_distance - TIE_TOLERANCE
                || (distance - best_distance).abs() <= TIE_TOLERANCE
            {
                best = rating;
                best_distance = distance;
            }
        }
        best
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reject PDs outside [0, 1) or non-finite.
pub fn validate_pd(position: &str, pd: f64) -> CreditCapitalResult<f64> {
    if !pd.is_finite() || !(0.0..1.0).contains(&pd) {
        return Err(CreditCapitalError::InvalidPd {
            position: position.to_string(),
            pd,
        });
    }
    Ok(pd)
}

// ---------------------------------------------------------------------------
// Seniority / LGD
// ---------------------------------------------------------------------------

impl Seniority {
    pub fn default_lgd(self) -> f64 {
        match self {
            Seniority::SeniorSecured => 0.25,
            Seniority::SeniorUnsecured => 0.45,
            Seniority::Subordinated => 0.75,
            Seniority::Equity => 1.00,
        }
    }
}

/// Explicit LGD wins over the seniority default. Must lie in [0, 1].
pub fn resolve_lgd(
    position: &str,
    lgd: Option<f64>,
    seniority: Seniority,
) -> CreditCapitalResult<f64> {
    match lgd {
        Some(v) if v.is_finite() && (0.0..=1.0).contains(&v) => Ok(v),
        Some(v) => Err(CreditCapitalError::InvalidInput {
            field: format!("positions[{}].lgd", position),
            reason: format!("must be in [0, 1], got {}", v),
        }),
        None => Ok(seniority.default_lgd()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
