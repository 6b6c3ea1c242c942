use serde::{Deserialize, Serialize};

use crate::credit_state::rating::{resolve_lgd, validate_pd, Rating, Seniority};
use crate::error::CreditCapitalError;
use crate::CreditCapitalResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A single trading-book credit position.
///
/// `notional` is a magnitude; the direction lives in `is_long`. At least one
/// of `rating` / `pd` is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub obligor_id: String,
    pub notional: f64,
    /// Current market value; defaults to the notional when absent
    #[serde(default)]
    pub market_value: Option<f64>,
    #[serde(default)]
    pub rating: Option<String>,
    #[serde(default)]
    pub pd: Option<f64>,
    /// Explicit LGD in [0, 1]; overrides the seniority default
    #[serde(default)]
    pub lgd: Option<f64>,
    #[serde(default)]
    pub seniority: Seniority,
    pub tenor_years: f64,
    #[serde(default = "default_sector")]
    pub sector: String,
    #[serde(default)]
    pub region: String,
    #[serde(default = "default_true")]
    pub is_long: bool,
    #[serde(default = "default_coupon_rate")]
    pub coupon_rate: f64,
    #[serde(default = "default_liquidity_horizon")]
    pub liquidity_horizon_months: u32,
    /// Two-factor loading ρ_i in [0, 1]
    #[serde(default)]
    pub systematic_factor: Option<f64>,
}

fn default_sector() -> String {
    "corporate".into()
}

fn default_true() -> bool {
    true
}

fn default_coupon_rate() -> f64 {
    0.05
}

fn default_liquidity_horizon() -> u32 {
    12
}

/// Credit quality after validation. Either side may be absent, not both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreditQuality {
    pub rating: Option<Rating>,
    pub pd: Option<f64>,
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

impl Position {
    /// Shorthand for a long senior-unsecured position with a rating.
    pub fn rated(id: &str, obligor_id: &str, notional: f64, rating: &str, tenor_years: f64) -> Self {
        Position {
            id: id.to_string(),
            obligor_id: obligor_id.to_string(),
            notional,
            market_value: None,
            rating: Some(rating.to_string()),
            pd: None,
            lgd: None,
            seniority: Seniority::default(),
            tenor_years,
            sector: default_sector(),
            region: String::new(),
            is_long: true,
            coupon_rate: default_coupon_rate(),
            liquidity_horizon_months: default_liquidity_horizon(),
            systematic_factor: None,
        }
    }

    /// Shorthand for a long senior-unsecured position carrying only a PD.
    pub fn with_pd(id: &str, obligor_id: &str, notional: f64, pd: f64, tenor_years: f64) -> Self {
        Position {
            rating: None,
            pd: Some(pd),
            ..Position::rated(id, obligor_id, notional, "BBB", tenor_years)
        }
    }

    /// Signed direction: +1 long, -1 short.
    pub fn direction(&self) -> f64 {
        if self.is_long {
            1.0
        } else {
            -1.0
        }
    }

    pub fn market_value_or_notional(&self) -> f64 {
        self.market_value.unwrap_or(self.notional)
    }

    /// Loss scale for the liquidity horizon, `sqrt(lh / 12)`.
    pub fn liquidity_factor(&self) -> f64 {
        (self.liquidity_horizon_months as f64 / 12.0).sqrt()
    }

    pub fn resolved_lgd(&self) -> CreditCapitalResult<f64> {
        resolve_lgd(&self.id, self.lgd, self.seniority)
    }

    pub fn credit_quality(&self) -> CreditCapitalResult<CreditQuality> {
        let rating = match &self.rating {
            Some(label) => Some(Rating::parse_for(&self.id, label)?),
            None => None,
        };
        let pd = match self.pd {
            Some(pd) => Some(validate_pd(&self.id, pd)?),
            None => None,
        };
        if rating.is_none() && pd.is_none() {
            return Err(CreditCapitalError::InvalidInput {
                field: format!("positions[{}]", self.id),
                reason: "either rating or pd is required".into(),
            });
        }
        Ok(CreditQuality { rating, pd })
    }

    /// Field-level checks; credit quality and LGD are resolved separately.
    pub fn validate(&self) -> CreditCapitalResult<()> {
        let field = |name: &str| format!("positions[{}].{}", self.id, name);
        if self.id.trim().is_empty() {
            return Err(CreditCapitalError::InvalidInput {
                field: "positions[].id".into(),
                reason: "position id must not be empty".into(),
            });
        }
        if self.obligor_id.trim().is_empty() {
            return Err(CreditCapitalError::InvalidInput {
                field: field("obligor_id"),
                reason: "obligor id must not be empty".into(),
            });
        }
        if !self.notional.is_finite() || self.notional < 0.0 {
            return Err(CreditCapitalError::InvalidInput {
                field: field("notional"),
                reason: format!("must be finite and non-negative, got {}", self.notional),
            });
        }
        if let Some(mv) = self.market_value {
            if !mv.is_finite() {
                return Err(CreditCapitalError::InvalidInput {
                    field: field("market_value"),
                    reason: "must be finite".into(),
                });
            }
        }
        if !self.tenor_years.is_finite() || self.tenor_years < 0.0 {
            return Err(CreditCapitalError::InvalidInput {
                field: field("tenor_years"),
                reason: format!("must be finite and non-negative, got {}", self.tenor_years),
            });
        }
        if !self.coupon_rate.is_finite() || self.coupon_rate < 0.0 {
            return Err(CreditCapitalError::InvalidInput {
                field: field("coupon_rate"),
                reason: format!("must be finite and non-negative, got {}", self.coupon_rate),
            });
        }
        if !(1..=12).contains(&self.liquidity_horizon_months) {
            return Err(CreditCapitalError::InvalidInput {
                field: field("liquidity_horizon_months"),
                reason: format!(
                    "must be between 1 and 12 months, got {}",
                    self.liquidity_horizon_months
                ),
            });
        }
        if let Some(rho) = self.systematic_factor {
            if !rho.is_finite() || !(0.0..=1.0).contains(&rho) {
                return Err(CreditCapitalError::InvalidInput {
                    field: field("systematic_factor"),
                    reason: format!("must be in [0, 1], got {}", rho),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_applies_defaults() {
        let json = r#"{
            "id": "p1",
            "obligor_id": "ACME",
            "notional": 1000000,
            "rating": "BB+",
            "tenor_years": 5
        }"#;
        let p: Position = serde_json::from_str(json).unwrap();
        assert!(p.is_long);
        assert_eq!(p.coupon_rate, 0.05);
        assert_eq!(p.liquidity_horizon_months, 12);
        assert_eq!(p.sector, "corporate");
        assert_eq!(p.seniority, Seniority::SeniorUnsecured);
        assert_eq!(p.market_value_or_notional(), 1_000_000.0);
        assert_eq!(p.liquidity_factor(), 1.0);
        assert!(p.validate().is_ok());
        assert_eq!(p.credit_quality().unwrap().rating, Some(Rating::BB));
    }

    #[test]
    fn test_negative_notional_rejected() {
        let p = Position::rated("p1", "X", -5.0, "A", 3.0);
        let err = p.validate().unwrap_err();
        assert!(err.to_string().contains("notional"));
    }

    #[test]
    fn test_nan_notional_rejected() {
        let p = Position::rated("p1", "X", f64::NAN, "A", 3.0);
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_missing_credit_quality() {
        let mut p = Position::rated("p1", "X", 1.0, "A", 3.0);
        p.rating = None;
        assert!(matches!(
            p.credit_quality(),
            Err(CreditCapitalError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_pd_out_of_range() {
        let p = Position::with_pd("p1", "X", 1.0, 1.0, 3.0);
        assert!(matches!(
            p.credit_quality(),
            Err(CreditCapitalError::InvalidPd { .. })
        ));
    }

    #[test]
    fn test_liquidity_horizon_bounds() {
        let mut p = Position::rated("p1", "X", 1.0, "A", 3.0);
        p.liquidity_horizon_months = 3;
        assert_eq!(p.liquidity_factor(), 0.5);
        p.liquidity_horizon_months = 0;
        assert!(p.validate().is_err());
        p.liquidity_horizon_months = 24;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_systematic_factor_bounds() {
        let mut p = Position::rated("p1", "X", 1.0, "A", 3.0);
        p.systematic_factor = Some(1.2);
        assert!(p.validate().is_err());
        p.systematic_factor = Some(0.3);
        assert!(p.validate().is_ok());
    }
}
