use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::credit_state::matrix::{MatrixCatalog, MigrationRow};
use crate::credit_state::position::{CreditQuality, Position};
use crate::credit_state::rating::{Rating, NUM_RATINGS};
use crate::credit_state::spreads::{credit_spread_bps, spread_pv01};
use crate::distribution::norm_inv;
use crate::error::CreditCapitalError;
use crate::simulation::config::{SimulationConfig, SimulationMode};
use crate::CreditCapitalResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Outcome of one obligor on one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "rating", rename_all = "snake_case")]
pub enum ObligorCreditState {
    Migrated(Rating),
    Defaulted,
    Survived,
}

/// Per-obligor loss model, fixed once before any path is drawn.
#[derive(Debug, Clone)]
pub enum ObligorModel {
    /// Netted signed loss for every target rating, indexed by `Rating::index`.
    Migration {
        row: MigrationRow,
        loss_by_target: [f64; NUM_RATINGS],
    },
    /// Default iff Z < threshold; netted signed loss on default.
    DefaultOnly { threshold: f64, default_loss: f64 },
    /// Already in default; no further loss.
    Absorbed,
}

/// All positions of one obligor, netted.
#[derive(Debug, Clone)]
pub struct Obligor {
    pub id: String,
    pub rating: Rating,
    /// One-year default probability driving this obligor
    pub pd: f64,
    pub matrix: String,
    pub systematic_weight: f64,
    pub idiosyncratic_weight: f64,
    pub position_indices: Vec<usize>,
    pub gross_notional: f64,
    /// Long minus short notional
    pub net_notional: f64,
    pub model: ObligorModel,
}

/// Obligor arena built once per call; paths index into it by position.
#[derive(Debug, Clone)]
pub struct ObligorBook {
    pub obligors: Vec<Obligor>,
    pub num_positions: usize,
    pub matrices_used: Vec<String>,
}

/// Attributes that must agree across an obligor's positions.
struct ObligorKey {
    quality: CreditQuality,
    systematic_factor: Option<f64>,
    matrix: usize,
    first_position: String,
}

// ---------------------------------------------------------------------------
// Obligor
// ---------------------------------------------------------------------------

impl Obligor {
    /// Map a correlated shock to a credit state.
    pub fn credit_state(&self, z: f64) -> ObligorCreditState {
        match &self.model {
            ObligorModel::Migration { row, .. } => match row.migrate(z) {
                Rating::D => ObligorCreditState::Defaulted,
                r => ObligorCreditState::Migrated(r),
            },
            ObligorModel::DefaultOnly { threshold, .. } => {
                if z < *threshold {
                    ObligorCreditState::Defaulted
                } else {
                    ObligorCreditState::Survived
                }
            }
            ObligorModel::Absorbed => ObligorCreditState::Defaulted,
        }
    }

    /// Netted signed loss for a state, before the per-obligor floor.
    pub fn net_loss(&self, state: ObligorCreditState) -> f64 {
        match (&self.model, state) {
            (ObligorModel::Migration { loss_by_target, .. }, ObligorCreditState::Migrated(r)) => {
                loss_by_target[r.index()]
            }
            (ObligorModel::Migration { loss_by_target, .. }, ObligorCreditState::Defaulted) => {
                loss_by_target[Rating::D.index()]
            }
            (ObligorModel::DefaultOnly { default_loss, .. }, ObligorCreditState::Defaulted) => {
                *default_loss
            }
            _ => 0.0,
        }
    }

    /// Path loss for a shock: netted, then floored at zero.
    pub fn path_loss(&self, z: f64) -> f64 {
        self.net_loss(self.credit_state(z)).max(0.0)
    }
}

// ---------------------------------------------------------------------------
// ObligorBook
// ---------------------------------------------------------------------------

impl ObligorBook {
    /// Validate positions, group them by obligor and fix each obligor's
    /// loss model for the configured mode.
    pub fn build(
        positions: &[Position],
        catalog: &MatrixCatalog,
        config: &SimulationConfig,
    ) -> CreditCapitalResult<ObligorBook> {
        if positions.is_empty() {
            return Err(CreditCapitalError::InsufficientData(
                "At least one position is required".into(),
            ));
        }

        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<(ObligorKey, Vec<usize>)> = Vec::new();
        for (i, p) in positions.iter().enumerate() {
            p.validate()?;
            p.resolved_lgd()?;
            let quality = p.credit_quality()?;
            let matrix = catalog.select(&p.obligor_id, &p.sector, &p.region);
            match index.get(p.obligor_id.as_str()) {
                Some(&g) => {
                    let (key, members) = &mut groups[g];
                    if key.quality != quality {
                        return Err(CreditCapitalError::InvalidInput {
                            field: format!("positions[{}].rating", p.id),
                            reason: format!(
                                "obligor '{}' has conflicting credit quality with position '{}'",
                                p.obligor_id, key.first_position
                            ),
                        });
                    }
                    if key.systematic_factor != p.systematic_factor {
                        return Err(CreditCapitalError::InvalidInput {
                            field: format!("positions[{}].systematic_factor", p.id),
                            reason: format!(
                                "obligor '{}' has conflicting systematic_factor with position '{}'",
                                p.obligor_id, key.first_position
                            ),
                        });
                    }
                    if key.matrix != matrix {
                        return Err(CreditCapitalError::InvalidInput {
                            field: format!("positions[{}].sector", p.id),
                            reason: format!(
                                "obligor '{}' resolves to matrix '{}' but position '{}' resolves to '{}'",
                                p.obligor_id,
                                catalog.matrix(matrix).name,
                                key.first_position,
                                catalog.matrix(key.matrix).name
                            ),
                        });
                    }
                    members.push(i);
                }
                None => {
                    index.insert(p.obligor_id.as_str(), groups.len());
                    groups.push((
                        ObligorKey {
                            quality,
                            systematic_factor: p.systematic_factor,
                            matrix,
                            first_position: p.id.clone(),
                        },
                        vec![i],
                    ));
                }
            }
        }

        let mut obligors = Vec::with_capacity(groups.len());
        let mut matrices_used: Vec<String> = Vec::new();
        for (key, members) in groups {
            let obligor = build_obligor(positions, &members, &key, catalog, config)?;
            if !matrices_used.contains(&obligor.matrix) {
                matrices_used.push(obligor.matrix.clone());
            }
            obligors.push(obligor);
        }

        debug!(
            positions = positions.len(),
            obligors = obligors.len(),
            matrices = ?matrices_used,
            "obligor book built"
        );

        Ok(ObligorBook {
            obligors,
            num_positions: positions.len(),
            matrices_used,
        })
    }

    pub fn len(&self) -> usize {
        self.obligors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obligors.is_empty()
    }

    pub fn obligor_ids(&self) -> Vec<String> {
        self.obligors.iter().map(|o| o.id.clone()).collect()
    }
}

fn build_obligor(
    positions: &[Position],
    members: &[usize],
    key: &ObligorKey,
    catalog: &MatrixCatalog,
    config: &SimulationConfig,
) -> CreditCapitalResult<Obligor> {
    let first = &positions[members[0]];
    let matrix = catalog.matrix(key.matrix);
    let rating = match (key.quality.rating, key.quality.pd) {
        (Some(r), _) => r,
        (None, Some(pd)) => Rating::from_pd(pd),
        (None, None) => {
            return Err(CreditCapitalError::InvalidInput {
                field: format!("positions[{}]", first.id),
                reason: "either rating or pd is required".into(),
            })
        }
    };
    let (systematic_weight, idiosyncratic_weight) =
        config.effective_factor_model().weights(key.systematic_factor);

    let mut gross_notional = 0.0;
    let mut net_notional = 0.0;
    for &i in members {
        let p = &positions[i];
        gross_notional += p.notional;
        net_notional += p.direction() * p.notional;
    }

    let (pd, model) = if rating.is_default() {
        (1.0, ObligorModel::Absorbed)
    } else {
        match config.mode {
            SimulationMode::Migration => {
                let mut loss_by_target = [0.0; NUM_RATINGS];
                for &i in members {
                    let p = &positions[i];
                    let lgd = p.resolved_lgd()?;
                    let pv01 = spread_pv01(p.notional, p.tenor_years, p.coupon_rate);
                    let current = credit_spread_bps(rating, p.tenor_years);
                    let scale = p.direction() * p.liquidity_factor();
                    for target in Rating::ALL {
                        let loss = if target.is_default() {
                            lgd * p.notional
                        } else {
                            (credit_spread_bps(target, p.tenor_years) - current) * pv01
                        };
                        loss_by_target[target.index()] += loss * scale;
                    }
                }
                check_finite(&first.obligor_id, &loss_by_target)?;
                (
                    matrix.default_probability(rating),
                    ObligorModel::Migration {
                        row: matrix.row(rating).clone(),
                        loss_by_target,
                    },
                )
            }
            SimulationMode::DefaultOnly => {
                let raw = key.quality.pd.unwrap_or_else(|| matrix.default_probability(rating));
                let pd = raw.max(config.pd_floor);
                if pd >= 1.0 {
                    return Err(CreditCapitalError::InvalidPd {
                        position: first.id.clone(),
                        pd,
                    });
                }
                let mut default_loss = 0.0;
                for &i in members {
                    let p = &positions[i];
                    default_loss += p.direction() * p.resolved_lgd()? * p.notional;
                }
                check_finite(&first.obligor_id, &[default_loss])?;
                (
                    pd,
                    ObligorModel::DefaultOnly {
                        threshold: norm_inv(pd),
                        default_loss,
                    },
                )
            }
        }
    };

    Ok(Obligor {
        id: first.obligor_id.clone(),
        rating,
        pd,
        matrix: matrix.name.clone(),
        systematic_weight,
        idiosyncratic_weight,
        position_indices: members.to_vec(),
        gross_notional,
        net_notional,
        model,
    })
}

fn check_finite(obligor: &str, losses: &[f64]) -> CreditCapitalResult<()> {
    if losses.iter().all(|l| l.is_finite()) {
        Ok(())
    } else {
        Err(CreditCapitalError::Numerical {
            context: format!("non-finite loss for obligor '{}'", obligor),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
