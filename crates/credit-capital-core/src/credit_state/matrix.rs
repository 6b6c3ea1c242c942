use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::credit_state::rating::{Rating, NUM_RATINGS};
use crate::distribution::norm_inv;
use crate::error::CreditCapitalError;
use crate::CreditCapitalResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One-year rating transition matrix as supplied by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionMatrix {
    pub name: String,
    /// Rating labels, e.g. ["AAA", "AA", "A", "BBB", "BB", "B", "CCC", "D"]
    pub ratings: Vec<String>,
    /// Row i = from rating[i], column j = to rating[j]; each row sums to 1
    pub probabilities: Vec<Vec<f64>>,
}

/// Cumulative migration thresholds for one source rating, in shock space.
///
/// Buckets run worst to best (D, CCC, ..., AAA). An obligor with shock `z`
/// lands in the first bucket whose threshold satisfies `z <= threshold`,
/// which is the same as `Φ(z) <= cumulative probability`.
#[derive(Debug, Clone)]
pub struct MigrationRow {
    pub targets: [Rating; NUM_RATINGS],
    pub cumulative: [f64; NUM_RATINGS],
    pub z_thresholds: [f64; NUM_RATINGS],
}

/// A validated matrix in canonical rating order with precomputed rows.
#[derive(Debug, Clone)]
pub struct CompiledMatrix {
    pub name: String,
    probabilities: [[f64; NUM_RATINGS]; NUM_RATINGS],
    rows: Vec<MigrationRow>,
}

/// Max |row_sum - 1| accepted before a row is rejected.
pub const ROW_SUM_TOLERANCE: f64 = 1e-3;

// ---------------------------------------------------------------------------
// Built-in matrices (S&P-style historical averages and scenario variants)
// ---------------------------------------------------------------------------

type Grid = [[f64; NUM_RATINGS]; NUM_RATINGS];

const GLOBAL: Grid = [
    [0.9081, 0.0833, 0.0068, 0.0006, 0.0008, 0.0003, 0.0001, 0.0000],
    [0.0070, 0.9065, 0.0779, 0.0064, 0.0006, 0.0010, 0.0004, 0.0002],
    [0.0009, 0.0227, 0.9105, 0.0552, 0.0074, 0.0021, 0.0006, 0.0006],
    [0.0002, 0.0033, 0.0595, 0.8693, 0.0530, 0.0102, 0.0027, 0.0018],
    [0.0003, 0.0014, 0.0067, 0.0773, 0.8053, 0.0804, 0.0180, 0.0106],
    [0.0000, 0.0011, 0.0024, 0.0043, 0.0648, 0.8297, 0.0456, 0.0521],
    [0.0022, 0.0000, 0.0022, 0.0130, 0.0238, 0.1124, 0.6486, 0.1978],
    [0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 1.0000],
];

const EUROPE: Grid = [
    [0.9150, 0.0770, 0.0060, 0.0008, 0.0006, 0.0004, 0.0002, 0.0000],
    [0.0080, 0.9120, 0.0720, 0.0058, 0.0008, 0.0008, 0.0004, 0.0002],
    [0.0012, 0.0250, 0.9150, 0.0500, 0.0060, 0.0018, 0.0005, 0.0005],
    [0.0003, 0.0040, 0.0620, 0.8750, 0.0460, 0.0085, 0.0025, 0.0017],
    [0.0004, 0.0016, 0.0075, 0.0820, 0.8100, 0.0750, 0.0150, 0.0085],
    [0.0000, 0.0012, 0.0028, 0.0050, 0.0700, 0.8350, 0.0420, 0.0440],
    [0.0020, 0.0000, 0.0025, 0.0150, 0.0280, 0.1200, 0.6525, 0.1800],
    [0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 1.0000],
];

const EMERGING_MARKETS: Grid = [
    [0.8800, 0.1000, 0.0140, 0.0030, 0.0015, 0.0010, 0.0005, 0.0000],
    [0.0050, 0.8850, 0.0900, 0.0120, 0.0040, 0.0020, 0.0012, 0.0008],
    [0.0006, 0.0180, 0.8900, 0.0700, 0.0130, 0.0050, 0.0020, 0.0014],
    [0.0001, 0.0020, 0.0480, 0.8400, 0.0750, 0.0200, 0.0080, 0.0069],
    [0.0002, 0.0010, 0.0050, 0.0650, 0.7700, 0.1050, 0.0300, 0.0238],
    [0.0000, 0.0008, 0.0018, 0.0035, 0.0550, 0.7900, 0.0650, 0.0839],
    [0.0015, 0.0000, 0.0015, 0.0100, 0.0200, 0.0900, 0.5770, 0.3000],
    [0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 1.0000],
];

const FINANCIALS: Grid = [
    [0.9000, 0.0880, 0.0085, 0.0015, 0.0010, 0.0006, 0.0003, 0.0001],
    [0.0060, 0.9000, 0.0820, 0.0080, 0.0018, 0.0012, 0.0006, 0.0004],
    [0.0007, 0.0200, 0.9050, 0.0600, 0.0090, 0.0030, 0.0012, 0.0011],
    [0.0001, 0.0025, 0.0550, 0.8600, 0.0580, 0.0140, 0.0050, 0.0054],
    [0.0002, 0.0010, 0.0055, 0.0700, 0.7900, 0.0900, 0.0250, 0.0183],
    [0.0000, 0.0008, 0.0020, 0.0040, 0.0600, 0.8100, 0.0550, 0.0682],
    [0.0018, 0.0000, 0.0020, 0.0120, 0.0220, 0.1050, 0.6072, 0.2500],
    [0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 1.0000],
];

const SOVEREIGN: Grid = [
    [0.9500, 0.0450, 0.0040, 0.0005, 0.0003, 0.0001, 0.0001, 0.0000],
    [0.0100, 0.9400, 0.0450, 0.0035, 0.0008, 0.0004, 0.0002, 0.0001],
    [0.0015, 0.0300, 0.9300, 0.0320, 0.0045, 0.0012, 0.0005, 0.0003],
    [0.0003, 0.0050, 0.0700, 0.8800, 0.0350, 0.0060, 0.0022, 0.0015],
    [0.0005, 0.0020, 0.0100, 0.0900, 0.8200, 0.0550, 0.0130, 0.0095],
    [0.0000, 0.0015, 0.0030, 0.0060, 0.0800, 0.8300, 0.0380, 0.0415],
    [0.0025, 0.0000, 0.0030, 0.0180, 0.0350, 0.1300, 0.6315, 0.1800],
    [0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 1.0000],
];

const RECESSION: Grid = [
    [0.8500, 0.1200, 0.0200, 0.0050, 0.0030, 0.0012, 0.0006, 0.0002],
    [0.0040, 0.8600, 0.1050, 0.0180, 0.0060, 0.0035, 0.0020, 0.0015],
    [0.0005, 0.0150, 0.8700, 0.0800, 0.0200, 0.0080, 0.0035, 0.0030],
    [0.0001, 0.0020, 0.0400, 0.8200, 0.0850, 0.0300, 0.0120, 0.0109],
    [0.0001, 0.0008, 0.0040, 0.0550, 0.7400, 0.1200, 0.0450, 0.0351],
    [0.0000, 0.0005, 0.0015, 0.0030, 0.0450, 0.7600, 0.0800, 0.1100],
    [0.0010, 0.0000, 0.0010, 0.0080, 0.0150, 0.0800, 0.5050, 0.3900],
    [0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 1.0000],
];

const BENIGN: Grid = [
    [0.9300, 0.0640, 0.0045, 0.0008, 0.0004, 0.0002, 0.0001, 0.0000],
    [0.0100, 0.9250, 0.0580, 0.0050, 0.0010, 0.0006, 0.0003, 0.0001],
    [0.0015, 0.0300, 0.9300, 0.0330, 0.0040, 0.0010, 0.0003, 0.0002],
    [0.0005, 0.0050, 0.0750, 0.8900, 0.0230, 0.0045, 0.0012, 0.0008],
    [0.0005, 0.0020, 0.0100, 0.0950, 0.8400, 0.0400, 0.0080, 0.0045],
    [0.0000, 0.0015, 0.0035, 0.0060, 0.0850, 0.8600, 0.0250, 0.0190],
    [0.0030, 0.0000, 0.0035, 0.0200, 0.0400, 0.1500, 0.6835, 0.1000],
    [0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 0.0000, 1.0000],
];

/// Canonical names of the built-in matrices.
pub const BUILTIN_MATRICES: [&str; 7] = [
    "global",
    "europe",
    "emerging_markets",
    "financials",
    "sovereign",
    "recession",
    "benign",
];

/// Resolve an alias to a canonical built-in name.
pub fn canonical_matrix_name(name: &str) -> Option<&'static str> {
    match name.trim().to_ascii_lowercase().as_str() {
        "global" | "us_corporate" | "default" => Some("global"),
        "europe" | "eu" => Some("europe"),
        "emerging_markets" | "em" => Some("emerging_markets"),
        "financials" | "financial" | "banks" => Some("financials"),
        "sovereign" | "sovereigns" => Some("sovereign"),
        "recession" | "stressed" | "downturn" | "crisis" => Some("recession"),
        "benign" | "expansion" => Some("benign"),
        _ => None,
    }
}

fn builtin_grid(canonical: &str) -> Option<&'static Grid> {
    match canonical {
        "global" => Some(&GLOBAL),
        "europe" => Some(&EUROPE),
        "emerging_markets" => Some(&EMERGING_MARKETS),
        "financials" => Some(&FINANCIALS),
        "sovereign" => Some(&SOVEREIGN),
        "recession" => Some(&RECESSION),
        "benign" => Some(&BENIGN),
        _ => None,
    }
}

/// Export a built-in matrix in caller-facing form.
pub fn builtin_matrix(name: &str) -> CreditCapitalResult<TransitionMatrix> {
    let canonical =
        canonical_matrix_name(name).ok_or_else(|| CreditCapitalError::UnknownMatrix(name.into()))?;
    let grid = builtin_grid(canonical).ok_or_else(|| CreditCapitalError::UnknownMatrix(name.into()))?;
    Ok(TransitionMatrix {
        name: canonical.to_string(),
        ratings: Rating::ALL.iter().map(|r| r.as_str().to_string()).collect(),
        probabilities: grid.iter().map(|row| row.to_vec()).collect(),
    })
}

// ---------------------------------------------------------------------------
// Validation and compilation
// ---------------------------------------------------------------------------

fn malformed(matrix: &str, rating: &str, reason: String) -> CreditCapitalError {
    CreditCapitalError::MalformedMatrix {
        matrix: matrix.to_string(),
        rating: rating.to_string(),
        reason,
    }
}

impl TransitionMatrix {
    /// Validate and reorder into canonical rating order.
    pub fn compile(&self) -> CreditCapitalResult<CompiledMatrix> {
        let name = self.name.as_str();
        if self.ratings.len() != NUM_RATINGS {
            return Err(malformed(
                name,
                "*",
                format!("expected {} ratings, got {}", NUM_RATINGS, self.ratings.len()),
            ));
        }
        if self.probabilities.len() != NUM_RATINGS {
            return Err(malformed(
                name,
                "*",
                format!(
                    "matrix has {} rows but {} ratings",
                    self.probabilities.len(),
                    NUM_RATINGS
                ),
            ));
        }

        // Position of each caller label in canonical order.
        let mut order = [0usize; NUM_RATINGS];
        let mut seen = [false; NUM_RATINGS];
        for (i, label) in self.ratings.iter().enumerate() {
            let rating = Rating::parse(label)
                .ok_or_else(|| malformed(name, label, "unknown rating label".into()))?;
            if seen[rating.index()] {
                return Err(malformed(name, label, "duplicate rating label".into()));
            }
            seen[rating.index()] = true;
            order[i] = rating.index();
        }

        let mut grid = [[0.0; NUM_RATINGS]; NUM_RATINGS];
        for (i, row) in self.probabilities.iter().enumerate() {
            let label = &self.ratings[i];
            if row.len() != NUM_RATINGS {
                return Err(malformed(
                    name,
                    label,
                    format!("row has {} columns but {} ratings", row.len(), NUM_RATINGS),
                ));
            }
            for (j, &p) in row.iter().enumerate() {
                grid[order[i]][order[j]] = p;
            }
        }
        CompiledMatrix::from_grid(name, &grid)
    }
}

impl CompiledMatrix {
    /// Load a built-in matrix by name or alias.
    pub fn builtin(name: &str) -> CreditCapitalResult<CompiledMatrix> {
        let canonical = canonical_matrix_name(name)
            .ok_or_else(|| CreditCapitalError::UnknownMatrix(name.into()))?;
        let grid =
            builtin_grid(canonical).ok_or_else(|| CreditCapitalError::UnknownMatrix(name.into()))?;
        CompiledMatrix::from_grid(canonical, grid)
    }

    fn from_grid(name: &str, grid: &Grid) -> CreditCapitalResult<CompiledMatrix> {
        let mut rows = Vec::with_capacity(NUM_RATINGS);
        for from in Rating::ALL {
            let row = &grid[from.index()];
            for (j, &p) in row.iter().enumerate() {
                if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                    return Err(malformed(
                        name,
                        from.as_str(),
                        format!("probability to {} is {}, outside [0, 1]", Rating::ALL[j], p),
                    ));
                }
            }
            let row_sum: f64 = row.iter().sum();
            if (row_sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(malformed(
                    name,
                    from.as_str(),
                    format!("row sums to {:.6}, expected 1 within {}", row_sum, ROW_SUM_TOLERANCE),
                ));
            }
            rows.push(MigrationRow::build(row, row_sum));
        }

        let d = Rating::D.index();
        if (grid[d][d] - 1.0).abs() > ROW_SUM_TOLERANCE {
            return Err(malformed(
                name,
                "D",
                format!("default state is not absorbing (self-transition = {})", grid[d][d]),
            ));
        }
        let pd_best = grid[Rating::AAA.index()][d];
        let pd_worst = grid[Rating::CCC.index()][d];
        if pd_worst <= pd_best {
            return Err(malformed(
                name,
                "CCC",
                format!(
                    "default probability {} does not exceed AAA default probability {}",
                    pd_worst, pd_best
                ),
            ));
        }

        Ok(CompiledMatrix {
            name: name.to_string(),
            probabilities: *grid,
            rows,
        })
    }

    /// One-year probability of moving from `from` to `to`.
    pub fn probability(&self, from: Rating, to: Rating) -> f64 {
        self.probabilities[from.index()][to.index()]
    }

    /// One-year default probability of `from`.
    pub fn default_probability(&self, from: Rating) -> f64 {
        self.probability(from, Rating::D)
    }

    pub fn row(&self, from: Rating) -> &MigrationRow {
        &self.rows[from.index()]
    }
}

impl MigrationRow {
    fn build(row: &[f64; NUM_RATINGS], row_sum: f64) -> MigrationRow {
        let mut targets = [Rating::D; NUM_RATINGS];
        let mut cumulative = [0.0; NUM_RATINGS];
        let mut z_thresholds = [0.0; NUM_RATINGS];
        let mut running = 0.0;
        for (k, rating) in Rating::ALL.iter().rev().copied().enumerate() {
            running += row[rating.index()] / row_sum;
            targets[k] = rating;
            cumulative[k] = running.min(1.0);
        }
        // Renormalised rows terminate at exactly one.
        cumulative[NUM_RATINGS - 1] = 1.0;
        for k in 0..NUM_RATINGS {
            z_thresholds[k] = norm_inv(cumulative[k]);
        }
        MigrationRow {
            targets,
            cumulative,
            z_thresholds,
        }
    }

    /// New rating for a shock `z`.
    pub fn migrate(&self, z: f64) -> Rating {
        for (k, &threshold) in self.z_thresholds.iter().enumerate() {
            if z <= threshold {
                return self.targets[k];
            }
        }
        self.targets[NUM_RATINGS - 1]
    }
}

// ---------------------------------------------------------------------------
// Selection rules
// ---------------------------------------------------------------------------

fn default_matrix_name() -> String {
    "global".into()
}

fn default_region_rules() -> HashMap<String, String> {
    [
        ("US", "global"),
        ("ASIA", "global"),
        ("EU", "europe"),
        ("EM", "emerging_markets"),
        ("LATAM", "emerging_markets"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_sector_rules() -> HashMap<String, String> {
    [
        ("financial", "financials"),
        ("financials", "financials"),
        ("bank", "financials"),
        ("banks", "financials"),
        ("insurance", "financials"),
        ("sovereign", "sovereign"),
        ("sovereigns", "sovereign"),
        ("government", "sovereign"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Chooses a transition matrix per obligor.
///
/// Priority: issuer override, then sector rule, then region rule, then the
/// default matrix. Sector keys match case-insensitively, region keys likewise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixSelector {
    #[serde(default = "default_matrix_name")]
    pub default_matrix: String,
    #[serde(default = "default_region_rules")]
    pub by_region: HashMap<String, String>,
    #[serde(default = "default_sector_rules")]
    pub by_sector: HashMap<String, String>,
    #[serde(default)]
    pub by_issuer: HashMap<String, String>,
    /// Caller-supplied matrices; take precedence over built-ins of the same name.
    #[serde(default)]
    pub custom_matrices: Vec<TransitionMatrix>,
}

impl Default for MatrixSelector {
    fn default() -> Self {
        MatrixSelector {
            default_matrix: default_matrix_name(),
            by_region: default_region_rules(),
            by_sector: default_sector_rules(),
            by_issuer: HashMap::new(),
            custom_matrices: Vec::new(),
        }
    }
}

impl MatrixSelector {
    /// A selector that sends every obligor to one matrix.
    pub fn single(name: &str) -> Self {
        MatrixSelector {
            default_matrix: name.to_string(),
            by_region: HashMap::new(),
            by_sector: HashMap::new(),
            by_issuer: HashMap::new(),
            custom_matrices: Vec::new(),
        }
    }

    /// Validate every referenced matrix and freeze the rules.
    pub fn compile(&self) -> CreditCapitalResult<MatrixCatalog> {
        let mut catalog = MatrixCatalog {
            matrices: Vec::new(),
            by_name: HashMap::new(),
            default_idx: 0,
            by_region: HashMap::new(),
            by_sector: HashMap::new(),
            by_issuer: HashMap::new(),
        };
        for custom in &self.custom_matrices {
            let compiled = custom.compile()?;
            let key = custom.name.trim().to_ascii_lowercase();
            if catalog.by_name.contains_key(&key) {
                return Err(CreditCapitalError::InvalidInput {
                    field: "matrix_selector.custom_matrices".into(),
                    reason: format!("duplicate matrix name '{}'", custom.name),
                });
            }
            catalog.by_name.insert(key, catalog.matrices.len());
            catalog.matrices.push(compiled);
        }

        catalog.default_idx = catalog.intern(&self.default_matrix)?;
        for (region, name) in &self.by_region {
            let idx = catalog.intern(name)?;
            catalog.by_region.insert(region.trim().to_ascii_uppercase(), idx);
        }
        for (sector, name) in &self.by_sector {
            let idx = catalog.intern(name)?;
            catalog.by_sector.insert(sector.trim().to_ascii_lowercase(), idx);
        }
        for (issuer, name) in &self.by_issuer {
            let idx = catalog.intern(name)?;
            catalog.by_issuer.insert(issuer.clone(), idx);
        }
        Ok(catalog)
    }
}

/// Compiled matrices plus the frozen selection rules.
#[derive(Debug, Clone)]
pub struct MatrixCatalog {
    matrices: Vec<CompiledMatrix>,
    by_name: HashMap<String, usize>,
    default_idx: usize,
    by_region: HashMap<String, usize>,
    by_sector: HashMap<String, usize>,
    by_issuer: HashMap<String, usize>,
}

impl MatrixCatalog {
    /// Index of a named matrix, compiling a built-in on first use.
    fn intern(&mut self, name: &str) -> CreditCapitalResult<usize> {
        let key = name.trim().to_ascii_lowercase();
        if let Some(&idx) = self.by_name.get(&key) {
            return Ok(idx);
        }
        let canonical =
            canonical_matrix_name(&key).ok_or_else(|| CreditCapitalError::UnknownMatrix(name.into()))?;
        let idx = match self.by_name.get(canonical) {
            Some(&idx) => idx,
            None => {
                self.matrices.push(CompiledMatrix::builtin(canonical)?);
                self.matrices.len() - 1
            }
        };
        self.by_name.insert(canonical.to_string(), idx);
        self.by_name.insert(key, idx);
        Ok(idx)
    }

    /// Matrix index for an obligor with the given attributes.
    pub fn select(&self, obligor_id: &str, sector: &str, region: &str) -> usize {
        if let Some(&idx) = self.by_issuer.get(obligor_id) {
            return idx;
        }
        if let Some(&idx) = self.by_sector.get(&sector.trim().to_ascii_lowercase()) {
            return idx;
        }
        if let Some(&idx) = self.by_region.get(&region.trim().to_ascii_uppercase()) {
            return idx;
        }
        self.default_idx
    }

    pub fn matrix(&self, idx: usize) -> &CompiledMatrix {
        &self.matrices[idx]
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_all_builtins_compile() {
        for name in BUILTIN_MATRICES {
            let m = CompiledMatrix::builtin(name).unwrap();
            assert_eq!(m.name, name);
            assert!(m.default_probability(Rating::CCC) > m.default_probability(Rating::AAA));
        }
    }

    #[test]
    fn test_aliases_resolve() {
        assert_eq!(canonical_matrix_name("EM"), Some("emerging_markets"));
        assert_eq!(canonical_matrix_name("crisis"), Some("recession"));
        assert_eq!(canonical_matrix_name("us_corporate"), Some("global"));
        assert_eq!(canonical_matrix_name("martian"), None);
    }

    #[test]
    fn test_cumulative_rows_monotone_and_terminate_at_one() {
        let m = CompiledMatrix::builtin("global").unwrap();
        for from in Rating::ALL {
            let row = m.row(from);
            assert_eq!(row.targets[0], Rating::D);
            assert_eq!(row.targets[NUM_RATINGS - 1], Rating::AAA);
            for k in 1..NUM_RATINGS {
                assert!(row.cumulative[k] >= row.cumulative[k - 1]);
                assert!(row.z_thresholds[k] >= row.z_thresholds[k - 1]);
            }
            assert_eq!(row.cumulative[NUM_RATINGS - 1], 1.0);
        }
    }

    #[test]
    fn test_first_bucket_is_default_probability() {
        let m = CompiledMatrix::builtin("global").unwrap();
        let row = m.row(Rating::BB);
        assert_abs_diff_eq!(row.cumulative[0], 0.0106, epsilon = 1e-12);
    }

    #[test]
    fn test_migrate_extremes() {
        let m = CompiledMatrix::builtin("global").unwrap();
        let row = m.row(Rating::BBB);
        assert_eq!(row.migrate(-8.0), Rating::D);
        assert_eq!(row.migrate(8.0), Rating::AAA);
        assert_eq!(row.migrate(0.0), Rating::BBB);
    }

    /// Reference walk over cumulative probabilities with a uniform draw.
    fn migrate_uniform(row: &MigrationRow, u: f64) -> Rating {
        for (k, &c) in row.cumulative.iter().enumerate() {
            if u <= c && (k == 0 || c > row.cumulative[k - 1]) {
                return row.targets[k];
            }
        }
        row.targets[NUM_RATINGS - 1]
    }

    #[test]
    fn test_migrate_matches_uniform_walk() {
        let m = CompiledMatrix::builtin("europe").unwrap();
        let row = m.row(Rating::BB);
        for i in 1..200 {
            let z = -4.0 + i as f64 * 0.04;
            let u = crate::distribution::norm_cdf(z);
            assert_eq!(row.migrate(z), migrate_uniform(row, u), "z = {}", z);
        }
    }

    #[test]
    fn test_zero_probability_bucket_never_hit() {
        // AAA has zero default probability in the global matrix.
        let m = CompiledMatrix::builtin("global").unwrap();
        let row = m.row(Rating::AAA);
        assert_eq!(row.z_thresholds[0], f64::NEG_INFINITY);
        assert_ne!(row.migrate(-40.0), Rating::D);
    }

    #[test]
    fn test_default_row_absorbing() {
        let m = CompiledMatrix::builtin("global").unwrap();
        assert_eq!(m.row(Rating::D).migrate(5.0), Rating::D);
    }

    fn custom(probabilities: Vec<Vec<f64>>) -> TransitionMatrix {
        TransitionMatrix {
            name: "custom".into(),
            ratings: Rating::ALL.iter().map(|r| r.to_string()).collect(),
            probabilities,
        }
    }

    #[test]
    fn test_rejects_bad_row_sum() {
        let mut grid = builtin_matrix("global").unwrap().probabilities;
        grid[3][3] += 0.05;
        let err = custom(grid).compile().unwrap_err();
        match err {
            CreditCapitalError::MalformedMatrix { rating, .. } => assert_eq!(rating, "BBB"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_rejects_negative_probability() {
        let mut grid = builtin_matrix("global").unwrap().probabilities;
        grid[2][0] = -0.0009;
        grid[2][2] += 0.0018;
        assert!(custom(grid).compile().is_err());
    }

    #[test]
    fn test_rejects_inverted_ordering() {
        let mut grid = builtin_matrix("global").unwrap().probabilities;
        // Swap AAA and CCC rows.
        grid.swap(0, 6);
        assert!(custom(grid).compile().is_err());
    }

    #[test]
    fn test_reorders_caller_labels() {
        let base = builtin_matrix("global").unwrap();
        let mut reversed = TransitionMatrix {
            name: "reversed".into(),
            ratings: base.ratings.iter().rev().cloned().collect(),
            probabilities: base.probabilities.iter().rev().cloned().collect(),
        };
        for row in &mut reversed.probabilities {
            row.reverse();
        }
        let m = reversed.compile().unwrap();
        assert_abs_diff_eq!(m.default_probability(Rating::BB), 0.0106, epsilon = 1e-12);
        assert_abs_diff_eq!(m.probability(Rating::A, Rating::BBB), 0.0552, epsilon = 1e-12);
    }

    #[test]
    fn test_selector_priority() {
        let mut selector = MatrixSelector::default();
        selector.by_issuer.insert("Petrobras".into(), "recession".into());
        let catalog = selector.compile().unwrap();

        let pick = |o: &str, s: &str, r: &str| catalog.matrix(catalog.select(o, s, r)).name.clone();
        assert_eq!(pick("Apple", "tech", "US"), "global");
        assert_eq!(pick("Siemens", "industrial", "eu"), "europe");
        assert_eq!(pick("Deutsche Bank", "Financial", "EU"), "financials");
        assert_eq!(pick("Brazil", "sovereign", "LATAM"), "sovereign");
        assert_eq!(pick("Vale", "mining", "LATAM"), "emerging_markets");
        assert_eq!(pick("Petrobras", "energy", "EM"), "recession");
        assert_eq!(pick("Unknown", "corporate", "MARS"), "global");
    }

    #[test]
    fn test_selector_shares_compiled_aliases() {
        let mut selector = MatrixSelector::single("em");
        selector.by_region.insert("BR".into(), "emerging_markets".into());
        let catalog = selector.compile().unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_selector_unknown_matrix() {
        let selector = MatrixSelector::single("lunar");
        assert!(matches!(
            selector.compile(),
            Err(CreditCapitalError::UnknownMatrix(_))
        ));
    }

    #[test]
    fn test_selector_custom_matrix_wins() {
        let mut m = builtin_matrix("benign").unwrap();
        m.name = "global".into();
        let mut selector = MatrixSelector::single("global");
        selector.custom_matrices.push(m);
        let catalog = selector.compile().unwrap();
        let chosen = catalog.matrix(catalog.select("x", "corporate", "US"));
        assert_abs_diff_eq!(chosen.default_probability(Rating::CCC), 0.1000, epsilon = 1e-12);
    }
}
