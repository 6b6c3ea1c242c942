use approx::{assert_abs_diff_eq, assert_relative_eq};
use credit_capital_core::capital::{
    calculate_capital_by_issuer, calculate_drc, compare_irc_vs_drc, CapitalInput,
};
use credit_capital_core::{
    simulate_credit_losses, summarize_losses, CreditCapitalError, FactorModel, Framework,
    MatrixSelector, Position, SimulationConfig, SimulationMode,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Fixtures
// ===========================================================================

fn drc_config(n: usize) -> SimulationConfig {
    SimulationConfig::drc().with_seed(42).with_simulations(n)
}

fn short(mut p: Position) -> Position {
    p.is_long = false;
    p
}

fn input(positions: Vec<Position>, n: usize) -> CapitalInput {
    CapitalInput {
        positions,
        config: drc_config(n),
        matrix_selector: MatrixSelector::default(),
        confidence_levels: vec![],
    }
}

fn capital(positions: &[Position], config: &SimulationConfig) -> f64 {
    let vector = simulate_credit_losses(positions, &MatrixSelector::default(), config).unwrap();
    summarize_losses(&vector, &[], false).unwrap().capital_charge
}

/// Ten identical high-yield names, 1M each.
fn homogeneous_pool() -> Vec<Position> {
    (0..10)
        .map(|i| {
            Position::rated(
                &format!("hy_{i}"),
                &format!("Issuer_{i}"),
                1_000_000.0,
                "BB",
                5.0,
            )
        })
        .collect()
}

// ===========================================================================
// Netting
// ===========================================================================

#[test]
fn test_corp_a_bond_and_cds_net() {
    let positions = vec![
        Position::with_pd("bond", "Corp_A", 10_000_000.0, 0.02, 5.0),
        short(Position::with_pd("cds", "Corp_A", 6_000_000.0, 0.02, 5.0)),
    ];
    let vector = simulate_credit_losses(&positions, &MatrixSelector::default(), &drc_config(50_000))
        .unwrap();

    // Every path either survives or loses exactly the netted 1.8M
    for &l in &vector.losses {
        assert!(l == 0.0 || (l - 1_800_000.0).abs() < 1e-6, "unexpected loss {l}");
    }
    let defaults = vector.losses.iter().filter(|l| **l > 0.0).count();
    let rate = defaults as f64 / vector.len() as f64;
    assert_abs_diff_eq!(rate, 0.02, epsilon = 0.003);

    let summary = summarize_losses(&vector, &[], false).unwrap();
    assert_abs_diff_eq!(summary.capital_charge, 1_800_000.0, epsilon = 1e-6);
}

#[test]
fn test_net_short_obligor_floors_at_zero() {
    let positions = vec![
        Position::with_pd("bond", "Corp_B", 2_000_000.0, 0.05, 5.0),
        short(Position::with_pd("cds", "Corp_B", 9_000_000.0, 0.05, 5.0)),
    ];
    let vector = simulate_credit_losses(&positions, &MatrixSelector::default(), &drc_config(20_000))
        .unwrap();
    assert!(vector.losses.iter().all(|l| *l == 0.0));
}

#[test]
fn test_hedge_does_not_offset_other_obligors() {
    // A short on Corp_B cannot absorb a default loss on Corp_A
    let hedged_elsewhere = vec![
        Position::with_pd("a", "Corp_A", 5_000_000.0, 0.03, 5.0),
        short(Position::with_pd("b", "Corp_B", 5_000_000.0, 0.03, 5.0)),
    ];
    let alone = vec![
        Position::with_pd("a", "Corp_A", 5_000_000.0, 0.03, 5.0),
        Position::with_pd("b", "Corp_B", 0.0, 0.03, 5.0),
    ];
    let config = drc_config(20_000);
    assert_eq!(capital(&hedged_elsewhere, &config), capital(&alone, &config));
}

// ===========================================================================
// Correlation
// ===========================================================================

#[test]
fn test_full_correlation_clusters_defaults() {
    let config = SimulationConfig {
        factor_model: Some(FactorModel::SingleFactor { rho: 1.0 }),
        ..drc_config(100_000)
    };
    // One shock drives every name: the tail is the whole pool in default
    assert_abs_diff_eq!(
        capital(&homogeneous_pool(), &config),
        10.0 * 0.45 * 1_000_000.0,
        epsilon = 1e-3
    );
}

#[test]
fn test_zero_correlation_diversifies() {
    let config = SimulationConfig {
        factor_model: Some(FactorModel::SingleFactor { rho: 0.0 }),
        ..drc_config(100_000)
    };
    // PD 1.06%: two joint defaults sit around the 99.5th percentile, three
    // are rarer than 1 in 5,000
    assert_abs_diff_eq!(
        capital(&homogeneous_pool(), &config),
        2.0 * 0.45 * 1_000_000.0,
        epsilon = 1e-3
    );
}

#[test]
fn test_capital_increases_with_loading() {
    let with_loading = |loading: f64| SimulationConfig {
        factor_model: Some(FactorModel::TwoFactor {
            default_loading: loading,
        }),
        ..drc_config(100_000)
    };
    let low = capital(&homogeneous_pool(), &with_loading(0.1));
    let high = capital(&homogeneous_pool(), &with_loading(0.8));
    assert!(high > low);
}

#[test]
fn test_wrong_way_pair_defaults_together() {
    let joint_defaults = |loading: f64| {
        let mut reference = Position::with_pd("cln_ref", "Ref_Entity", 1e6, 0.02, 5.0);
        let mut issuer = Position::with_pd("cln_issuer", "Issuer_Bank", 1e6, 0.02, 5.0);
        reference.systematic_factor = Some(loading);
        issuer.systematic_factor = Some(loading);
        let mut config = drc_config(100_000);
        config.retain_obligor_losses = true;
        let v = simulate_credit_losses(&[reference, issuer], &MatrixSelector::default(), &config)
            .unwrap();
        let a = v.obligor_path_losses(0).unwrap();
        let b = v.obligor_path_losses(1).unwrap();
        a.iter().zip(b).filter(|(x, y)| **x > 0.0 && **y > 0.0).count()
    };
    let independent = joint_defaults(0.0);
    let wrong_way = joint_defaults(0.95);
    assert!(wrong_way > 5 * independent.max(1));
}

// ===========================================================================
// Portfolio properties
// ===========================================================================

fn scaled(positions: &[Position], k: f64) -> Vec<Position> {
    positions
        .iter()
        .cloned()
        .map(|mut p| {
            p.notional *= k;
            p
        })
        .collect()
}

#[test]
fn test_scaling_notional_scales_capital() {
    let base = homogeneous_pool();
    let config = drc_config(50_000);
    let c1 = capital(&base, &config);
    assert!(c1 > 0.0);
    for k in [2.0, 3.0, 0.7] {
        let ck = capital(&scaled(&base, k), &config);
        assert_relative_eq!(ck, k * c1, max_relative = 1e-12);
    }
}

#[test]
fn test_scaling_notional_scales_migration_capital() {
    let base = vec![
        Position::rated("p1", "ACME", 10e6, "BBB", 5.0),
        Position::rated("p2", "Globex", 8e6, "BB", 3.0),
        short(Position::rated("p3", "Globex", 3e6, "BB", 2.0)),
        Position::rated("p4", "Initech", 6e6, "A", 7.0),
    ];
    let config = SimulationConfig::irc().with_seed(7).with_simulations(20_000);
    let c1 = capital(&base, &config);
    assert!(c1 > 0.0);
    let c3 = capital(&scaled(&base, 3.0), &config);
    assert_relative_eq!(c3, 3.0 * c1, max_relative = 1e-9);
}

#[test]
fn test_standalone_sum_exceeds_portfolio() {
    let positions = vec![
        Position::rated("p1", "HY_1", 10e6, "BB", 5.0),
        Position::rated("p2", "HY_2", 8e6, "B", 5.0),
        Position::rated("p3", "HY_3", 6e6, "BB", 5.0),
    ];
    let out = calculate_capital_by_issuer(&input(positions, 50_000), Framework::Drc).unwrap();
    let r = &out.result;
    assert!(r.sum_standalone >= r.capital.capital_charge);
    assert!(r.diversification_benefit >= Decimal::ZERO);
}

#[test]
fn test_contributions_ranked_by_marginal() {
    let positions = vec![
        Position::rated("long", "Risky", 10e6, "B", 5.0),
        Position::rated("long2", "Other", 4e6, "BB", 5.0),
    ];
    let out = calculate_capital_by_issuer(&input(positions, 50_000), Framework::Drc).unwrap();
    let r = &out.result;
    assert_eq!(r.issuer_contributions[0].obligor_id, "Risky");
    let total_pct: Decimal = r.issuer_contributions.iter().map(|c| c.pct_of_total).sum();
    assert!(total_pct <= dec!(100.01));
}

// ===========================================================================
// Reproducibility
// ===========================================================================

#[test]
fn test_same_seed_bit_identical() {
    let config = drc_config(30_000);
    let a = simulate_credit_losses(&homogeneous_pool(), &MatrixSelector::default(), &config)
        .unwrap();
    let b = simulate_credit_losses(&homogeneous_pool(), &MatrixSelector::default(), &config)
        .unwrap();
    assert_eq!(a.losses, b.losses);
}

#[test]
fn test_different_seed_differs() {
    let a = simulate_credit_losses(
        &homogeneous_pool(),
        &MatrixSelector::default(),
        &drc_config(30_000),
    )
    .unwrap();
    let b = simulate_credit_losses(
        &homogeneous_pool(),
        &MatrixSelector::default(),
        &drc_config(30_000).with_seed(43),
    )
    .unwrap();
    assert_ne!(a.losses, b.losses);
}

#[cfg(feature = "parallel")]
#[test]
fn test_thread_count_does_not_change_losses() {
    let run = |threads: usize| {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap();
        pool.install(|| {
            simulate_credit_losses(
                &homogeneous_pool(),
                &MatrixSelector::default(),
                &drc_config(20_000),
            )
            .unwrap()
        })
    };
    assert_eq!(run(1).losses, run(4).losses);
}

// ===========================================================================
// Envelope and comparison
// ===========================================================================

#[test]
fn test_drc_envelope() {
    let out = calculate_drc(&input(homogeneous_pool(), 20_000)).unwrap();
    let r = &out.result;
    assert_eq!(r.framework, Framework::Drc);
    assert_eq!(r.num_positions, 10);
    assert_eq!(r.total_notional, dec!(10000000));
    assert_eq!(r.rwa, r.capital_charge * dec!(12.5));
    assert!(out.methodology.contains("default only"));
}

#[test]
fn test_overflowing_portfolio_loss_is_an_error() {
    let positions: Vec<Position> = ["Giant_1", "Giant_2"]
        .iter()
        .map(|id| {
            let mut p = Position::with_pd(id, id, 1e308, 0.5, 5.0);
            p.lgd = Some(1.0);
            p
        })
        .collect();
    let config = SimulationConfig {
        factor_model: Some(FactorModel::SingleFactor { rho: 1.0 }),
        ..drc_config(10_000)
    };
    let err = simulate_credit_losses(&positions, &MatrixSelector::default(), &config).unwrap_err();
    assert!(matches!(err, CreditCapitalError::Numerical { .. }));
    assert!(calculate_drc(&input(positions, 10_000)).is_err());
}

#[test]
fn test_drc_ignores_migration() {
    // Downgrades cost nothing in default-only mode
    let positions = vec![Position::rated("a", "Safe", 5e6, "A", 1.0)];
    let vector = simulate_credit_losses(&positions, &MatrixSelector::default(), &drc_config(20_000))
        .unwrap();
    assert!(vector
        .losses
        .iter()
        .all(|l| *l == 0.0 || (*l - 0.45 * 5e6).abs() < 1e-6));
    assert_eq!(vector.mode, SimulationMode::DefaultOnly);
}

#[test]
fn test_compare_irc_vs_drc() {
    let positions = vec![
        Position::rated("p1", "ACME", 10e6, "BBB", 5.0),
        Position::rated("p2", "Globex", 8e6, "BB", 5.0),
        Position::rated("p3", "Initech", 6e6, "A", 5.0),
    ];
    let mut inp = input(positions, 50_000);
    inp.config.mode = SimulationMode::Migration;
    let out = compare_irc_vs_drc(&inp).unwrap();
    let r = &out.result;
    assert_eq!(r.irc.framework, Framework::Irc);
    assert_eq!(r.drc.framework, Framework::Drc);
    assert_eq!(r.irc.seed, 42);
    assert_eq!(r.drc.seed, 42);
    assert!(r.migration_component >= Decimal::ZERO);
    assert!(!r.commentary.is_empty());
}
