use crate::credit_state::obligor::{ObligorBook, ObligorCreditState};

/// Credit state of every obligor for one path of shocks.
pub fn resolve_states(book: &ObligorBook, shocks: &[f64], states: &mut [ObligorCreditState]) {
    for ((state, obligor), &z) in states.iter_mut().zip(&book.obligors).zip(shocks) {
        *state = obligor.credit_state(z);
    }
}

/// Netted, floored loss of every obligor for one path of states.
pub fn obligor_losses(book: &ObligorBook, states: &[ObligorCreditState], losses: &mut [f64]) {
    for ((loss, obligor), &state) in losses.iter_mut().zip(&book.obligors).zip(states) {
        *loss = obligor.net_loss(state).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credit_state::matrix::MatrixSelector;
    use crate::credit_state::position::Position;
    use crate::credit_state::rating::Rating;
    use crate::simulation::config::SimulationConfig;

    fn book(config: &SimulationConfig) -> ObligorBook {
        let positions = vec![
            Position::rated("p1", "A", 1e6, "BBB", 5.0),
            Position::rated("p2", "B", 1e6, "BB", 5.0),
        ];
        let catalog = MatrixSelector::default().compile().unwrap();
        ObligorBook::build(&positions, &catalog, config).unwrap()
    }

    #[test]
    fn test_migration_states() {
        let b = book(&SimulationConfig::irc());
        let mut states = [ObligorCreditState::Survived; 2];
        resolve_states(&b, &[-9.0, 9.0], &mut states);
        assert_eq!(states[0], ObligorCreditState::Defaulted);
        assert_eq!(states[1], ObligorCreditState::Migrated(Rating::AAA));

        resolve_states(&b, &[0.0, 0.0], &mut states);
        assert_eq!(states[0], ObligorCreditState::Migrated(Rating::BBB));
        assert_eq!(states[1], ObligorCreditState::Migrated(Rating::BB));
    }

    #[test]
    fn test_default_only_states() {
        let b = book(&SimulationConfig::drc());
        let mut states = [ObligorCreditState::Survived; 2];
        resolve_states(&b, &[-9.0, 0.0], &mut states);
        assert_eq!(states, [ObligorCreditState::Defaulted, ObligorCreditState::Survived]);
    }

    #[test]
    fn test_upgrade_losses_floor_at_zero() {
        let b = book(&SimulationConfig::irc());
        let mut losses = [f64::NAN; 2];
        obligor_losses(
            &b,
            &[ObligorCreditState::Migrated(Rating::AAA), ObligorCreditState::Defaulted],
            &mut losses,
        );
        assert_eq!(losses[0], 0.0);
        assert!((losses[1] - 450_000.0).abs() < 1e-6);
    }
}
