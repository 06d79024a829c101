use crate::learning::state::{Action, State};

/// Player totals audited when grading a policy.
pub const AUDIT_TOTALS: std::ops::RangeInclusive<u8> = 4..=21;
/// Dealer up cards audited when grading a policy, ace as 1.
pub const AUDIT_DEALER_CARDS: std::ops::RangeInclusive<u8> = 1..=10;

const H: Action = Action::Hit;
const S: Action = Action::Stand;
const D: Action = Action::Double;
const R: Action = Action::Surrender;

/// Static basic-strategy oracle used to grade learned policies.
///
/// Columns are the dealer up card from ace to ten. Hard rows run from 8 or
/// less to 17 or more, soft rows from soft 13 to soft 21.
#[derive(Debug, Clone)]
pub struct BasicStrategy {
    hard_chart: [[Action; 10]; 10],
    soft_chart: [[Action; 10]; 9],
}

impl Default for BasicStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl BasicStrategy {
    pub fn new() -> BasicStrategy {
        BasicStrategy {
            hard_chart: [
                [H, H, H, H, H, H, H, H, H, H], // 8-
                [H, H, D, D, D, D, H, H, H, H], // 9
                [H, D, D, D, D, D, D, D, D, H],
                [D, D, D, D, D, D, D, D, D, D], // 11
                [H, H, H, S, S, S, H, H, H, H],
                [H, S, S, S, S, S, H, H, H, H],
                [H, S, S, S, S, S, H, H, H, H],
                [H, S, S, S, S, S, H, H, H, R], // 15
                [R, S, S, S, S, S, H, H, R, R],
                [S, S, S, S, S, S, S, S, S, S], // 17+
            ],
            soft_chart: [
                [H, H, H, H, H, H, H, H, H, H], // soft 13
                [H, H, H, H, H, H, H, H, H, H],
                [H, H, H, H, H, H, H, H, H, H],
                [H, H, H, H, H, H, H, H, H, H],
                [H, H, H, H, H, H, H, H, H, H],
                [H, S, S, S, S, S, S, S, H, H], // soft 18
                [S, S, S, S, S, S, S, S, S, S],
                [S, S, S, S, S, S, S, S, S, S],
                [S, S, S, S, S, S, S, S, S, S], // soft 21
            ],
        }
    }

    /// Recommended action. Positions outside the charts hit below 17 and
    /// stand otherwise.
    pub fn action(&self, state: &State) -> Action {
        let fallback = if state.player_total < 17 { H } else { S };
        if !(1..=10).contains(&state.dealer_up_card) {
            return fallback;
        }
        let col = (state.dealer_up_card - 1) as usize;

        if state.has_usable_ace {
            match state.player_total {
                13..=21 => self.soft_chart[(state.player_total - 13) as usize][col],
                _ => fallback,
            }
        } else {
            match state.player_total {
                4..=8 => self.hard_chart[0][col],
                9..=16 => self.hard_chart[(state.player_total - 8) as usize][col],
                17..=21 => self.hard_chart[9][col],
                _ => fallback,
            }
        }
    }

    /// A double recommendation is also satisfied by a hit.
    pub fn is_correct_action(&self, state: &State, action: Action) -> bool {
        let optimal = self.action(state);
        action == optimal || (optimal == Action::Double && action == Action::Hit)
    }
}

fn is_surrender_candidate(state: &State) -> bool {
    !state.has_usable_ace
        && ((state.player_total == 15 && state.dealer_up_card == 10)
            || (state.player_total == 16 && matches!(state.dealer_up_card, 1 | 9 | 10)))
}

/// Action set offered at an audited state: hit and stand always, double on
/// 9 to 11, surrender on hard 15 vs 10 and hard 16 vs 9, 10 or ace.
pub fn audit_actions(state: &State) -> Vec<Action> {
    let mut actions = vec![Action::Hit, Action::Stand];
    if (9..=11).contains(&state.player_total) {
        actions.push(Action::Double);
    }
    if is_surrender_candidate(state) {
        actions.push(Action::Surrender);
    }
    actions
}

/// Audited state at a total, up card and softness. States offering a first-two-cards
/// action are encoded with the double flag, as the game does for such hands.
pub fn audit_state(player_total: u8, dealer_up_card: u8, soft: bool) -> State {
    let mut state = State::new(player_total, dealer_up_card, soft);
    state.can_double = (9..=11).contains(&player_total) || is_surrender_candidate(&state);
    state
}

/// Every audited state: totals 4 to 21, up cards ace to ten, hard then soft.
pub fn audit_states() -> impl Iterator<Item = State> {
    AUDIT_TOTALS.flat_map(|total| {
        AUDIT_DEALER_CARDS.flat_map(move |dealer| {
            [false, true]
                .into_iter()
                .map(move |soft| audit_state(total, dealer, soft))
        })
    })
}

/// Best minus second-best value among `valid_actions`, 0 with fewer than two.
pub fn q_margin(values: &[f64], valid_actions: &[Action]) -> f64 {
    let mut top = f64::NEG_INFINITY;
    let mut second = f64::NEG_INFINITY;
    for action in valid_actions {
        let value = values[action.index()];
        if value > top {
            second = top;
            top = value;
        } else if value > second {
            second = value;
        }
    }
    if second == f64::NEG_INFINITY {
        0.0
    } else {
        top - second
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_chart_lookups() {
        let strategy = BasicStrategy::new();
        assert_eq!(strategy.action(&State::new(8, 6, false)), Action::Hit);
        assert_eq!(strategy.action(&State::new(9, 2, false)), Action::Hit);
        assert_eq!(strategy.action(&State::new(9, 3, false)), Action::Double);
        assert_eq!(strategy.action(&State::new(10, 10, false)), Action::Hit);
        assert_eq!(strategy.action(&State::new(11, 1, false)), Action::Double);
        assert_eq!(strategy.action(&State::new(12, 3, false)), Action::Hit);
        assert_eq!(strategy.action(&State::new(12, 4, false)), Action::Stand);
        assert_eq!(strategy.action(&State::new(14, 7, false)), Action::Hit);
        assert_eq!(strategy.action(&State::new(15, 10, false)), Action::Surrender);
        assert_eq!(strategy.action(&State::new(15, 9, false)), Action::Hit);
        assert_eq!(strategy.action(&State::new(16, 1, false)), Action::Surrender);
        assert_eq!(strategy.action(&State::new(17, 1, false)), Action::Stand);
        assert_eq!(strategy.action(&State::new(21, 10, false)), Action::Stand);
    }

    #[test]
    fn soft_chart_lookups() {
        let strategy = BasicStrategy::new();
        assert_eq!(strategy.action(&State::new(17, 6, true)), Action::Hit);
        assert_eq!(strategy.action(&State::new(18, 8, true)), Action::Stand);
        assert_eq!(strategy.action(&State::new(18, 9, true)), Action::Hit);
        assert_eq!(strategy.action(&State::new(18, 1, true)), Action::Hit);
        assert_eq!(strategy.action(&State::new(19, 1, true)), Action::Stand);
        assert_eq!(strategy.action(&State::new(12, 5, true)), Action::Hit);
    }

    #[test]
    fn hit_satisfies_double() {
        let strategy = BasicStrategy::new();
        let state = State::new(11, 6, false);
        assert_eq!(strategy.action(&state), Action::Double);
        assert!(strategy.is_correct_action(&state, Action::Hit));
        assert!(strategy.is_correct_action(&state, Action::Double));
        assert!(!strategy.is_correct_action(&state, Action::Stand));

        let state = State::new(16, 10, false);
        assert!(!strategy.is_correct_action(&state, Action::Hit));
    }

    #[test]
    fn audit_covers_every_combination_once() {
        let states: Vec<State> = audit_states().collect();
        assert_eq!(states.len(), 18 * 10 * 2);
        assert!(states.iter().all(State::is_valid));
        let unique: std::collections::HashSet<usize> = states.iter().map(State::index).collect();
        assert_eq!(unique.len(), states.len());
    }

    #[test]
    fn audit_action_sets() {
        assert_eq!(
            audit_actions(&State::new(13, 4, false)),
            vec![Action::Hit, Action::Stand]
        );
        assert_eq!(
            audit_actions(&State::new(10, 4, true)),
            vec![Action::Hit, Action::Stand, Action::Double]
        );
        assert_eq!(
            audit_actions(&State::new(16, 1, false)),
            vec![Action::Hit, Action::Stand, Action::Surrender]
        );
        assert_eq!(
            audit_actions(&State::new(16, 1, true)),
            vec![Action::Hit, Action::Stand]
        );
        assert!(audit_state(15, 10, false).can_double);
        assert!(!audit_state(15, 9, false).can_double);
    }

    #[test]
    fn margin_between_top_two() {
        let values = [0.5, -0.25, 0.1, 9.0, 0.0];
        let margin = q_margin(&values, &[Action::Hit, Action::Stand, Action::Double]);
        assert!((margin - 0.4).abs() < 1e-12);
        assert_eq!(q_margin(&values, &[Action::Hit]), 0.0);
        assert_eq!(q_margin(&values, &[]), 0.0);
    }
}
