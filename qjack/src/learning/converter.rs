use super::state::{Action, State};
use crate::simulation::{hand::Hand, BlackjackGame};
use crate::Outcome;

/// Glue between `BlackjackGame` observations and the learning types.
pub struct GameStateConverter;

impl GameStateConverter {
    /// Pass `game.can_split()` and `game.can_double_down()` as the flags so a
    /// post-split hand never encodes as splittable or doubleable.
    pub fn to_state(
        player_hand: &Hand,
        dealer_hand: &Hand,
        allow_split: bool,
        allow_double: bool,
    ) -> State {
        let value = player_hand.value();
        let dealer_up_card = dealer_hand
            .cards()
            .first()
            .map(|card| card.blackjack_value())
            .unwrap_or(0);
        State::with_flags(
            value.total,
            dealer_up_card,
            value.is_soft,
            allow_split && player_hand.can_split(),
            allow_double && player_hand.len() == 2,
        )
    }

    /// Observation of the acting hand in the current round.
    pub fn observe(game: &BlackjackGame) -> State {
        Self::to_state(
            game.player_hand(),
            game.dealer_hand(),
            game.can_split(),
            game.can_double_down(),
        )
    }

    pub fn valid_actions(
        player_hand: &Hand,
        allow_split: bool,
        allow_double: bool,
        allow_surrender: bool,
    ) -> Vec<Action> {
        let mut actions = Vec::with_capacity(5);
        actions.push(Action::Hit);
        actions.push(Action::Stand);
        if allow_double && player_hand.len() == 2 {
            actions.push(Action::Double);
        }
        if allow_split && player_hand.can_split() {
            actions.push(Action::Split);
        }
        if allow_surrender && player_hand.len() == 2 {
            actions.push(Action::Surrender);
        }
        actions
    }

    /// Legal actions for the acting hand in the current round.
    pub fn legal_actions(game: &BlackjackGame) -> Vec<Action> {
        Self::valid_actions(
            game.player_hand(),
            game.can_split(),
            game.can_double_down(),
            game.can_surrender(),
        )
    }

    /// Applies the action. A refused double falls back to a hit.
    pub fn execute_action(action: Action, game: &mut BlackjackGame) -> bool {
        match action {
            Action::Hit => game.hit(),
            Action::Stand => game.stand(),
            Action::Double => game.double_down() || game.hit(),
            Action::Split => game.split(),
            Action::Surrender => game.surrender(),
        }
    }

    /// Blackjack pays `blackjack_payout`, a win 1, a push 0, a loss -1 and a
    /// surrender -0.5. Doubled hands count twice.
    pub fn outcome_to_reward(outcome: Outcome, doubled: bool, blackjack_payout: f64) -> f64 {
        let reward = match outcome {
            Outcome::PlayerBlackjack => blackjack_payout,
            Outcome::PlayerWin | Outcome::DealerBust => 1.0,
            Outcome::Push => 0.0,
            Outcome::DealerWin | Outcome::PlayerBust => -1.0,
            Outcome::Surrender => -0.5,
        };
        if doubled {
            reward * 2.0
        } else {
            reward
        }
    }

    /// Net reward of a resolved round over all of its hands.
    pub fn round_reward(outcomes: &[Outcome], doubled: &[bool], blackjack_payout: f64) -> f64 {
        outcomes
            .iter()
            .enumerate()
            .map(|(i, &outcome)| {
                let doubled = doubled.get(i).copied().unwrap_or(false);
                Self::outcome_to_reward(outcome, doubled, blackjack_payout)
            })
            .sum()
    }
}
