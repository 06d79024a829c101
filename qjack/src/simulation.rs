pub mod deck;
pub mod hand;

use crate::{GameRules, Outcome, Result};
use log::{debug, warn};
use qjack_macros::allowed_phase;
use strum_macros::EnumIter;

use self::{deck::Deck, hand::Hand};

static FACE_VALUE_TO_BLACKJACK_VALUE: [u8; 13] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 10, 10, 10];

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Suit {
    Diamond = 0,
    Club,
    Heart,
    Spade,
}

/// Represents a card in the real world with a suit and a face value (1 for A, 13 for K).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Card {
    pub face_value: u8,
    pub suit: Suit,
}

impl Card {
    pub fn new(face_value: u8, suit: Suit) -> Self {
        Card { face_value, suit }
    }

    /// Face cards count 10, an ace counts 1 here (soft totals are resolved by `Hand`).
    pub fn blackjack_value(&self) -> u8 {
        FACE_VALUE_TO_BLACKJACK_VALUE[(self.face_value - 1) as usize]
    }

    pub fn is_ace(&self) -> bool {
        self.face_value == 1
    }
}

impl Default for Card {
    fn default() -> Self {
        Card {
            face_value: 1,
            suit: Suit::Diamond,
        }
    }
}

impl std::fmt::Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let suit = match self.suit {
            Suit::Diamond => 'D',
            Suit::Club => 'C',
            Suit::Heart => 'H',
            Suit::Spade => 'S',
        };
        let value = match self.face_value {
            1 => 'A',
            2 => '2',
            3 => '3',
            4 => '4',
            5 => '5',
            6 => '6',
            7 => '7',
            8 => '8',
            9 => '9',
            10 => 'T',
            11 => 'J',
            12 => 'Q',
            13 => 'K',
            _ => '?',
        };
        write!(f, "{}{}", value, suit)
    }
}

impl From<Card> for u8 {
    fn from(card: Card) -> u8 {
        card.suit as u8 * 13 + card.face_value - 1
    }
}

impl TryFrom<u8> for Card {
    type Error = ();

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        let suit = match value / 13 {
            0 => Suit::Diamond,
            1 => Suit::Club,
            2 => Suit::Heart,
            3 => Suit::Spade,
            _ => return Err(()),
        };
        Ok(Card {
            suit,
            face_value: value % 13 + 1,
        })
    }
}

/// `Idle` before the first round (and after `reset`), `PlayerActing` while the
/// player owes a decision on one of the hands, `Resolved` once every hand is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Idle,
    PlayerActing,
    Resolved,
}

/// Single player against the dealer. At most one split per round, no double
/// after split, late surrender on the first two cards when the rules allow it.
pub struct BlackjackGame {
    rules: GameRules,
    deck: Deck,

    // Round state
    phase: GamePhase,
    player_hands: Vec<Hand>,
    doubled: Vec<bool>,
    current_hand_index: usize,
    split_used: bool,
    dealer_hand: Hand,
    outcomes: Vec<Outcome>,
}

impl BlackjackGame {
    pub fn new(rules: &GameRules) -> Result<Self> {
        rules.validate()?;
        Ok(Self::with_deck(rules, Deck::new(rules.num_decks)))
    }

    pub fn with_seed(rules: &GameRules, seed: u64) -> Result<Self> {
        rules.validate()?;
        Ok(Self::with_deck(rules, Deck::with_seed(rules.num_decks, seed)))
    }

    fn with_deck(rules: &GameRules, deck: Deck) -> Self {
        BlackjackGame {
            rules: *rules,
            deck,
            phase: GamePhase::Idle,
            player_hands: vec![Hand::new()],
            doubled: vec![false],
            current_hand_index: 0,
            split_used: false,
            dealer_hand: Hand::new(),
            outcomes: Vec::new(),
        }
    }

    /// Reshuffles if the shoe crossed the penetration threshold, then deals two
    /// cards each (player, dealer up card, player, dealer hole card). A natural
    /// on either side resolves the round at once.
    pub fn start_round(&mut self) {
        if self.deck.needs_reshuffle(self.rules.penetration) {
            debug!("reshuffling shoe of {} cards", self.deck.total_cards());
            self.deck.reset();
        }

        self.clear_round();
        for _ in 0..2 {
            let card = self.draw();
            self.player_hands[0].add_card(card);
            let card = self.draw();
            self.dealer_hand.add_card(card);
        }
        self.phase = GamePhase::PlayerActing;

        if self.player_hands[0].is_blackjack() || self.dealer_hand.is_blackjack() {
            self.outcomes = vec![self.determine_outcome(&self.player_hands[0])];
            self.phase = GamePhase::Resolved;
        }
    }

    /// Places the given face values on top of a freshly shuffled shoe, so the
    /// next `start_round` deals them in order. Panics if the shoe cannot supply them.
    pub fn stack_deck(&mut self, firsts: &[u8]) {
        self.deck.stack_with_firsts(firsts);
    }

    /// Deals one card to the acting hand. A bust moves on to the next hand or
    /// resolves the round.
    #[allowed_phase(PlayerActing)]
    pub fn hit(&mut self) -> bool {
        let card = self.draw();
        let hand = &mut self.player_hands[self.current_hand_index];
        hand.add_card(card);
        if hand.is_bust() {
            self.move_to_next_hand();
        }
        true
    }

    #[allowed_phase(PlayerActing)]
    pub fn stand(&mut self) -> bool {
        self.move_to_next_hand();
        true
    }

    /// Deals exactly one card, then the hand is finished whether it busted or not.
    #[allowed_phase(PlayerActing)]
    pub fn double_down(&mut self) -> bool {
        if !self.can_double_down() {
            return false;
        }
        self.doubled[self.current_hand_index] = true;
        let card = self.draw();
        self.player_hands[self.current_hand_index].add_card(card);
        self.move_to_next_hand();
        true
    }

    /// Splits the initial pair into two hands and deals one card to each. The
    /// first hand acts first.
    #[allowed_phase(PlayerActing)]
    pub fn split(&mut self) -> bool {
        if !self.can_split() {
            return false;
        }
        let second_card = match self.player_hands[0].split() {
            Some(card) => card,
            None => return false,
        };

        let mut second_hand = Hand::new();
        second_hand.add_card(second_card);
        let card = self.draw();
        second_hand.add_card(card);
        let card = self.draw();
        self.player_hands[0].add_card(card);

        self.player_hands.push(second_hand);
        self.doubled.push(false);
        self.split_used = true;
        self.current_hand_index = 0;
        true
    }

    /// Gives up half the bet. The dealer does not play.
    #[allowed_phase(PlayerActing)]
    pub fn surrender(&mut self) -> bool {
        if !self.can_surrender() {
            return false;
        }
        self.outcomes = vec![Outcome::Surrender];
        self.phase = GamePhase::Resolved;
        true
    }

    pub fn can_double_down(&self) -> bool {
        self.phase == GamePhase::PlayerActing
            && !self.split_used
            && self.player_hands[self.current_hand_index].len() == 2
    }

    pub fn can_split(&self) -> bool {
        self.phase == GamePhase::PlayerActing
            && !self.split_used
            && self.player_hands.len() == 1
            && self.player_hands[0].can_split()
    }

    pub fn can_surrender(&self) -> bool {
        self.phase == GamePhase::PlayerActing
            && self.rules.surrender
            && self.player_hands.len() == 1
            && self.player_hands[0].len() == 2
    }

    /// Outcome of the first hand.
    #[allowed_phase(Resolved)]
    pub fn outcome(&self) -> Result<Outcome> {
        Ok(self.outcomes[0])
    }

    /// One outcome per player hand, in hand order.
    #[allowed_phase(Resolved)]
    pub fn outcomes(&self) -> Result<&[Outcome]> {
        Ok(&self.outcomes)
    }

    pub fn is_round_complete(&self) -> bool {
        self.phase == GamePhase::Resolved
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// The acting hand, or the last hand played once the round is over.
    pub fn player_hand(&self) -> &Hand {
        &self.player_hands[self.current_hand_index]
    }

    pub fn player_hands(&self) -> &[Hand] {
        &self.player_hands
    }

    pub fn current_hand_index(&self) -> usize {
        self.current_hand_index
    }

    pub fn dealer_hand(&self) -> &Hand {
        &self.dealer_hand
    }

    /// The dealer hand as the player sees it: only the up card while
    /// `hide_hole_card` is set.
    pub fn dealer_hand_view(&self, hide_hole_card: bool) -> Hand {
        if hide_hole_card && self.dealer_hand.len() >= 2 {
            let mut visible = Hand::new();
            visible.add_card(self.dealer_hand.cards()[0]);
            return visible;
        }
        self.dealer_hand.clone()
    }

    pub fn dealer_up_card(&self) -> Option<Card> {
        self.dealer_hand.cards().first().copied()
    }

    pub fn was_doubled(&self) -> &[bool] {
        &self.doubled
    }

    pub fn split_used(&self) -> bool {
        self.split_used
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    /// Fresh shoe and an empty table.
    pub fn reset(&mut self) {
        self.deck.reset();
        self.clear_round();
        self.phase = GamePhase::Idle;
    }

    fn clear_round(&mut self) {
        self.player_hands.clear();
        self.player_hands.push(Hand::new());
        self.doubled.clear();
        self.doubled.push(false);
        self.dealer_hand.clear();
        self.current_hand_index = 0;
        self.split_used = false;
        self.outcomes.clear();
    }

    /// Move on to the next hand. If no more hand, the dealer plays and every
    /// hand is scored.
    fn move_to_next_hand(&mut self) {
        if self.current_hand_index + 1 < self.player_hands.len() {
            self.current_hand_index += 1;
        } else {
            self.resolve_round();
        }
    }

    fn resolve_round(&mut self) {
        self.play_dealer_hand();
        self.outcomes = self
            .player_hands
            .iter()
            .map(|hand| self.determine_outcome(hand))
            .collect();
        self.phase = GamePhase::Resolved;
    }

    /// Dealer hits below 17, and on soft 17 when the rules say so.
    fn play_dealer_hand(&mut self) {
        loop {
            let value = self.dealer_hand.value();
            let must_hit = value.total < 17
                || (value.total == 17 && value.is_soft && self.rules.dealer_hits_soft17);
            if !must_hit {
                break;
            }

            let card = self.draw();
            self.dealer_hand.add_card(card);
            if self.dealer_hand.is_bust() {
                break;
            }
        }
    }

    /// A two-card 21 made after a split is an ordinary 21, not a natural.
    fn determine_outcome(&self, player_hand: &Hand) -> Outcome {
        let player_blackjack = !self.split_used && player_hand.is_blackjack();
        let dealer_blackjack = self.dealer_hand.is_blackjack();

        if player_blackjack && dealer_blackjack {
            return Outcome::Push;
        }
        if player_blackjack {
            return Outcome::PlayerBlackjack;
        }
        if dealer_blackjack {
            return Outcome::DealerWin;
        }

        let player_total = player_hand.total();
        let dealer_total = self.dealer_hand.total();
        if player_total > 21 {
            return Outcome::PlayerBust;
        }
        if dealer_total > 21 {
            return Outcome::DealerBust;
        }

        match player_total.cmp(&dealer_total) {
            std::cmp::Ordering::Greater => Outcome::PlayerWin,
            std::cmp::Ordering::Less => Outcome::DealerWin,
            std::cmp::Ordering::Equal => Outcome::Push,
        }
    }

    /// An exhausted shoe is replaced by a fresh one, even mid-round.
    fn draw(&mut self) -> Card {
        loop {
            if let Some(card) = self.deck.deal() {
                return card;
            }
            warn!(
                "shoe of {} cards exhausted mid-round, shuffling a fresh shoe",
                self.deck.total_cards()
            );
            self.deck.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn get_typical_rules() -> GameRules {
        GameRules {
            num_decks: 1,
            dealer_hits_soft17: false,
            surrender: true,
            penetration: 0.9,
            ..Default::default()
        }
    }

    /// Deal order is player, dealer up, player, dealer hole, then draws.
    fn stacked_game(rules: &GameRules, firsts: &[u8]) -> BlackjackGame {
        let mut game = BlackjackGame::with_seed(rules, 11).unwrap();
        game.stack_deck(firsts);
        game.start_round();
        game
    }

    #[test]
    fn test_allowed_phase() {
        let rules = get_typical_rules();
        let mut game = BlackjackGame::with_seed(&rules, 1).unwrap();
        assert_eq!(game.phase(), GamePhase::Idle);
        assert!(!game.hit());
        assert!(!game.stand());
        assert!(matches!(
            game.outcome(),
            Err(Error::NotReady {
                operation: "outcome",
                phase: GamePhase::Idle
            })
        ));
    }

    #[test]
    fn zero_decks_fail_construction() {
        let rules = GameRules {
            num_decks: 0,
            ..Default::default()
        };
        assert!(BlackjackGame::new(&rules).is_err());
    }

    #[test]
    fn start_round_deals_two_cards_each() {
        let game = stacked_game(&get_typical_rules(), &[5, 10, 6, 7]);
        assert_eq!(game.player_hand().total(), 11);
        assert_eq!(game.dealer_hand().total(), 17);
        assert_eq!(game.dealer_up_card().unwrap().face_value, 10);
        assert_eq!(game.dealer_hand_view(true).len(), 1);
        assert_eq!(game.dealer_hand_view(false).len(), 2);
        assert_eq!(game.phase(), GamePhase::PlayerActing);
    }

    #[test]
    fn outcome_before_resolution_is_not_ready() {
        let game = stacked_game(&get_typical_rules(), &[5, 10, 6, 7]);
        assert!(matches!(game.outcome(), Err(Error::NotReady { .. })));
        assert!(game.outcomes().is_err());
    }

    #[test]
    fn naturals_resolve_immediately() {
        let rules = get_typical_rules();

        let game = stacked_game(&rules, &[1, 9, 13, 7]);
        assert!(game.is_round_complete());
        assert_eq!(game.outcome().unwrap(), Outcome::PlayerBlackjack);

        let game = stacked_game(&rules, &[9, 1, 7, 13]);
        assert!(game.is_round_complete());
        assert_eq!(game.outcome().unwrap(), Outcome::DealerWin);
        assert_eq!(game.dealer_hand().len(), 2);

        let game = stacked_game(&rules, &[1, 1, 13, 12]);
        assert_eq!(game.outcome().unwrap(), Outcome::Push);
    }

    #[test]
    fn stand_plays_dealer_and_scores() {
        let rules = get_typical_rules();

        let mut game = stacked_game(&rules, &[10, 10, 9, 6, 5]);
        assert!(game.stand());
        assert!(game.is_round_complete());
        assert_eq!(game.dealer_hand().total(), 21);
        assert_eq!(game.outcome().unwrap(), Outcome::DealerWin);

        let mut game = stacked_game(&rules, &[10, 10, 9, 6, 13]);
        game.stand();
        assert_eq!(game.outcome().unwrap(), Outcome::DealerBust);

        let mut game = stacked_game(&rules, &[10, 10, 10, 8]);
        game.stand();
        assert_eq!(game.outcome().unwrap(), Outcome::PlayerWin);
        assert_eq!(game.dealer_hand().len(), 2);
    }

    #[test]
    fn actions_fail_once_round_is_complete() {
        let mut game = stacked_game(&get_typical_rules(), &[10, 10, 10, 8]);
        assert!(game.stand());
        assert!(!game.hit());
        assert!(!game.stand());
        assert!(!game.double_down());
        assert!(!game.split());
        assert!(!game.surrender());
    }

    #[test]
    fn hit_bust_resolves_round() {
        let mut game = stacked_game(&get_typical_rules(), &[10, 10, 6, 7, 13]);
        assert!(game.hit());
        assert!(game.is_round_complete());
        assert_eq!(game.outcome().unwrap(), Outcome::PlayerBust);
    }

    #[test]
    fn dealer_soft17_rule() {
        let mut rules = get_typical_rules();

        let mut game = stacked_game(&rules, &[10, 1, 9, 6, 2]);
        game.stand();
        assert_eq!(game.dealer_hand().total(), 17);
        assert_eq!(game.outcome().unwrap(), Outcome::PlayerWin);

        rules.dealer_hits_soft17 = true;
        let mut game = stacked_game(&rules, &[10, 1, 9, 6, 2]);
        game.stand();
        assert_eq!(game.dealer_hand().total(), 19);
        assert_eq!(game.outcome().unwrap(), Outcome::Push);
    }

    #[test]
    fn double_down_only_on_first_two_cards() {
        let mut game = stacked_game(&get_typical_rules(), &[5, 10, 6, 7, 2, 3]);
        assert!(game.can_double_down());
        assert!(game.hit());
        assert!(!game.can_double_down());
        assert!(!game.double_down());
        assert!(!game.is_round_complete());
    }

    #[test]
    fn double_down_finishes_hand_even_on_bust() {
        let mut game = stacked_game(&get_typical_rules(), &[10, 10, 6, 7, 13]);
        assert!(game.double_down());
        assert!(game.is_round_complete());
        assert_eq!(game.player_hand().len(), 3);
        assert_eq!(game.outcome().unwrap(), Outcome::PlayerBust);
        assert_eq!(game.was_doubled(), &[true]);

        let mut game = stacked_game(&get_typical_rules(), &[5, 10, 6, 7, 9]);
        assert!(game.double_down());
        assert!(game.is_round_complete());
        assert_eq!(game.player_hand().total(), 20);
        assert_eq!(game.outcome().unwrap(), Outcome::PlayerWin);
    }

    #[test]
    fn split_only_once_and_no_double_after() {
        let mut game = stacked_game(&get_typical_rules(), &[8, 10, 8, 7, 3, 2]);
        assert!(game.can_split());
        assert!(game.split());
        assert_eq!(game.player_hands().len(), 2);
        assert_eq!(game.current_hand_index(), 0);
        assert_eq!(game.player_hands()[0].total(), 10);
        assert_eq!(game.player_hands()[1].total(), 11);

        assert!(!game.split());
        assert!(!game.can_double_down());
        assert!(!game.double_down());
        assert!(!game.surrender());
    }

    #[test]
    fn bust_after_split_moves_to_next_hand() {
        let mut game = stacked_game(&get_typical_rules(), &[10, 10, 10, 7, 5, 4, 13]);
        assert!(game.split());
        assert_eq!(game.player_hands()[0].total(), 14);
        assert_eq!(game.player_hands()[1].total(), 15);

        assert!(game.hit());
        assert!(!game.is_round_complete());
        assert_eq!(game.current_hand_index(), 1);

        assert!(game.stand());
        assert!(game.is_round_complete());
        assert_eq!(
            game.outcomes().unwrap(),
            &[Outcome::PlayerBust, Outcome::DealerWin]
        );
    }

    #[test]
    fn twenty_one_after_split_is_not_a_natural() {
        let mut game = stacked_game(&get_typical_rules(), &[1, 10, 1, 8, 9, 13]);
        assert!(game.split());
        assert_eq!(game.player_hands()[0].total(), 21);
        assert!(game.stand());
        assert!(game.stand());
        assert_eq!(game.outcomes().unwrap()[0], Outcome::PlayerWin);
    }

    #[test]
    fn surrender_rules() {
        let rules = get_typical_rules();
        let mut game = stacked_game(&rules, &[10, 10, 6, 7]);
        assert!(game.can_surrender());
        assert!(game.surrender());
        assert_eq!(game.outcome().unwrap(), Outcome::Surrender);
        assert_eq!(game.dealer_hand().len(), 2);

        let mut game = stacked_game(&rules, &[5, 10, 6, 7, 2]);
        assert!(game.hit());
        assert!(!game.surrender());

        let no_surrender = GameRules {
            surrender: false,
            ..rules
        };
        let mut game = stacked_game(&no_surrender, &[10, 10, 6, 7]);
        assert!(!game.surrender());
    }

    #[test]
    fn many_rounds_keep_outcomes_per_hand() {
        let rules = GameRules {
            num_decks: 2,
            ..Default::default()
        };
        let mut game = BlackjackGame::with_seed(&rules, 5).unwrap();
        for round in 0..2000 {
            game.start_round();
            if game.can_split() && round % 2 == 0 {
                assert!(game.split());
            }
            while !game.is_round_complete() {
                if game.player_hand().total() < 15 {
                    game.hit();
                } else {
                    game.stand();
                }
            }
            assert_eq!(
                game.outcomes().unwrap().len(),
                game.player_hands().len()
            );
        }
    }

    #[test]
    fn start_round_reshuffles_past_penetration() {
        let rules = GameRules {
            num_decks: 1,
            penetration: 0.5,
            ..Default::default()
        };
        let mut game = BlackjackGame::with_seed(&rules, 9).unwrap();
        game.start_round();
        assert_eq!(game.deck.cards_remaining(), 48);

        // 22 dealt is still below the threshold of 26.
        while game.deck.cards_remaining() > 30 {
            game.deck.deal();
        }
        game.start_round();
        assert_eq!(game.deck.cards_remaining(), 26);

        game.start_round();
        assert_eq!(game.deck.cards_remaining(), 48);
        assert_eq!(game.deck.total_cards(), 52);
    }

    #[test]
    fn reset_clears_table() {
        let mut game = stacked_game(&get_typical_rules(), &[5, 10, 6, 7]);
        game.reset();
        assert_eq!(game.phase(), GamePhase::Idle);
        assert!(game.player_hand().is_empty());
        assert!(game.dealer_hand().is_empty());
        game.start_round();
        assert_eq!(game.player_hand().len(), 2);
    }

    #[test]
    fn exhausted_shoe_is_refilled_mid_round() {
        let rules = GameRules {
            num_decks: 1,
            penetration: 1.0,
            ..Default::default()
        };
        let mut game = BlackjackGame::with_seed(&rules, 3).unwrap();
        for _ in 0..50 {
            game.deck.deal();
        }
        game.start_round();
        assert_eq!(game.player_hands()[0].len(), 2);
        assert_eq!(game.dealer_hand().len(), 2);
        assert_eq!(game.deck.cards_remaining(), 50);
    }
}
