use super::{Card, Suit};

use strum::IntoEnumIterator;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// A multi-deck shoe with a dealing cursor.
#[derive(Debug, Clone)]
pub struct Deck {
    number_of_decks: u8,
    cards: Vec<Card>,
    current_index: usize,
    rng: StdRng,
}

impl Deck {
    /// Creates a shuffled shoe of `52 * number_of_decks` cards.
    pub fn new(number_of_decks: u8) -> Deck {
        Self::with_rng(number_of_decks, StdRng::from_entropy())
    }

    pub fn with_seed(number_of_decks: u8, seed: u64) -> Deck {
        Self::with_rng(number_of_decks, StdRng::seed_from_u64(seed))
    }

    fn with_rng(number_of_decks: u8, rng: StdRng) -> Deck {
        let mut deck = Deck {
            number_of_decks,
            cards: Vec::with_capacity(number_of_decks as usize * 52),
            current_index: 0,
            rng,
        };
        deck.reset();
        deck
    }

    /// Regenerates every card of the shoe and shuffles it fully.
    pub fn reset(&mut self) {
        self.cards.clear();
        for _ in 0..self.number_of_decks {
            for suit in Suit::iter() {
                for face_value in 1..=13 {
                    self.cards.push(Card { face_value, suit });
                }
            }
        }
        self.shuffle();
    }

    /// Fisher-Yates shuffle of the whole shoe. Also rewinds the cursor.
    pub fn shuffle(&mut self) {
        self.cards.shuffle(&mut self.rng);
        self.current_index = 0;
    }

    /// Regenerates the shoe, and shuffles. This method makes sure the given first few
    /// ranks will be at the frontmost positions of the shoe. Panics if requirement
    /// cannot be met.
    /// Note that the cards are given in face values (i.e., 1 stands for A, 11 for J).
    pub fn stack_with_firsts(&mut self, firsts: &[u8]) {
        let mut counts = [self.number_of_decks; 52];
        let mut stacked = Vec::with_capacity(firsts.len());
        for &face_value in firsts {
            let card_integer = find_suitable_card(&counts, face_value)
                .expect("The given first cards are invalid");
            counts[card_integer as usize] -= 1;
            stacked.push(Card::try_from(card_integer).expect("index below 52"));
        }

        let mut rest = Vec::with_capacity(self.cards.len() - stacked.len());
        for card_integer in 0..52u8 {
            if let Ok(card) = Card::try_from(card_integer) {
                for _ in 0..counts[card_integer as usize] {
                    rest.push(card);
                }
            }
        }
        rest.shuffle(&mut self.rng);

        stacked.extend(rest);
        self.cards = stacked;
        self.current_index = 0;
    }

    /// Deals a card if the shoe is not empty. Returns None if empty.
    pub fn deal(&mut self) -> Option<Card> {
        let card = self.cards.get(self.current_index).copied()?;
        self.current_index += 1;
        Some(card)
    }

    /// True once the cursor has passed `size * penetration` cards.
    pub fn needs_reshuffle(&self, penetration: f64) -> bool {
        let threshold = (self.cards.len() as f64 * penetration) as usize;
        self.current_index >= threshold
    }

    pub fn cards_remaining(&self) -> usize {
        self.cards.len() - self.current_index
    }

    pub fn total_cards(&self) -> usize {
        self.cards.len()
    }
}

fn find_suitable_card(counts: &[u8; 52], face_value: u8) -> Result<u8, ()> {
    if face_value == 0 || face_value > 13 {
        return Err(());
    }
    for suit in Suit::iter() {
        let card: u8 = Card { face_value, suit }.into();
        if counts[card as usize] > 0 {
            return Ok(card);
        }
    }
    Err(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number_of_cards_is_correct(deck: &Deck) -> bool {
        let mut counts = [0 as u8; 52];
        for card in &deck.cards {
            let card_integer: u8 = (*card).into();
            counts[card_integer as usize] += 1;
        }
        counts.iter().all(|&count| count == deck.number_of_decks)
    }

    #[test]
    fn new_deck_has_every_card_per_deck() {
        let deck = Deck::with_seed(3, 7);
        assert_eq!(deck.total_cards(), 3 * 52);
        assert!(number_of_cards_is_correct(&deck));
    }

    #[test]
    fn same_seed_same_order() {
        let a = Deck::with_seed(2, 42);
        let b = Deck::with_seed(2, 42);
        assert_eq!(a.cards, b.cards);
    }

    #[test]
    fn test_stack_with_firsts() {
        let mut deck = Deck::with_seed(1, 1);
        let firsts = vec![1, 2, 6, 6, 9, 13];
        deck.stack_with_firsts(&firsts);
        assert!(number_of_cards_is_correct(&deck));
        for face_value in &firsts {
            assert_eq!(deck.deal().unwrap().face_value, *face_value);
        }
    }

    #[test]
    #[should_panic]
    fn invalid_firsts_should_panic() {
        let mut deck = Deck::with_seed(1, 1);
        deck.stack_with_firsts(&[6, 6, 6, 6, 6]);
    }

    #[test]
    fn needs_reshuffle_after_penetration() {
        let mut deck = Deck::with_seed(1, 3);
        assert!(!deck.needs_reshuffle(0.5));
        for _ in 0..25 {
            deck.deal();
        }
        assert!(!deck.needs_reshuffle(0.5));
        deck.deal();
        assert!(deck.needs_reshuffle(0.5));

        deck.reset();
        assert!(!deck.needs_reshuffle(0.5));
        assert_eq!(deck.cards_remaining(), 52);
    }

    #[test]
    fn empty_deck_deals_nothing() {
        let mut deck = Deck::with_seed(1, 9);
        for _ in 0..52 {
            assert!(deck.deal().is_some());
        }
        assert!(deck.deal().is_none());
        assert_eq!(deck.cards_remaining(), 0);
    }
}
