use super::Card;

/// Total of a hand together with whether an ace still counts as 11.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandValue {
    pub total: u8,
    pub is_soft: bool,
}

/// Ordered cards of one player or dealer hand.
///
/// The value is recomputed from the cards on every query, a hand rarely holds
/// more than a handful of cards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hand {
    cards: Vec<Card>,
}

impl Hand {
    pub fn new() -> Hand {
        Hand {
            cards: Vec::with_capacity(4),
        }
    }

    pub fn add_card(&mut self, card: Card) {
        self.cards.push(card);
    }

    pub fn clear(&mut self) {
        self.cards.clear();
    }

    /// Counts every ace as 11 first, then demotes aces to 1 one at a time while
    /// the total is over 21.
    pub fn value(&self) -> HandValue {
        let mut total: u8 = 0;
        let mut aces_as_eleven = 0;
        for card in &self.cards {
            if card.is_ace() {
                aces_as_eleven += 1;
                total += 11;
            } else {
                total += card.blackjack_value();
            }
        }

        while total > 21 && aces_as_eleven > 0 {
            total -= 10;
            aces_as_eleven -= 1;
        }

        HandValue {
            total,
            is_soft: aces_as_eleven > 0 && total <= 21,
        }
    }

    pub fn total(&self) -> u8 {
        self.value().total
    }

    pub fn is_soft(&self) -> bool {
        self.value().is_soft
    }

    pub fn is_bust(&self) -> bool {
        self.total() > 21
    }

    /// A natural: exactly two cards worth 21. A three-card 21 never counts.
    pub fn is_blackjack(&self) -> bool {
        self.cards.len() == 2 && self.total() == 21
    }

    /// Two cards of the same rank. A ten and a king do not form a pair.
    pub fn can_split(&self) -> bool {
        self.cards.len() == 2 && self.cards[0].face_value == self.cards[1].face_value
    }

    /// Detaches the second card of a pair. Returns None if the hand is not a pair.
    pub fn split(&mut self) -> Option<Card> {
        if !self.can_split() {
            return None;
        }
        self.cards.pop()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl std::fmt::Display for Hand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cards.is_empty() {
            return write!(f, "Empty hand");
        }
        write!(f, "[")?;
        for (i, card) in self.cards.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", card)?;
        }
        let value = self.value();
        write!(f, "] = {}", value.total)?;
        if value.is_soft {
            write!(f, " (soft)")?;
        }
        if self.is_blackjack() {
            write!(f, " BLACKJACK")?;
        } else if self.is_bust() {
            write!(f, " BUST")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::simulation::Suit;

    use super::*;

    fn hand_of(face_values: &[u8]) -> Hand {
        let mut hand = Hand::new();
        for &face_value in face_values {
            hand.add_card(Card::new(face_value, Suit::Spade));
        }
        hand
    }

    #[test]
    fn ace_arithmetic() {
        let hand = hand_of(&[1, 6]);
        assert_eq!(hand.value(), HandValue { total: 17, is_soft: true });

        let hand = hand_of(&[1, 6, 9]);
        assert_eq!(hand.value(), HandValue { total: 16, is_soft: false });

        let hand = hand_of(&[1, 1, 9]);
        assert_eq!(hand.value(), HandValue { total: 21, is_soft: true });

        let hand = hand_of(&[13, 12, 5]);
        assert_eq!(hand.total(), 25);
        assert!(hand.is_bust());
        assert!(!hand.is_soft());
    }

    #[test]
    fn bust_is_permanent() {
        let mut hand = hand_of(&[1, 6]);
        assert_eq!(hand.total(), 17);
        hand.add_card(Card::new(9, Suit::Heart));
        assert_eq!(hand.total(), 16);

        hand.add_card(Card::new(10, Suit::Heart));
        assert!(hand.is_bust());
        for face_value in [1, 1, 2, 13] {
            hand.add_card(Card::new(face_value, Suit::Heart));
            assert!(hand.is_bust());
        }
    }

    #[test]
    fn hard_total_never_decreases() {
        let mut hand = Hand::new();
        let mut last = 0;
        for face_value in [1, 9, 13, 1, 5, 1] {
            hand.add_card(Card::new(face_value, Suit::Heart));
            if !hand.is_soft() {
                assert!(hand.total() >= last);
                last = hand.total();
            }
        }
    }

    #[test]
    fn blackjack_needs_exactly_two_cards() {
        assert!(hand_of(&[1, 13]).is_blackjack());
        assert!(hand_of(&[10, 1]).is_blackjack());
        assert!(!hand_of(&[7, 7, 7]).is_blackjack());
        assert!(!hand_of(&[1, 5, 5]).is_blackjack());
        assert!(!hand_of(&[10, 9]).is_blackjack());
    }

    #[test]
    fn split_needs_equal_ranks() {
        assert!(hand_of(&[8, 8]).can_split());
        assert!(!hand_of(&[10, 13]).can_split());
        assert!(!hand_of(&[8, 8, 2]).can_split());

        let mut hand = hand_of(&[8, 8]);
        let detached = hand.split().unwrap();
        assert_eq!(detached.face_value, 8);
        assert_eq!(hand.len(), 1);
        assert!(hand_of(&[8, 9]).split().is_none());
    }
}
