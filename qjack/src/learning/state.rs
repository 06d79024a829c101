use serde_enum_str::{Deserialize_enum_str, Serialize_enum_str};
use strum_macros::EnumIter;

pub const NUM_ACTIONS: usize = 5;

/// Number of distinct packed indices: 5 + 4 + 1 + 1 + 1 bits.
pub const STATE_SPACE_SIZE: usize = 1 << 12;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize_enum_str, Deserialize_enum_str,
)]
pub enum Action {
    #[serde(rename = "HIT")]
    Hit,
    #[serde(rename = "STAND")]
    Stand,
    #[serde(rename = "DOUBLE")]
    Double,
    #[serde(rename = "SPLIT")]
    Split,
    #[serde(rename = "SURRENDER")]
    Surrender,
}

impl Action {
    pub const ALL: [Action; NUM_ACTIONS] = [
        Action::Hit,
        Action::Stand,
        Action::Double,
        Action::Split,
        Action::Surrender,
    ];

    /// Slot of this action inside a value vector.
    pub fn index(self) -> usize {
        self as usize
    }

    /// One-letter chart symbol.
    pub fn symbol(self) -> char {
        match self {
            Action::Hit => 'H',
            Action::Stand => 'S',
            Action::Double => 'D',
            Action::Split => 'P',
            Action::Surrender => 'R',
        }
    }
}

/// Discretized decision point.
///
/// `player_total` is 4..=21 for any state an agent acts in (bust totals show up
/// only as terminal next states), `dealer_up_card` is 1..=10 with the ace as 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct State {
    pub player_total: u8,
    pub dealer_up_card: u8,
    pub has_usable_ace: bool,
    pub can_split: bool,
    pub can_double: bool,
}

impl State {
    pub fn new(player_total: u8, dealer_up_card: u8, has_usable_ace: bool) -> Self {
        State {
            player_total,
            dealer_up_card,
            has_usable_ace,
            can_split: false,
            can_double: false,
        }
    }

    pub fn with_flags(
        player_total: u8,
        dealer_up_card: u8,
        has_usable_ace: bool,
        can_split: bool,
        can_double: bool,
    ) -> Self {
        State {
            player_total,
            dealer_up_card,
            has_usable_ace,
            can_split,
            can_double,
        }
    }

    /// Packs the state into 12 bits: total in bits 0-4, up card in 5-8, then
    /// usable ace, split and double in bits 9, 10, 11.
    pub fn index(&self) -> usize {
        let mut index = (self.player_total as usize) & 0x1F;
        index |= ((self.dealer_up_card as usize) & 0x0F) << 5;
        index |= (self.has_usable_ace as usize) << 9;
        index |= (self.can_split as usize) << 10;
        index |= (self.can_double as usize) << 11;
        index
    }

    /// Inverse of `index` for every index below `STATE_SPACE_SIZE`.
    pub fn from_index(index: usize) -> Self {
        State {
            player_total: (index & 0x1F) as u8,
            dealer_up_card: ((index >> 5) & 0x0F) as u8,
            has_usable_ace: (index >> 9) & 1 == 1,
            can_split: (index >> 10) & 1 == 1,
            can_double: (index >> 11) & 1 == 1,
        }
    }

    pub fn is_valid(&self) -> bool {
        (4..=21).contains(&self.player_total) && (1..=10).contains(&self.dealer_up_card)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.has_usable_ace { "soft" } else { "hard" };
        let dealer = match self.dealer_up_card {
            1 => String::from("A"),
            card => card.to_string(),
        };
        write!(f, "{} {} vs {}", kind, self.player_total, dealer)?;
        if self.can_split {
            write!(f, " [split]")?;
        }
        if self.can_double {
            write!(f, " [double]")?;
        }
        Ok(())
    }
}

/// One step of an episode. `valid_next_actions` is empty when `done`.
#[derive(Debug, Clone, PartialEq)]
pub struct Experience {
    pub state: State,
    pub action: Action,
    pub reward: f64,
    pub next_state: State,
    pub done: bool,
    pub valid_next_actions: Vec<Action>,
}
