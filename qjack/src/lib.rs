pub mod error;
pub mod evaluation;
pub mod learning;
pub mod simulation;
pub mod strategy;
pub mod training;

use serde_enum_str::{Deserialize_enum_str, Serialize_enum_str};

pub use error::Error;
pub use learning::{
    agent::{Agent, Hyperparameters, QLearningAgent},
    converter::GameStateConverter,
    policy_table::PolicyTable,
    state::{Action, Experience, State},
};
pub use simulation::{BlackjackGame, GamePhase};

pub type Result<T> = std::result::Result<T, Error>;

/// House rules of a table. Immutable for the lifetime of a game; the named
/// presets below are plain constructors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameRules {
    pub num_decks: u8,
    pub dealer_hits_soft17: bool,
    /// Winnings multiplier for a natural, 1.5 for 3:2 and 1.2 for 6:5.
    pub blackjack_payout: f64,
    /// Carried for configuration and reporting. The game never doubles after a split.
    pub double_after_split: bool,
    pub surrender: bool,
    /// Fraction of the shoe dealt before a mandatory reshuffle.
    pub penetration: f64,
}

impl Default for GameRules {
    fn default() -> Self {
        GameRules {
            num_decks: 6,
            dealer_hits_soft17: true,
            blackjack_payout: 1.5,
            double_after_split: true,
            surrender: false,
            penetration: 0.75,
        }
    }
}

impl GameRules {
    pub fn vegas_strip() -> Self {
        GameRules {
            num_decks: 6,
            dealer_hits_soft17: false,
            surrender: false,
            ..Default::default()
        }
    }

    pub fn downtown() -> Self {
        GameRules {
            num_decks: 2,
            dealer_hits_soft17: true,
            surrender: true,
            ..Default::default()
        }
    }

    pub fn atlantic_city() -> Self {
        GameRules {
            num_decks: 8,
            dealer_hits_soft17: false,
            surrender: true,
            ..Default::default()
        }
    }

    pub fn european() -> Self {
        GameRules {
            num_decks: 6,
            dealer_hits_soft17: false,
            surrender: false,
            ..Default::default()
        }
    }

    pub fn single_deck() -> Self {
        GameRules {
            num_decks: 1,
            dealer_hits_soft17: true,
            ..Default::default()
        }
    }

    pub fn from_preset(preset: RulesPreset) -> Self {
        match preset {
            RulesPreset::VegasStrip => Self::vegas_strip(),
            RulesPreset::Downtown => Self::downtown(),
            RulesPreset::AtlanticCity => Self::atlantic_city(),
            RulesPreset::European => Self::european(),
            RulesPreset::SingleDeck => Self::single_deck(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_decks == 0 {
            return Err(Error::InvalidRules(String::from(
                "number of decks must be at least 1",
            )));
        }
        if !(self.penetration > 0.0 && self.penetration <= 1.0) {
            return Err(Error::InvalidRules(format!(
                "penetration must be in (0, 1], got {}",
                self.penetration
            )));
        }
        if !(self.blackjack_payout >= 0.0) {
            return Err(Error::InvalidRules(format!(
                "blackjack payout must be non-negative, got {}",
                self.blackjack_payout
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize_enum_str, Deserialize_enum_str)]
pub enum RulesPreset {
    #[serde(rename = "vegas-strip")]
    VegasStrip,
    #[serde(rename = "downtown")]
    Downtown,
    #[serde(rename = "atlantic-city")]
    AtlanticCity,
    #[serde(rename = "european")]
    European,
    #[serde(rename = "single-deck")]
    SingleDeck,
}

/// Result of one player hand against the dealer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    PlayerWin,
    PlayerBlackjack,
    DealerWin,
    Push,
    PlayerBust,
    DealerBust,
    Surrender,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Outcome::PlayerWin => "Player Win",
            Outcome::PlayerBlackjack => "Player Blackjack",
            Outcome::DealerWin => "Dealer Win",
            Outcome::Push => "Push",
            Outcome::PlayerBust => "Player Bust",
            Outcome::DealerBust => "Dealer Bust",
            Outcome::Surrender => "Surrender",
        };
        write!(f, "{}", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        for preset in [
            "vegas-strip",
            "downtown",
            "atlantic-city",
            "european",
            "single-deck",
        ] {
            let preset: RulesPreset = preset.parse().unwrap();
            assert!(GameRules::from_preset(preset).validate().is_ok());
        }
        assert!("not-a-casino".parse::<RulesPreset>().is_err());
    }

    #[test]
    fn presets_do_not_share_state() {
        let mut rules = GameRules::downtown();
        rules.num_decks = 4;
        assert_eq!(GameRules::downtown().num_decks, 2);
        assert!(GameRules::downtown().surrender);
        assert!(!GameRules::vegas_strip().dealer_hits_soft17);
    }

    #[test]
    fn zero_decks_are_rejected() {
        let rules = GameRules {
            num_decks: 0,
            ..Default::default()
        };
        assert!(matches!(rules.validate(), Err(Error::InvalidRules(_))));
    }

    #[test]
    fn penetration_must_be_a_fraction() {
        for penetration in [0.0, -0.5, 1.5] {
            let rules = GameRules {
                penetration,
                ..Default::default()
            };
            assert!(rules.validate().is_err());
        }
    }
}
