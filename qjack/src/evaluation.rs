pub mod chart;
pub mod convergence;

use crate::learning::{agent::Agent, converter::GameStateConverter};
use crate::simulation::BlackjackGame;
use crate::strategy::{audit_actions, audit_states, BasicStrategy};
use crate::{GameRules, Outcome, Result};

/// Tallies of an exploitation-only evaluation run. Every round lands in
/// exactly one of wins, losses and pushes, judged by its net reward.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationResult {
    pub games_played: usize,
    pub wins: usize,
    pub losses: usize,
    pub pushes: usize,
    /// Rounds opened with a player natural. Always a subset of wins.
    pub blackjacks: usize,
    /// Lost rounds where at least one hand busted.
    pub busts: usize,

    pub win_rate: f64,
    pub loss_rate: f64,
    pub push_rate: f64,
    pub blackjack_rate: f64,
    pub bust_rate: f64,
    pub avg_reward: f64,

    /// Exhaustive agreement with basic strategy, when requested.
    pub strategy_accuracy: Option<f64>,
}

/// Plays an agent greedily against its own game instance.
pub struct Evaluator {
    game: BlackjackGame,
    strategy: BasicStrategy,
}

impl Evaluator {
    pub fn new(rules: &GameRules) -> Result<Self> {
        Ok(Evaluator {
            game: BlackjackGame::new(rules)?,
            strategy: BasicStrategy::new(),
        })
    }

    pub fn with_seed(rules: &GameRules, seed: u64) -> Result<Self> {
        Ok(Evaluator {
            game: BlackjackGame::with_seed(rules, seed)?,
            strategy: BasicStrategy::new(),
        })
    }

    pub fn basic_strategy(&self) -> &BasicStrategy {
        &self.strategy
    }

    pub fn rules(&self) -> &GameRules {
        self.game.rules()
    }

    /// Plays `num_games` rounds without exploration. With zero games every
    /// rate is 0.
    pub fn evaluate<A: Agent + ?Sized>(
        &mut self,
        agent: &A,
        num_games: usize,
        compare_strategy: bool,
    ) -> Result<EvaluationResult> {
        let mut result = EvaluationResult {
            games_played: num_games,
            ..Default::default()
        };
        let payout = self.game.rules().blackjack_payout;
        let mut total_reward = 0.0;

        for _ in 0..num_games {
            self.play_round(agent)?;

            let outcomes = self.game.outcomes()?;
            let reward =
                GameStateConverter::round_reward(outcomes, self.game.was_doubled(), payout);
            total_reward += reward;

            if reward > 0.0 {
                result.wins += 1;
                if outcomes.first() == Some(&Outcome::PlayerBlackjack) {
                    result.blackjacks += 1;
                }
            } else if reward < 0.0 {
                result.losses += 1;
                if outcomes.contains(&Outcome::PlayerBust) {
                    result.busts += 1;
                }
            } else {
                result.pushes += 1;
            }
        }

        if num_games > 0 {
            let n = num_games as f64;
            result.win_rate = result.wins as f64 / n;
            result.loss_rate = result.losses as f64 / n;
            result.push_rate = result.pushes as f64 / n;
            result.blackjack_rate = result.blackjacks as f64 / n;
            result.bust_rate = result.busts as f64 / n;
            result.avg_reward = total_reward / n;
        }

        if compare_strategy {
            result.strategy_accuracy = Some(self.compare_with_basic_strategy(agent)?);
        }
        Ok(result)
    }

    fn play_round<A: Agent + ?Sized>(&mut self, agent: &A) -> Result<()> {
        self.game.start_round();
        while !self.game.is_round_complete() {
            let state = GameStateConverter::observe(&self.game);
            let actions = GameStateConverter::legal_actions(&self.game);
            let action = agent.greedy_action(&state, &actions)?;
            GameStateConverter::execute_action(action, &mut self.game);
        }
        Ok(())
    }

    /// Fraction of audited states where the greedy action agrees with basic
    /// strategy. Enumerates the whole audit space, so it is deterministic.
    pub fn compare_with_basic_strategy<A: Agent + ?Sized>(&self, agent: &A) -> Result<f64> {
        let mut matches = 0;
        let mut total = 0;
        for state in audit_states() {
            let action = agent.greedy_action(&state, &audit_actions(&state))?;
            if self.strategy.is_correct_action(&state, action) {
                matches += 1;
            }
            total += 1;
        }
        Ok(if total > 0 {
            matches as f64 / total as f64
        } else {
            0.0
        })
    }
}
