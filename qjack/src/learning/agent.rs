use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::policy_table::{PolicyTable, QValues};
use super::state::{Action, Experience, State};
use crate::{Error, Result};

/// A learner that picks actions for blackjack decision points and improves
/// from recorded experience.
pub trait Agent {
    /// Epsilon-greedy when `training`, greedy otherwise. Fails on an empty
    /// action set.
    fn choose_action(
        &mut self,
        state: &State,
        valid_actions: &[Action],
        training: bool,
    ) -> Result<Action>;

    /// Pure exploitation. Never touches the RNG or the exploration rate.
    fn greedy_action(&self, state: &State, valid_actions: &[Action]) -> Result<Action>;

    fn learn(&mut self, experience: &Experience);

    fn q_value(&self, state: &State, action: Action) -> f64;

    /// Persists the agent under `path` (extra suffixes are appended).
    fn save(&self, path: &Path) -> Result<()>;

    fn load(&mut self, path: &Path) -> Result<()>;

    fn name(&self) -> &'static str;

    fn exploration_rate(&self) -> f64;

    fn state_count(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hyperparameters {
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub epsilon: f64,
    pub epsilon_decay: f64,
    pub epsilon_min: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Hyperparameters {
            learning_rate: 0.1,
            discount_factor: 0.95,
            epsilon: 1.0,
            epsilon_decay: 0.99995,
            epsilon_min: 0.01,
        }
    }
}

impl Hyperparameters {
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (
                self.learning_rate > 0.0 && self.learning_rate <= 1.0,
                "learning rate must be in (0, 1]",
            ),
            (
                (0.0..=1.0).contains(&self.discount_factor),
                "discount factor must be in [0, 1]",
            ),
            (
                (0.0..=1.0).contains(&self.epsilon),
                "epsilon must be in [0, 1]",
            ),
            (
                self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0,
                "epsilon decay must be in (0, 1]",
            ),
            (
                (0.0..=1.0).contains(&self.epsilon_min),
                "epsilon min must be in [0, 1]",
            ),
            (
                self.epsilon_min <= self.epsilon,
                "epsilon min must not exceed epsilon",
            ),
        ];
        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, message)) => Err(Error::InvalidHyperparameters(format!(
                "{} ({:?})",
                message, self
            ))),
            None => Ok(()),
        }
    }
}

/// Off-policy one-step Q-learning over a `PolicyTable`.
#[derive(Debug, Clone)]
pub struct QLearningAgent {
    params: Hyperparameters,
    table: PolicyTable,
    epsilon: f64,
    step_count: u64,
    rng: StdRng,
}

impl QLearningAgent {
    pub fn new(params: Hyperparameters) -> Result<Self> {
        Self::with_rng(params, StdRng::from_entropy())
    }

    pub fn with_seed(params: Hyperparameters, seed: u64) -> Result<Self> {
        Self::with_rng(params, StdRng::seed_from_u64(seed))
    }

    fn with_rng(params: Hyperparameters, rng: StdRng) -> Result<Self> {
        params.validate()?;
        Ok(QLearningAgent {
            params,
            table: PolicyTable::new(0.0),
            epsilon: params.epsilon,
            step_count: 0,
            rng,
        })
    }

    pub fn params(&self) -> &Hyperparameters {
        &self.params
    }

    pub fn table(&self) -> &PolicyTable {
        &self.table
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Forgets everything learned and restarts exploration.
    pub fn reset(&mut self) {
        self.table.clear();
        self.epsilon = self.params.epsilon;
        self.step_count = 0;
    }

    /// Overrides the exploration rate, clamped to `[epsilon_min, 1]`.
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon.clamp(self.params.epsilon_min, 1.0);
    }

    pub fn all_q_values(&self, state: &State) -> QValues {
        self.table.values(state)
    }

    pub fn export_q_table(&self, path: &Path) -> Result<()> {
        self.table.export_csv(path)?;
        info!("Exported {} states to {}", self.table.len(), path.display());
        Ok(())
    }

    fn decay_epsilon(&mut self) {
        self.epsilon = (self.epsilon * self.params.epsilon_decay).max(self.params.epsilon_min);
    }

    fn metadata(&self) -> String {
        format!(
            "agent_type: Q-Learning\n\
             learning_rate: {}\n\
             discount_factor: {}\n\
             epsilon: {}\n\
             epsilon_min: {}\n\
             epsilon_decay: {}\n\
             step_count: {}\n\
             state_space_size: {}\n",
            self.params.learning_rate,
            self.params.discount_factor,
            self.epsilon,
            self.params.epsilon_min,
            self.params.epsilon_decay,
            self.step_count,
            self.table.len()
        )
    }
}

impl Agent for QLearningAgent {
    fn choose_action(
        &mut self,
        state: &State,
        valid_actions: &[Action],
        training: bool,
    ) -> Result<Action> {
        if training && self.rng.gen::<f64>() < self.epsilon {
            return valid_actions
                .choose(&mut self.rng)
                .copied()
                .ok_or(Error::NoValidActions);
        }
        self.greedy_action(state, valid_actions)
    }

    fn greedy_action(&self, state: &State, valid_actions: &[Action]) -> Result<Action> {
        self.table
            .max_action(state, valid_actions)
            .ok_or(Error::NoValidActions)
    }

    /// Q(s, a) += alpha * (target - Q(s, a)), bootstrapping from the best valid
    /// next action unless the step ended the round.
    fn learn(&mut self, experience: &Experience) {
        let current = self.table.get(&experience.state, experience.action);
        let target = if experience.done {
            experience.reward
        } else {
            let next_best = self
                .table
                .max_q(&experience.next_state, &experience.valid_next_actions)
                .unwrap_or_else(|| self.table.default_value());
            experience.reward + self.params.discount_factor * next_best
        };

        let updated = current + self.params.learning_rate * (target - current);
        self.table.set(&experience.state, experience.action, updated);

        self.decay_epsilon();
        self.step_count += 1;
    }

    fn q_value(&self, state: &State, action: Action) -> f64 {
        self.table.get(state, action)
    }

    /// Writes `<path>.qtable` and `<path>.meta`.
    fn save(&self, path: &Path) -> Result<()> {
        self.table.save(&qtable_path(path))?;
        let meta = meta_path(path);
        fs::write(&meta, self.metadata()).map_err(|e| Error::io(&meta, e))?;

        info!(
            "Saved Q-learning agent to {} (states {}, steps {}, epsilon {:.6})",
            path.display(),
            self.table.len(),
            self.step_count,
            self.epsilon
        );
        Ok(())
    }

    /// Restores the table, the exploration rate and the step count. The other
    /// metadata fields are informational.
    fn load(&mut self, path: &Path) -> Result<()> {
        let meta = meta_path(path);
        let text = fs::read_to_string(&meta).map_err(|e| Error::io(&meta, e))?;
        let (epsilon, step_count) = parse_metadata(&text)?;

        self.table.load(&qtable_path(path))?;
        self.epsilon = epsilon;
        self.step_count = step_count;

        info!(
            "Loaded Q-learning agent from {} (states {}, steps {}, epsilon {:.6})",
            path.display(),
            self.table.len(),
            self.step_count,
            self.epsilon
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Q-Learning"
    }

    fn exploration_rate(&self) -> f64 {
        self.epsilon
    }

    fn state_count(&self) -> usize {
        self.table.len()
    }
}

pub fn qtable_path(base: &Path) -> PathBuf {
    with_suffix(base, "qtable")
}

pub fn meta_path(base: &Path) -> PathBuf {
    with_suffix(base, "meta")
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut path = base.as_os_str().to_os_string();
    path.push(".");
    path.push(suffix);
    PathBuf::from(path)
}

fn parse_metadata(text: &str) -> Result<(f64, u64)> {
    let mut epsilon = None;
    let mut step_count = None;
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "epsilon" => {
                epsilon = Some(value.parse::<f64>().map_err(|_| {
                    Error::Metadata(format!("epsilon is not a number: {:?}", value))
                })?)
            }
            "step_count" => {
                step_count = Some(value.parse::<u64>().map_err(|_| {
                    Error::Metadata(format!("step_count is not an integer: {:?}", value))
                })?)
            }
            _ => {}
        }
    }
    match (epsilon, step_count) {
        (Some(epsilon), Some(step_count)) => Ok((epsilon, step_count)),
        (None, _) => Err(Error::Metadata(String::from("missing epsilon"))),
        (_, None) => Err(Error::Metadata(String::from("missing step_count"))),
    }
}
