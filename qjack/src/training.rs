pub mod metrics_log;
pub mod report;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, log, Level};

use self::metrics_log::MetricsLogger;
use crate::evaluation::{EvaluationResult, Evaluator};
use crate::learning::agent::{Agent, Hyperparameters};
use crate::learning::converter::GameStateConverter;
use crate::learning::state::{Experience, State};
use crate::simulation::BlackjackGame;
use crate::{Error, GameRules, Outcome, Result};

/// Smoothing factor of the running per-episode metrics.
const EMA_ALPHA: f64 = 0.01;
const PAUSE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub num_episodes: u64,
    /// Episodes between evaluations. Must be non-zero.
    pub eval_frequency: u64,
    pub eval_games: usize,
    /// Episodes between checkpoints. Must be non-zero.
    pub checkpoint_frequency: u64,
    pub checkpoint_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Where `training_report.txt` goes. None skips the report.
    pub report_dir: Option<PathBuf>,
    pub verbose: bool,
    /// Evaluations without improvement before stopping. 0 never stops early.
    pub early_stopping_patience: usize,
    pub min_improvement: f64,
    pub game_rules: GameRules,
    /// Label of the rules for the report, e.g. a preset name.
    pub rules_name: String,
    /// Hyperparameters the agent was built with, for the banner and the report.
    pub hyperparameters: Hyperparameters,
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            num_episodes: 1_000_000,
            eval_frequency: 10_000,
            eval_games: 1_000,
            checkpoint_frequency: 50_000,
            checkpoint_dir: PathBuf::from("./checkpoints"),
            log_dir: PathBuf::from("./logs"),
            report_dir: None,
            verbose: true,
            early_stopping_patience: 10,
            min_improvement: 0.001,
            game_rules: GameRules::default(),
            rules_name: String::from("default"),
            hyperparameters: Hyperparameters::default(),
            seed: None,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.eval_frequency == 0 {
            return Err(Error::InvalidConfig(String::from(
                "eval frequency must be at least 1",
            )));
        }
        if self.checkpoint_frequency == 0 {
            return Err(Error::InvalidConfig(String::from(
                "checkpoint frequency must be at least 1",
            )));
        }
        if !(self.min_improvement >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "min improvement must be non-negative, got {}",
                self.min_improvement
            )));
        }
        self.game_rules.validate()
    }
}

/// Running view of training. Rates are smoothed per episode and replaced by
/// exact evaluation numbers at every evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingMetrics {
    pub total_episodes: u64,
    pub elapsed_secs: f64,
    pub win_rate: f64,
    pub loss_rate: f64,
    pub push_rate: f64,
    pub bust_rate: f64,
    pub avg_reward: f64,
    pub current_epsilon: f64,
    pub states_learned: usize,
    pub strategy_accuracy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeStats {
    pub episode_number: u64,
    /// Outcome of the first hand.
    pub outcome: Outcome,
    /// Net reward over every hand of the round.
    pub reward: f64,
    /// Recorded decisions. 0 when a natural ended the round at the deal.
    pub steps: usize,
    pub player_busted: bool,
    pub dealer_busted: bool,
}

/// Cooperative stop and pause flags shared with whoever handles interrupts.
#[derive(Debug, Clone, Default)]
pub struct TrainingControl {
    stop: Arc<AtomicBool>,
    pause: Arc<AtomicBool>,
}

impl TrainingControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// The trainer finishes the current episode, checkpoints and returns.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.pause.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.pause.store(false, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }
}

type EvaluationCallback = Box<dyn FnMut(&TrainingMetrics)>;

/// Drives self-play episodes, periodic evaluation, early stopping and
/// checkpointing for one agent.
pub struct Trainer<A: Agent> {
    agent: A,
    config: TrainingConfig,
    control: TrainingControl,
    game: BlackjackGame,
    evaluator: Evaluator,
    logger: MetricsLogger,

    metrics: TrainingMetrics,
    history: Vec<TrainingMetrics>,
    best_win_rate: f64,
    evaluations_since_improvement: usize,
    started: Instant,
    last_checkpoint: Option<PathBuf>,
    on_evaluation: Option<EvaluationCallback>,
}

impl<A: Agent> Trainer<A> {
    /// Validates the config and creates the checkpoint and log directories.
    pub fn new(agent: A, config: TrainingConfig, control: TrainingControl) -> Result<Self> {
        config.validate()?;
        for dir in [&config.checkpoint_dir, &config.log_dir] {
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }

        let (game, evaluator) = match config.seed {
            Some(seed) => (
                BlackjackGame::with_seed(&config.game_rules, seed)?,
                Evaluator::with_seed(&config.game_rules, seed.wrapping_add(1))?,
            ),
            None => (
                BlackjackGame::new(&config.game_rules)?,
                Evaluator::new(&config.game_rules)?,
            ),
        };
        let logger = MetricsLogger::create(&config.log_dir)?;

        let level = summary_level(config.verbose);
        log!(level, "=== Training Configuration ===");
        log!(level, "Agent: {}", agent.name());
        log!(level, "Rules: {} ({:?})", config.rules_name, config.game_rules);
        log!(level, "Episodes: {}", config.num_episodes);
        log!(level, "Eval frequency: {}", config.eval_frequency);
        log!(level, "Checkpoint frequency: {}", config.checkpoint_frequency);
        log!(level, "Checkpoint dir: {}", config.checkpoint_dir.display());
        log!(level, "Metrics log: {}", logger.path().display());

        let metrics = TrainingMetrics {
            current_epsilon: agent.exploration_rate(),
            states_learned: agent.state_count(),
            ..Default::default()
        };

        Ok(Trainer {
            agent,
            config,
            control,
            game,
            evaluator,
            logger,
            metrics,
            history: Vec::new(),
            best_win_rate: 0.0,
            evaluations_since_improvement: 0,
            started: Instant::now(),
            last_checkpoint: None,
            on_evaluation: None,
        })
    }

    /// Called with the fresh metrics after every evaluation.
    pub fn on_evaluation<F: FnMut(&TrainingMetrics) + 'static>(&mut self, callback: F) {
        self.on_evaluation = Some(Box::new(callback));
    }

    /// Runs the configured episode budget, then writes the training report
    /// when a report directory is set.
    pub fn train(&mut self) -> Result<TrainingMetrics> {
        let metrics = self.train_episodes(self.config.num_episodes)?;
        if let Some(dir) = self.config.report_dir.clone() {
            let text = report::render(
                &self.config,
                &metrics,
                self.started.elapsed(),
                &self.agent,
                self.evaluator.basic_strategy(),
            )?;
            let path = report::save(&dir, &text)?;
            info!("Training report saved: {}", path.display());
        }
        Ok(metrics)
    }

    /// Runs up to `num_episodes` more episodes, continuing the episode count.
    /// Returns early on a stop request or when early stopping triggers.
    pub fn train_episodes(&mut self, num_episodes: u64) -> Result<TrainingMetrics> {
        let level = summary_level(self.config.verbose);
        log!(level, "Starting training for {} episodes", num_episodes);

        let start = self.metrics.total_episodes;
        let end = start + num_episodes;
        let mut stopped = false;

        for episode in start..end {
            self.wait_while_paused();
            if self.control.is_stop_requested() {
                info!("Stop requested at episode {}, saving checkpoint", episode + 1);
                stopped = true;
                break;
            }

            let mut stats = self.run_episode()?;
            stats.episode_number = episode + 1;
            self.update_metrics(&stats);
            self.metrics.total_episodes = episode + 1;

            if (episode + 1) % self.config.eval_frequency == 0 {
                self.evaluate()?;
                if self.should_stop_early() {
                    info!("Early stopping triggered at episode {}", episode + 1);
                    break;
                }
            }

            if (episode + 1) % self.config.checkpoint_frequency == 0 {
                self.save_checkpoint(episode + 1)?;
            }
        }

        if !stopped {
            log!(level, "Running final evaluation");
            self.evaluate()?;
        }
        self.save_checkpoint(self.metrics.total_episodes)?;

        log!(level, "=== Training Complete ===");
        log!(level, "Total episodes: {}", self.metrics.total_episodes);
        log!(level, "Final win rate: {:.2}%", self.metrics.win_rate * 100.0);
        log!(level, "States learned: {}", self.metrics.states_learned);
        Ok(self.metrics.clone())
    }

    fn wait_while_paused(&self) {
        let mut announced = false;
        while self.control.is_paused() && !self.control.is_stop_requested() {
            if !announced {
                info!("Training paused at episode {}", self.metrics.total_episodes);
                announced = true;
            }
            std::thread::sleep(PAUSE_POLL);
        }
        if announced {
            info!("Training resumed");
        }
    }

    /// Plays one round with exploration. The terminal reward is written onto
    /// the last recorded step only, then every step is learned in order.
    pub fn run_episode(&mut self) -> Result<EpisodeStats> {
        let mut experiences: Vec<Experience> = Vec::new();
        self.game.start_round();

        while !self.game.is_round_complete() {
            let state = GameStateConverter::observe(&self.game);
            let actions = GameStateConverter::legal_actions(&self.game);
            let action = self.agent.choose_action(&state, &actions, true)?;
            GameStateConverter::execute_action(action, &mut self.game);

            let done = self.game.is_round_complete();
            let (next_state, valid_next_actions) = if done {
                (State::default(), Vec::new())
            } else {
                (
                    GameStateConverter::observe(&self.game),
                    GameStateConverter::legal_actions(&self.game),
                )
            };
            experiences.push(Experience {
                state,
                action,
                reward: 0.0,
                next_state,
                done,
                valid_next_actions,
            });
        }

        let outcomes = self.game.outcomes()?;
        let reward = GameStateConverter::round_reward(
            outcomes,
            self.game.was_doubled(),
            self.game.rules().blackjack_payout,
        );
        let stats = EpisodeStats {
            episode_number: self.metrics.total_episodes + 1,
            outcome: outcomes.first().copied().unwrap_or(Outcome::Push),
            reward,
            steps: experiences.len(),
            player_busted: outcomes.contains(&Outcome::PlayerBust),
            dealer_busted: outcomes.contains(&Outcome::DealerBust),
        };

        if let Some(last) = experiences.last_mut() {
            last.reward = reward;
        }
        for experience in &experiences {
            self.agent.learn(experience);
        }
        Ok(stats)
    }

    fn update_metrics(&mut self, stats: &EpisodeStats) {
        let ema = |old: f64, sample: f64| EMA_ALPHA * sample + (1.0 - EMA_ALPHA) * old;
        let indicator = |flag: bool| if flag { 1.0 } else { 0.0 };

        let metrics = &mut self.metrics;
        metrics.avg_reward = ema(metrics.avg_reward, stats.reward);
        metrics.win_rate = ema(metrics.win_rate, indicator(stats.reward > 0.0));
        metrics.loss_rate = ema(metrics.loss_rate, indicator(stats.reward < 0.0));
        metrics.push_rate = ema(metrics.push_rate, indicator(stats.reward == 0.0));
        metrics.bust_rate = ema(
            metrics.bust_rate,
            indicator(stats.reward < 0.0 && stats.player_busted),
        );
    }

    /// Greedy evaluation plus strategy audit. Replaces the running rates,
    /// appends to the history and the metrics log, and tracks improvement.
    pub fn evaluate(&mut self) -> Result<EvaluationResult> {
        let result = self
            .evaluator
            .evaluate(&self.agent, self.config.eval_games, true)?;

        self.metrics.win_rate = result.win_rate;
        self.metrics.loss_rate = result.loss_rate;
        self.metrics.push_rate = result.push_rate;
        self.metrics.bust_rate = result.bust_rate;
        self.metrics.avg_reward = result.avg_reward;
        self.metrics.strategy_accuracy = result.strategy_accuracy;
        self.metrics.current_epsilon = self.agent.exploration_rate();
        self.metrics.states_learned = self.agent.state_count();
        self.metrics.elapsed_secs = self.started.elapsed().as_secs_f64();

        self.logger.log(&self.metrics)?;
        self.history.push(self.metrics.clone());

        if result.win_rate > self.best_win_rate + self.config.min_improvement {
            self.best_win_rate = result.win_rate;
            self.evaluations_since_improvement = 0;
        } else {
            self.evaluations_since_improvement += 1;
        }

        let level = summary_level(self.config.verbose);
        log!(
            level,
            "Evaluation at episode {}: win {:.2}%, avg reward {:.4}, epsilon {:.4}, \
             states {}, accuracy {:.1}%, since improvement {}",
            self.metrics.total_episodes,
            result.win_rate * 100.0,
            result.avg_reward,
            self.metrics.current_epsilon,
            self.metrics.states_learned,
            result.strategy_accuracy.unwrap_or(0.0) * 100.0,
            self.evaluations_since_improvement
        );

        if let Some(callback) = self.on_evaluation.as_mut() {
            callback(&self.metrics);
        }
        Ok(result)
    }

    /// Saves the agent as `<checkpoint_dir>/agent_episode_<n>`.
    pub fn save_checkpoint(&mut self, episode: u64) -> Result<PathBuf> {
        let path = checkpoint_path(&self.config.checkpoint_dir, episode);
        self.agent.save(&path)?;
        debug!("Checkpoint saved: {}", path.display());
        self.last_checkpoint = Some(path.clone());
        Ok(path)
    }

    pub fn should_stop_early(&self) -> bool {
        self.config.early_stopping_patience > 0
            && self.evaluations_since_improvement >= self.config.early_stopping_patience
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut A {
        &mut self.agent
    }

    pub fn into_agent(self) -> A {
        self.agent
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn control(&self) -> &TrainingControl {
        &self.control
    }

    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    /// Metrics snapshot of every evaluation so far.
    pub fn history(&self) -> &[TrainingMetrics] {
        &self.history
    }

    pub fn last_checkpoint(&self) -> Option<&Path> {
        self.last_checkpoint.as_deref()
    }

    pub fn metrics_log_path(&self) -> &Path {
        self.logger.path()
    }
}

pub fn checkpoint_path(checkpoint_dir: &Path, episode: u64) -> PathBuf {
    checkpoint_dir.join(format!("agent_episode_{}", episode))
}

fn summary_level(verbose: bool) -> Level {
    if verbose {
        Level::Info
    } else {
        Level::Debug
    }
}
