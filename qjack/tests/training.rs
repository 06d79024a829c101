use std::path::Path;

use qjack::learning::agent::{meta_path, qtable_path};
use qjack::training::{checkpoint_path, Trainer, TrainingConfig, TrainingControl};
use qjack::{Agent, GameRules, Hyperparameters, QLearningAgent};

fn config_in(dir: &Path) -> TrainingConfig {
    TrainingConfig {
        num_episodes: 2_000,
        eval_frequency: 500,
        eval_games: 200,
        checkpoint_frequency: 1_000,
        checkpoint_dir: dir.join("checkpoints"),
        log_dir: dir.join("logs"),
        verbose: false,
        early_stopping_patience: 0,
        seed: Some(5),
        ..Default::default()
    }
}

fn agent(seed: u64) -> QLearningAgent {
    QLearningAgent::with_seed(Hyperparameters::default(), seed).unwrap()
}

#[test]
fn full_budget_without_early_stopping() {
    let dir = tempfile::tempdir().unwrap();
    let mut trainer =
        Trainer::new(agent(1), config_in(dir.path()), TrainingControl::new()).unwrap();
    let metrics = trainer.train().unwrap();

    assert_eq!(metrics.total_episodes, 2_000);
    assert!(metrics.states_learned > 50);
    assert!(metrics.current_epsilon < 1.0);
    assert!((0.0..=1.0).contains(&metrics.win_rate));
    for episode in [1_000, 2_000] {
        let base = checkpoint_path(&dir.path().join("checkpoints"), episode);
        assert!(qtable_path(&base).exists());
        assert!(meta_path(&base).exists());
    }
}

#[test]
fn patience_one_stops_before_the_budget() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        num_episodes: 100_000,
        eval_frequency: 10,
        checkpoint_frequency: 100_000,
        early_stopping_patience: 1,
        ..config_in(dir.path())
    };
    let mut trainer = Trainer::new(agent(2), config, TrainingControl::new()).unwrap();
    let metrics = trainer.train().unwrap();

    assert!(metrics.total_episodes < 100_000);
    assert_eq!(metrics.total_episodes % 10, 0);
    assert!(trainer.history().len() >= 2);
    assert!(trainer.last_checkpoint().is_some());
}

#[test]
fn checkpoint_resumes_progress() {
    let dir = tempfile::tempdir().unwrap();
    let mut trainer =
        Trainer::new(agent(3), config_in(dir.path()), TrainingControl::new()).unwrap();
    trainer.train().unwrap();
    let checkpoint = trainer.last_checkpoint().unwrap().to_path_buf();
    let trained = trainer.into_agent();

    let mut resumed = agent(4);
    resumed.load(&checkpoint).unwrap();
    assert_eq!(resumed.step_count(), trained.step_count());
    assert_eq!(resumed.exploration_rate(), trained.exploration_rate());
    assert_eq!(resumed.state_count(), trained.state_count());

    let second_dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        num_episodes: 500,
        ..config_in(second_dir.path())
    };
    let mut trainer = Trainer::new(resumed, config, TrainingControl::new()).unwrap();
    let metrics = trainer.train().unwrap();
    assert_eq!(metrics.total_episodes, 500);
    assert!(trainer.agent().step_count() > trained.step_count());
    assert!(trainer.agent().state_count() >= trained.state_count());
}

#[test]
fn invalid_rules_fail_before_training() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        game_rules: GameRules {
            num_decks: 0,
            ..Default::default()
        },
        ..config_in(dir.path())
    };
    assert!(Trainer::new(agent(5), config, TrainingControl::new()).is_err());
}
