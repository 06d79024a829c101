use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use qjack::training::{Trainer, TrainingControl};
use qjack::{Agent, QLearningAgent};
use qjack_drivers::{init_logging, load_config, DEFAULT_CONFIG_PATH};

/// Trains a Q-learning blackjack agent. Type q, p or r followed by Enter
/// to stop, pause or resume.
#[derive(Debug, Parser)]
#[command(author, about, long_about = None)]
struct CommandLineArgs {
    /// The path of the config file
    #[arg(short, long, default_value_t = String::from(DEFAULT_CONFIG_PATH))]
    config: String,

    /// Overrides the number of training episodes
    #[arg(short, long)]
    episodes: Option<u64>,

    /// Checkpoint to resume from, without the .qtable/.meta extension
    #[arg(short, long)]
    resume: Option<PathBuf>,

    /// Where the final model is saved
    #[arg(short, long, default_value = "models/final_agent")]
    model_out: PathBuf,

    /// Also exports the learned q-table as CSV
    #[arg(long)]
    export_csv: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = CommandLineArgs::parse();
    let config = load_config(&args.config)?;
    let mut training = config.training_config()?;
    if let Some(episodes) = args.episodes {
        training.num_episodes = episodes;
    }
    init_logging(Some(&training.log_dir))?;

    let params = config.agent.hyperparameters();
    let mut agent = match config.agent.seed {
        Some(seed) => QLearningAgent::with_seed(params, seed)?,
        None => QLearningAgent::new(params)?,
    };
    if let Some(checkpoint) = &args.resume {
        agent.load(checkpoint)?;
        info!(
            "Resuming from {} ({} states, epsilon {:.4})",
            checkpoint.display(),
            agent.state_count(),
            agent.exploration_rate()
        );
    }

    let control = TrainingControl::new();
    listen_for_commands(control.clone());

    let mut trainer = Trainer::new(agent, training, control)?;
    let progress = ProgressBar::new(trainer.config().num_episodes);
    progress.set_style(ProgressStyle::with_template(
        "  training [{bar:40}] {pos}/{len} episodes [{elapsed} < {eta}] {msg}",
    )?);
    let bar = progress.clone();
    trainer.on_evaluation(move |metrics| {
        bar.set_position(metrics.total_episodes);
        bar.set_message(format!(
            "win {:.2}%, epsilon {:.4}",
            metrics.win_rate * 100.0,
            metrics.current_epsilon
        ));
    });

    let metrics = trainer.train()?;
    progress.finish_with_message(format!(
        "done, {} episodes, win {:.2}%",
        metrics.total_episodes,
        metrics.win_rate * 100.0
    ));

    let agent = trainer.agent();
    if let Some(parent) = args.model_out.parent() {
        fs::create_dir_all(parent)?;
    }
    agent.save(&args.model_out)?;
    info!("Final model saved: {}", args.model_out.display());

    if let Some(csv) = &args.export_csv {
        agent.export_q_table(csv)?;
        info!("Q-table exported: {}", csv.display());
    }
    Ok(())
}

/// Reads q / p / r commands from stdin until stop or end of input.
fn listen_for_commands(control: TrainingControl) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut buffer = String::new();
        loop {
            buffer.clear();
            match stdin.read_line(&mut buffer) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            match buffer.trim().to_uppercase().as_str() {
                "Q" => {
                    warn!("graceful interrupt requested, finishing current episode...");
                    control.request_stop();
                    break;
                }
                "P" => control.pause(),
                "R" => control.resume(),
                _ => {}
            }
        }
    });
}
