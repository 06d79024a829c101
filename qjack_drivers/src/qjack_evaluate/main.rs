use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use qjack::evaluation::chart::StrategyChart;
use qjack::evaluation::convergence::ConvergenceReport;
use qjack::evaluation::Evaluator;
use qjack::{Agent, GameRules, QLearningAgent};
use qjack_drivers::{init_logging, load_config, DEFAULT_CONFIG_PATH};

/// Plays a saved agent greedily and audits it against basic strategy.
#[derive(Debug, Parser)]
#[command(author, about, long_about = None)]
struct CommandLineArgs {
    /// The path of the config file
    #[arg(short, long, default_value_t = String::from(DEFAULT_CONFIG_PATH))]
    config: String,

    /// Saved agent, without the .qtable/.meta extension
    #[arg(short, long)]
    model: PathBuf,

    /// Number of evaluation rounds
    #[arg(short, long, default_value_t = 10_000)]
    games: usize,

    /// Seed of the evaluation game
    #[arg(short, long)]
    seed: Option<u64>,

    /// Strategy accuracy needed to pass
    #[arg(short, long, default_value_t = 0.90)]
    threshold: f64,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = CommandLineArgs::parse();
    init_logging(None)?;
    let config = load_config(&args.config)?;
    let rules: GameRules = config.rule.clone().try_into()?;

    let mut agent = QLearningAgent::new(config.agent.hyperparameters())?;
    agent.load(&args.model)?;

    let mut evaluator = match args.seed {
        Some(seed) => Evaluator::with_seed(&rules, seed)?,
        None => Evaluator::new(&rules)?,
    };
    let result = evaluator.evaluate(&agent, args.games, true)?;

    println!("=== Evaluation ({} games, {}) ===", result.games_played, config.rule.preset);
    println!("Win rate       : {:.2}%", result.win_rate * 100.0);
    println!("Loss rate      : {:.2}%", result.loss_rate * 100.0);
    println!("Push rate      : {:.2}%", result.push_rate * 100.0);
    println!("Blackjack rate : {:.2}%", result.blackjack_rate * 100.0);
    println!("Bust rate      : {:.2}%", result.bust_rate * 100.0);
    println!("Avg reward     : {:.4}", result.avg_reward);

    let report = ConvergenceReport::new(args.threshold, 15);
    let convergence = report.analyze(&agent, evaluator.basic_strategy())?;
    let mut text = String::new();
    report.write_report(&convergence, &mut text)?;
    print!("{}", text);
    print!("{}", StrategyChart::build(&agent, evaluator.basic_strategy())?);
    Ok(())
}
