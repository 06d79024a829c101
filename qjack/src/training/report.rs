use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{TrainingConfig, TrainingMetrics};
use crate::evaluation::chart::StrategyChart;
use crate::evaluation::convergence::{ConvergenceReport, ConvergenceResult};
use crate::learning::agent::Agent;
use crate::strategy::BasicStrategy;
use crate::{Error, Result};

pub const REPORT_FILE_NAME: &str = "training_report.txt";

/// Win rate a basic-strategy player reaches, roughly.
const BASIC_STRATEGY_WIN_RATE: f64 = 0.42;
const MIN_HEALTHY_STATES: usize = 150;

/// Plain-text summary of a finished run: configuration, run stats, final
/// performance, strategy chart, convergence report and suggestions.
pub fn render<A: Agent + ?Sized>(
    config: &TrainingConfig,
    metrics: &TrainingMetrics,
    elapsed: Duration,
    agent: &A,
    strategy: &BasicStrategy,
) -> Result<String> {
    let convergence = ConvergenceReport::default();
    let result = convergence.analyze(agent, strategy)?;
    let chart = StrategyChart::build(agent, strategy)?;

    let mut out = String::new();
    write_body(&mut out, config, metrics, elapsed, &chart)?;
    convergence.write_report(&result, &mut out)?;
    for line in suggestions(&result, metrics, convergence.passing_threshold()) {
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

/// Writes `text` into `<dir>/training_report.txt`, creating `dir` if needed.
pub fn save(dir: &Path, text: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let path = dir.join(REPORT_FILE_NAME);
    fs::write(&path, text).map_err(|e| Error::io(&path, e))?;
    Ok(path)
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn write_body(
    out: &mut String,
    config: &TrainingConfig,
    metrics: &TrainingMetrics,
    elapsed: Duration,
    chart: &StrategyChart,
) -> std::fmt::Result {
    let rules = &config.game_rules;
    let params = &config.hyperparameters;

    writeln!(out, "{}", "=".repeat(60))?;
    writeln!(out, "            Blackjack Q-Learning Training Report")?;
    writeln!(out, "{}\n", "=".repeat(60))?;

    writeln!(out, "--- Configuration ---")?;
    writeln!(out, "{:<24}: {}", "Rules preset", config.rules_name)?;
    writeln!(out, "{:<24}: {}", "Num decks", rules.num_decks)?;
    writeln!(out, "{:<24}: {}", "Dealer hits soft 17", yes_no(rules.dealer_hits_soft17))?;
    writeln!(out, "{:<24}: {}", "Surrender enabled", yes_no(rules.surrender))?;
    writeln!(out, "{:<24}: {}", "Double after split", yes_no(rules.double_after_split))?;
    writeln!(out, "{:<24}: {}:1", "Blackjack payout", rules.blackjack_payout)?;
    writeln!(out, "{:<24}: {}", "Penetration", rules.penetration)?;
    writeln!(out, "{:<24}: {}", "Learning rate", params.learning_rate)?;
    writeln!(out, "{:<24}: {}", "Discount factor", params.discount_factor)?;
    writeln!(out, "{:<24}: {}", "Epsilon start", params.epsilon)?;
    writeln!(out, "{:<24}: {}", "Epsilon decay", params.epsilon_decay)?;
    writeln!(out, "{:<24}: {}", "Epsilon min", params.epsilon_min)?;
    writeln!(out, "{:<24}: {} episodes", "Eval frequency", config.eval_frequency)?;
    writeln!(out, "{:<24}: {}", "Eval games", config.eval_games)?;

    let seconds = elapsed.as_secs();
    writeln!(out, "\n--- Training Stats ---")?;
    writeln!(out, "{:<24}: {}", "Total episodes", metrics.total_episodes)?;
    writeln!(out, "{:<24}: {} seconds", "Duration", seconds)?;
    if seconds > 0 {
        writeln!(out, "{:<24}: {}", "Episodes / sec", metrics.total_episodes / seconds)?;
    }
    writeln!(out, "{:<24}: {}", "States learned", metrics.states_learned)?;
    writeln!(out, "{:<24}: {:.6}", "Final epsilon", metrics.current_epsilon)?;

    writeln!(out, "\n--- Final Performance ---")?;
    writeln!(out, "{:<24}: {:.2}%", "Win rate", metrics.win_rate * 100.0)?;
    writeln!(out, "{:<24}: {:.2}%", "Loss rate", metrics.loss_rate * 100.0)?;
    writeln!(out, "{:<24}: {:.2}%", "Push rate", metrics.push_rate * 100.0)?;
    writeln!(out, "{:<24}: {:.2}%", "Bust rate", metrics.bust_rate * 100.0)?;
    writeln!(out, "{:<24}: {:.4}", "Avg reward", metrics.avg_reward)?;

    write!(out, "{}", chart)
}

/// Advice derived from the convergence result and the final metrics.
pub fn suggestions(
    result: &ConvergenceResult,
    metrics: &TrainingMetrics,
    passing_threshold: f64,
) -> Vec<String> {
    let mut lines = vec![String::from("\n=== Improvement Suggestions ===")];
    let mut any = false;

    if !result.passed {
        lines.push(format!(
            "  * Strategy accuracy ({:.1}%) is below the {:.0}% threshold.",
            result.accuracy * 100.0,
            passing_threshold * 100.0
        ));
        lines.push(String::from(
            "    Try training for more episodes (e.g. 2M+) or reduce epsilon_decay.",
        ));
        any = true;
    }

    let critical = result.critical_count();
    if critical > 0 {
        lines.push(format!(
            "  * {} critical state(s) diverge from basic strategy.",
            critical
        ));
        lines.push(String::from(
            "    High-stakes hands (hard 16 vs strong dealer, hard 10/11) need more exploration.",
        ));
        any = true;
    }

    let soft = result
        .divergences
        .iter()
        .filter(|d| d.state.has_usable_ace)
        .count();
    if !result.divergences.is_empty() && soft > result.divergences.len() / 2 {
        lines.push(format!(
            "  * Soft-total strategy shows above-average divergences ({} states).",
            soft
        ));
        lines.push(String::from(
            "    Ace-involved hands are rare; extended training usually resolves these.",
        ));
        any = true;
    }

    if metrics.win_rate < BASIC_STRATEGY_WIN_RATE {
        lines.push(format!(
            "  * Win rate ({:.1}%) is below basic strategy (~43%).",
            metrics.win_rate * 100.0
        ));
        lines.push(String::from(
            "    Consider more episodes, a slower epsilon_decay, or a higher learning_rate.",
        ));
        any = true;
    }

    if metrics.states_learned < MIN_HEALTHY_STATES {
        lines.push(format!(
            "  * Only {} states explored, the Q-table is underpopulated.",
            metrics.states_learned
        ));
        lines.push(String::from(
            "    Slow epsilon decay (e.g. 0.9999) allows broader exploration.",
        ));
        any = true;
    }

    if !any {
        lines.push(String::from(
            "  * Agent closely matches basic strategy and win rate looks healthy.",
        ));
    }
    lines.push(String::from("================================"));
    lines
}
