use std::fmt;

use crate::learning::agent::Agent;
use crate::learning::state::{Action, State, NUM_ACTIONS};
use crate::strategy::{audit_actions, audit_states, q_margin, BasicStrategy};
use crate::Result;

/// One audited state where the greedy action disagrees with basic strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct Divergence {
    pub state: State,
    pub agent_action: Action,
    pub optimal_action: Action,
    /// How confidently the agent is wrong: best minus second-best value.
    pub q_margin: f64,
    pub is_critical: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvergenceResult {
    pub accuracy: f64,
    pub passed: bool,
    pub total_states: usize,
    pub matching_states: usize,
    /// Critical first, then by descending margin.
    pub divergences: Vec<Divergence>,
}

impl ConvergenceResult {
    pub fn critical_count(&self) -> usize {
        self.divergences.iter().filter(|d| d.is_critical).count()
    }
}

/// Exhaustive diff of a greedy policy against basic strategy.
#[derive(Debug, Clone)]
pub struct ConvergenceReport {
    passing_threshold: f64,
    max_divergences_shown: usize,
}

impl Default for ConvergenceReport {
    fn default() -> Self {
        Self::new(0.90, 15)
    }
}

impl ConvergenceReport {
    pub fn new(passing_threshold: f64, max_divergences_shown: usize) -> Self {
        ConvergenceReport {
            passing_threshold,
            max_divergences_shown,
        }
    }

    pub fn passing_threshold(&self) -> f64 {
        self.passing_threshold
    }

    pub fn analyze<A: Agent + ?Sized>(
        &self,
        agent: &A,
        strategy: &BasicStrategy,
    ) -> Result<ConvergenceResult> {
        let mut result = ConvergenceResult::default();

        for state in audit_states() {
            let valid = audit_actions(&state);
            let agent_action = agent.greedy_action(&state, &valid)?;
            result.total_states += 1;

            if strategy.is_correct_action(&state, agent_action) {
                result.matching_states += 1;
                continue;
            }

            let mut values = [0.0; NUM_ACTIONS];
            for action in Action::ALL {
                values[action.index()] = agent.q_value(&state, action);
            }
            result.divergences.push(Divergence {
                state,
                agent_action,
                optimal_action: strategy.action(&state),
                q_margin: q_margin(&values, &valid),
                is_critical: is_critical(&state),
            });
        }

        result.accuracy = if result.total_states > 0 {
            result.matching_states as f64 / result.total_states as f64
        } else {
            0.0
        };
        result.passed = result.accuracy >= self.passing_threshold;

        result.divergences.sort_by(|a, b| {
            b.is_critical
                .cmp(&a.is_critical)
                .then_with(|| b.q_margin.total_cmp(&a.q_margin))
        });
        Ok(result)
    }

    pub fn write_report<W: fmt::Write>(
        &self,
        result: &ConvergenceResult,
        out: &mut W,
    ) -> fmt::Result {
        writeln!(out, "\n=== Convergence Report ===")?;
        writeln!(
            out,
            "Strategy accuracy : {:.1}% ({}/{} states)",
            result.accuracy * 100.0,
            result.matching_states,
            result.total_states
        )?;
        writeln!(out, "Threshold         : {:.1}%", self.passing_threshold * 100.0)?;
        writeln!(
            out,
            "Status            : {}",
            if result.passed { "PASS" } else { "FAIL" }
        )?;

        if result.divergences.is_empty() {
            writeln!(out, "No divergences from basic strategy.")?;
            return writeln!(out, "==========================");
        }

        let critical = result.critical_count();
        writeln!(
            out,
            "Divergences       : {} ({} critical, {} minor)",
            result.divergences.len(),
            critical,
            result.divergences.len() - critical
        )?;

        let shown = self.max_divergences_shown.min(result.divergences.len());
        writeln!(
            out,
            "\nTop {} divergences (critical first, then by Q-value margin):",
            shown
        )?;
        writeln!(
            out,
            "{:<20}{:<12}{:<12}{:>10}  Type",
            "State", "Agent", "Optimal", "Margin"
        )?;
        writeln!(out, "{}", "-".repeat(64))?;
        for divergence in &result.divergences[..shown] {
            writeln!(
                out,
                "{:<20}{:<12}{:<12}{:>10.4}  {}",
                state_label(&divergence.state),
                divergence.agent_action.to_string(),
                divergence.optimal_action.to_string(),
                divergence.q_margin,
                if divergence.is_critical { "CRITICAL" } else { "minor" }
            )?;
        }

        if critical > 0 {
            writeln!(out, "\nCritical divergences:")?;
            for divergence in result.divergences.iter().filter(|d| d.is_critical) {
                writeln!(
                    out,
                    "  {:<18} agent={:<9} optimal={:<9} margin={:.4}",
                    state_label(&divergence.state),
                    divergence.agent_action.to_string(),
                    divergence.optimal_action.to_string(),
                    divergence.q_margin
                )?;
            }
        }
        writeln!(out, "==========================")
    }
}

/// High-frequency or high-stakes positions: soft 18, hard 12-16 against 7 or
/// better, hard 10 and 11 against 9 or better, and the surrender positions.
pub fn is_critical(state: &State) -> bool {
    if state.has_usable_ace {
        return state.player_total == 18;
    }
    let player = state.player_total;
    let dealer = if state.dealer_up_card == 1 {
        11
    } else {
        state.dealer_up_card
    };
    ((12..=16).contains(&player) && dealer >= 7)
        || ((player == 10 || player == 11) && dealer >= 9)
        || (player == 15 && dealer == 10)
        || (player == 16 && dealer >= 9)
}

fn state_label(state: &State) -> String {
    let dealer = match state.dealer_up_card {
        1 => String::from("A"),
        card => card.to_string(),
    };
    format!(
        "{} {} vs {}",
        if state.has_usable_ace { "soft" } else { "hard" },
        state.player_total,
        dealer
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::test_agents::{OracleAgent, ScrambledAgent};

    #[test]
    fn critical_states() {
        assert!(is_critical(&State::new(18, 9, true)));
        assert!(!is_critical(&State::new(17, 9, true)));
        assert!(is_critical(&State::new(12, 7, false)));
        assert!(is_critical(&State::new(16, 1, false)));
        assert!(!is_critical(&State::new(16, 6, false)));
        assert!(is_critical(&State::new(11, 9, false)));
        assert!(!is_critical(&State::new(11, 8, false)));
        assert!(!is_critical(&State::new(19, 10, false)));
    }

    #[test]
    fn divergences_are_sorted_critical_first_then_by_margin() {
        let report = ConvergenceReport::default();
        let result = report
            .analyze(&ScrambledAgent, &BasicStrategy::new())
            .unwrap();

        assert!((0.0..=1.0).contains(&result.accuracy));
        assert_eq!(result.total_states, 360);
        assert_eq!(
            result.matching_states + result.divergences.len(),
            result.total_states
        );
        assert!(!result.divergences.is_empty());

        for pair in result.divergences.windows(2) {
            assert!(pair[0].is_critical >= pair[1].is_critical);
            if pair[0].is_critical == pair[1].is_critical {
                assert!(pair[0].q_margin >= pair[1].q_margin);
            }
        }
    }

    #[test]
    fn oracle_passes_without_divergences() {
        let report = ConvergenceReport::default();
        let result = report
            .analyze(&OracleAgent(BasicStrategy::new()), &BasicStrategy::new())
            .unwrap();
        assert_eq!(result.accuracy, 1.0);
        assert!(result.passed);

        let mut text = String::new();
        report.write_report(&result, &mut text).unwrap();
        assert!(text.contains("Status            : PASS"));
        assert!(text.contains("No divergences from basic strategy."));
    }

    #[test]
    fn report_lists_top_divergences() {
        let report = ConvergenceReport::new(0.99, 3);
        let result = report
            .analyze(&ScrambledAgent, &BasicStrategy::new())
            .unwrap();
        assert!(!result.passed);

        let mut text = String::new();
        report.write_report(&result, &mut text).unwrap();
        assert!(text.contains("Status            : FAIL"));
        assert!(text.contains("Top 3 divergences"));
        let table_rows = text
            .lines()
            .filter(|line| line.ends_with("CRITICAL") || line.ends_with("minor"))
            .count();
        assert_eq!(table_rows, 3);
    }
}
