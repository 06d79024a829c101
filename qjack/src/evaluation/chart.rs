use std::fmt;

use crate::learning::agent::Agent;
use crate::learning::state::Action;
use crate::strategy::{audit_actions, audit_state, BasicStrategy};
use crate::Result;

/// Dealer up cards in chart column order.
const DEALER_COLUMNS: [u8; 10] = [2, 3, 4, 5, 6, 7, 8, 9, 10, 1];
const DEALER_LABELS: [&str; 10] = ["2", "3", "4", "5", "6", "7", "8", "9", "T", "A"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartCell {
    pub action: Action,
    pub matches: bool,
}

/// Greedy policy grids for hard and soft totals. Displayed uppercase where the
/// agent agrees with basic strategy and lowercase where it diverges.
#[derive(Debug, Clone)]
pub struct StrategyChart {
    hard_rows: Vec<(u8, [ChartCell; 10])>,
    soft_rows: Vec<(u8, [ChartCell; 10])>,
}

impl StrategyChart {
    pub fn build<A: Agent + ?Sized>(agent: &A, strategy: &BasicStrategy) -> Result<Self> {
        Ok(StrategyChart {
            hard_rows: build_rows(agent, strategy, 4..=21, false)?,
            soft_rows: build_rows(agent, strategy, 13..=21, true)?,
        })
    }

    pub fn hard_rows(&self) -> &[(u8, [ChartCell; 10])] {
        &self.hard_rows
    }

    pub fn soft_rows(&self) -> &[(u8, [ChartCell; 10])] {
        &self.soft_rows
    }

    fn write_grid(f: &mut fmt::Formatter<'_>, rows: &[(u8, [ChartCell; 10])]) -> fmt::Result {
        write!(f, "{:6}", "")?;
        for label in DEALER_LABELS {
            write!(f, "{:>3}", label)?;
        }
        writeln!(f)?;

        for (total, cells) in rows {
            write!(f, "{:>5} ", total)?;
            for cell in cells {
                let symbol = cell.action.symbol();
                let symbol = if cell.matches {
                    symbol
                } else {
                    symbol.to_ascii_lowercase()
                };
                write!(f, "  {}", symbol)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn build_rows<A: Agent + ?Sized>(
    agent: &A,
    strategy: &BasicStrategy,
    totals: std::ops::RangeInclusive<u8>,
    soft: bool,
) -> Result<Vec<(u8, [ChartCell; 10])>> {
    let mut rows = Vec::with_capacity(totals.clone().count());
    for total in totals {
        let mut cells = [ChartCell {
            action: Action::Hit,
            matches: true,
        }; 10];
        for (cell, &dealer) in cells.iter_mut().zip(DEALER_COLUMNS.iter()) {
            let state = audit_state(total, dealer, soft);
            let action = agent.greedy_action(&state, &audit_actions(&state))?;
            *cell = ChartCell {
                action,
                matches: strategy.is_correct_action(&state, action),
            };
        }
        rows.push((total, cells));
    }
    Ok(rows)
}

impl fmt::Display for StrategyChart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Strategy Chart ===")?;
        writeln!(f, "Legend: UPPER=matches basic strategy  lower=diverges")?;
        writeln!(f, "Actions: H=Hit S=Stand D=Double P=Split R=Surrender")?;
        writeln!(f, "\n--- Hard Totals ---")?;
        Self::write_grid(f, &self.hard_rows)?;
        writeln!(f, "\n--- Soft Totals ---")?;
        Self::write_grid(f, &self.soft_rows)
    }
}
