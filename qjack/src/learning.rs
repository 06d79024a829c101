//! Tabular Q-learning over a hand-discretized blackjack state space.

pub mod agent;
pub mod converter;
pub mod policy_table;
pub mod state;
