use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::state::{Action, State, NUM_ACTIONS, STATE_SPACE_SIZE};
use crate::{Error, Result};

/// Layout of the binary snapshot. Bump it whenever `State::index` changes.
pub const TABLE_VERSION: u32 = 1;

const VISITED_WORDS: usize = STATE_SPACE_SIZE / 64;
const RECORD_SIZE: usize = 4 + 4 + 3 + 8 * NUM_ACTIONS;

pub type QValues = [f64; NUM_ACTIONS];

/// Dense Q-table with one value vector per packed state index.
///
/// The `visited` bitset tells a learned slot from one that was never written;
/// reads of the latter return `default_value` for every action.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    values: Box<[QValues]>,
    visited: [u64; VISITED_WORDS],
    visited_count: usize,
    default_value: f64,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl PolicyTable {
    pub fn new(default_value: f64) -> Self {
        PolicyTable {
            values: vec![[default_value; NUM_ACTIONS]; STATE_SPACE_SIZE].into_boxed_slice(),
            visited: [0; VISITED_WORDS],
            visited_count: 0,
            default_value,
        }
    }

    pub fn default_value(&self) -> f64 {
        self.default_value
    }

    pub fn get(&self, state: &State, action: Action) -> f64 {
        let index = state.index();
        if self.is_visited_index(index) {
            self.values[index][action.index()]
        } else {
            self.default_value
        }
    }

    /// The whole value vector of a state, default-filled when never visited.
    pub fn values(&self, state: &State) -> QValues {
        let index = state.index();
        if self.is_visited_index(index) {
            self.values[index]
        } else {
            [self.default_value; NUM_ACTIONS]
        }
    }

    pub fn set(&mut self, state: &State, action: Action, value: f64) {
        let index = state.index();
        if !self.is_visited_index(index) {
            self.values[index] = [self.default_value; NUM_ACTIONS];
            self.mark_visited(index);
        }
        self.values[index][action.index()] = value;
    }

    pub fn is_visited(&self, state: &State) -> bool {
        self.is_visited_index(state.index())
    }

    /// Highest-valued action among `valid_actions`; the earliest one wins a tie.
    pub fn max_action(&self, state: &State, valid_actions: &[Action]) -> Option<Action> {
        let values = self.values(state);
        let mut best: Option<(Action, f64)> = None;
        for &action in valid_actions {
            let value = values[action.index()];
            match best {
                Some((_, best_value)) if value <= best_value => {}
                _ => best = Some((action, value)),
            }
        }
        best.map(|(action, _)| action)
    }

    /// Highest value among `valid_actions`, None when the slice is empty.
    pub fn max_q(&self, state: &State, valid_actions: &[Action]) -> Option<f64> {
        let values = self.values(state);
        valid_actions
            .iter()
            .map(|action| values[action.index()])
            .fold(None, |best, value| match best {
                Some(best) if best >= value => Some(best),
                _ => Some(value),
            })
    }

    /// Number of visited states.
    pub fn len(&self) -> usize {
        self.visited_count
    }

    pub fn is_empty(&self) -> bool {
        self.visited_count == 0
    }

    pub fn clear(&mut self) {
        self.values.fill([self.default_value; NUM_ACTIONS]);
        self.visited = [0; VISITED_WORDS];
        self.visited_count = 0;
    }

    /// Visited states with their values, in index order.
    pub fn iter(&self) -> impl Iterator<Item = (State, QValues)> + '_ {
        (0..STATE_SPACE_SIZE)
            .filter(|&index| self.is_visited_index(index))
            .map(|index| (State::from_index(index), self.values[index]))
    }

    /// Writes a versioned binary snapshot of every visited state.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);
        self.write_records(&mut writer)
            .and_then(|_| writer.flush())
            .map_err(|e| Error::io(path, e))
    }

    fn write_records<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&TABLE_VERSION.to_le_bytes())?;
        writer.write_all(&(self.visited_count as u64).to_le_bytes())?;

        for (state, values) in self.iter() {
            let mut record = Vec::with_capacity(RECORD_SIZE);
            record.extend_from_slice(&(state.player_total as i32).to_le_bytes());
            record.extend_from_slice(&(state.dealer_up_card as i32).to_le_bytes());
            record.push(state.has_usable_ace as u8);
            record.push(state.can_split as u8);
            record.push(state.can_double as u8);
            for value in values {
                record.extend_from_slice(&value.to_le_bytes());
            }
            writer.write_all(&record)?;
        }
        Ok(())
    }

    /// Replaces the table with a snapshot written by `save`. Records are
    /// re-indexed from their fields. On error the table is left untouched.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mut reader = BufReader::new(file);

        let version = u32::from_le_bytes(read_field(&mut reader, path, "header")?);
        if version != TABLE_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        let count = u64::from_le_bytes(read_field(&mut reader, path, "header")?);
        if count > STATE_SPACE_SIZE as u64 {
            return Err(Error::CorruptTable(format!(
                "{} records exceed the state space of {}",
                count, STATE_SPACE_SIZE
            )));
        }

        let mut loaded = PolicyTable::new(self.default_value);
        for _ in 0..count {
            let record: [u8; RECORD_SIZE] = read_field(&mut reader, path, "record")?;
            let (state, values) = decode_record(&record)?;
            let index = state.index();
            if !loaded.is_visited_index(index) {
                loaded.mark_visited(index);
            }
            loaded.values[index] = values;
        }

        *self = loaded;
        Ok(())
    }

    /// One CSV row per visited state, for offline inspection only.
    pub fn export_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);
        self.write_csv(&mut writer)
            .and_then(|_| writer.flush())
            .map_err(|e| Error::io(path, e))
    }

    fn write_csv<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(
            writer,
            "player_total,dealer_card,usable_ace,Q_HIT,Q_STAND,Q_DOUBLE,Q_SPLIT,Q_SURRENDER"
        )?;
        for (state, values) in self.iter() {
            write!(
                writer,
                "{},{},{}",
                state.player_total,
                state.dealer_up_card,
                if state.has_usable_ace { 1 } else { 0 }
            )?;
            for value in values {
                write!(writer, ",{:.6}", value)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    fn is_visited_index(&self, index: usize) -> bool {
        self.visited[index / 64] & (1 << (index % 64)) != 0
    }

    fn mark_visited(&mut self, index: usize) {
        self.visited[index / 64] |= 1 << (index % 64);
        self.visited_count += 1;
    }
}

fn read_field<const N: usize>(reader: &mut impl Read, path: &Path, what: &str) -> Result<[u8; N]> {
    let mut buffer = [0u8; N];
    match reader.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(Error::CorruptTable(format!(
            "{} truncated in {}",
            what,
            path.display()
        ))),
        Err(e) => Err(Error::io(path, e)),
    }
}

fn decode_record(record: &[u8; RECORD_SIZE]) -> Result<(State, QValues)> {
    let int_at = |offset: usize| {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&record[offset..offset + 4]);
        i32::from_le_bytes(bytes)
    };
    let bool_at = |offset: usize| match record[offset] {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(Error::CorruptTable(format!("invalid flag byte {}", other))),
    };

    let player_total = int_at(0);
    let dealer_up_card = int_at(4);
    if !(0..32).contains(&player_total) || !(0..16).contains(&dealer_up_card) {
        return Err(Error::CorruptTable(format!(
            "state ({}, {}) is outside the encodable range",
            player_total, dealer_up_card
        )));
    }

    let state = State::with_flags(
        player_total as u8,
        dealer_up_card as u8,
        bool_at(8)?,
        bool_at(9)?,
        bool_at(10)?,
    );

    let mut values = [0.0; NUM_ACTIONS];
    for (i, value) in values.iter_mut().enumerate() {
        let offset = 11 + i * 8;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&record[offset..offset + 8]);
        *value = f64::from_le_bytes(bytes);
    }
    Ok((state, values))
}
