use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::TrainingMetrics;
use crate::{Error, Result};

const HEADER: &str =
    "episode,elapsed_sec,win_rate,loss_rate,push_rate,avg_reward,bust_rate,epsilon,states_learned";

/// Appends one CSV row per evaluation to `<log_dir>/training_<unix-seconds>.csv`.
pub struct MetricsLogger {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl MetricsLogger {
    pub fn create(log_dir: &Path) -> Result<Self> {
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        Self::create_at(log_dir.join(format!("training_{}.csv", time)))
    }

    pub fn create_at(path: PathBuf) -> Result<Self> {
        let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        let mut logger = MetricsLogger {
            path,
            writer: BufWriter::new(file),
        };
        logger.write_line(HEADER)?;
        Ok(logger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushed per row so the file is readable while training runs.
    pub fn log(&mut self, metrics: &TrainingMetrics) -> Result<()> {
        let row = format!(
            "{},{:.3},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{}",
            metrics.total_episodes,
            metrics.elapsed_secs,
            metrics.win_rate,
            metrics.loss_rate,
            metrics.push_rate,
            metrics.avg_reward,
            metrics.bust_rate,
            metrics.current_epsilon,
            metrics.states_learned
        );
        self.write_line(&row)
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{}", line)
            .and_then(|_| self.writer.flush())
            .map_err(|e| Error::io(&self.path, e))
    }
}
