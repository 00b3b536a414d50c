use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

/// Append-only scalar stream for one training run, written under
/// `<root>/run-<utc-timestamp>-<mark>/scalars.csv`. Writes are buffered;
/// the trainer flushes explicitly at every evaluation interval.
pub struct SummaryWriter {
    writer: BufWriter<File>,
    dir: PathBuf,
}

impl SummaryWriter {
    pub fn create(root: &Path, mark: &str) -> io::Result<Self> {
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let dir = root.join(format!("run-{stamp}-{mark}"));
        fs::create_dir_all(&dir)?;
        let file = File::create(dir.join("scalars.csv"))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "step,loss")?;
        Ok(Self { writer, dir })
    }

    /// Directory holding this run's stream.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn add_scalar(&mut self, step: u64, loss: f32) -> io::Result<()> {
        writeln!(self.writer, "{step},{loss}")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
