use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TrainError;
use crate::model::Mlp;
use crate::training::Adam;

/// Durable snapshot of the model, the optimizer moments, and the step
/// counter at which it was taken.
#[derive(Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub model: Mlp,
    pub optimizer: Adam,
    pub global_step: u64,
    pub loss: f32,
}

/// Filename contract: `step-<global_step>-loss-<loss>-mark-<run_mark>`.
pub fn checkpoint_name(global_step: u64, loss: f32, mark: &str) -> String {
    format!("step-{global_step}-loss-{loss}-mark-{mark}")
}

/// Writes the checkpoint as `<dir>/<name>.bin`, creating the directory if
/// needed. Returns the path written. I/O failures are fatal; no retry.
pub fn save_checkpoint(
    dir: &Path,
    name: &str,
    checkpoint: &Checkpoint,
) -> Result<PathBuf, TrainError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{name}.bin"));
    let file = File::create(&path)?;
    bincode::serialize_into(BufWriter::new(file), checkpoint)?;
    Ok(path)
}

/// Loads a checkpoint written by [`save_checkpoint`]. Any failure here is a
/// restore failure: the run aborts before training begins.
pub fn load_checkpoint(path: &Path) -> Result<Checkpoint, TrainError> {
    let file = File::open(path)
        .map_err(|e| TrainError::Restore(format!("{}: {e}", path.display())))?;
    bincode::deserialize_from(BufReader::new(file))
        .map_err(|e| TrainError::Restore(format!("{}: {e}", path.display())))
}

/// Deletes every file in the checkpoint's directory whose name starts with
/// the checkpoint's file stem. A missing directory or zero matching files
/// is a no-op, never an error.
pub fn remove_by_prefix(path: &Path) -> Result<(), TrainError> {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return Ok(());
    };
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with(stem) {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}
