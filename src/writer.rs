//! Concurrent materialisation of resolved assets into the output directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::error::{ExtractError, ExtractResult};
use crate::models::{AssetPayload, WriteOutcome, WriteTask};

/// Writes resolved tasks into one output directory using a pool of workers.
#[derive(Debug)]
pub struct AssetWriter {
    output_dir: PathBuf,
    pool: Option<rayon::ThreadPool>,
}

impl AssetWriter {
    /// Prepare `output_dir`, creating it when absent.
    ///
    /// `worker_threads == 0` uses rayon's global pool.
    pub fn new(output_dir: PathBuf, worker_threads: usize) -> ExtractResult<Self> {
        fs::create_dir_all(&output_dir).map_err(|err| ExtractError::io(&output_dir, err))?;

        let pool = if worker_threads == 0 {
            None
        } else {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(worker_threads)
                .thread_name(|index| format!("asset-writer-{index}"))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(err) => {
                    log::warn!("falling back to the global thread pool: {err}");
                    None
                }
            }
        };

        Ok(Self { output_dir, pool })
    }

    /// Directory receiving the assets.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every task, returning one outcome per task in task order.
    ///
    /// Blocks until all workers finish. A failing task never affects its siblings.
    pub fn write_all(&self, tasks: &[WriteTask]) -> Vec<WriteOutcome> {
        let run = || {
            tasks
                .par_iter()
                .map(|task| self.write_one(task))
                .collect::<Vec<_>>()
        };
        let outcomes = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };

        let written = outcomes.iter().filter(|outcome| outcome.is_written()).count();
        log::info!(
            "saved {written} of {} asset(s) to {}",
            outcomes.len(),
            self.output_dir.display()
        );
        outcomes
    }

    fn write_one(&self, task: &WriteTask) -> WriteOutcome {
        let target = self.output_dir.join(&task.target);
        match write_payload(&target, &task.payload) {
            Ok(()) => {
                log::debug!("wrote {}", target.display());
                WriteOutcome::Written(target)
            }
            Err(err) => {
                log::error!("failed to save {}: {err}", target.display());
                WriteOutcome::Failed {
                    target,
                    reason: err.to_string(),
                }
            }
        }
    }
}

fn write_payload(target: &Path, payload: &AssetPayload) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    match payload {
        AssetPayload::Bytes(bytes) => fs::write(target, bytes),
        AssetPayload::File(source) => fs::copy(source, target).map(|_| ()),
    }
}
