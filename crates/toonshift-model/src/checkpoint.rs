//! Training checkpoints
//!
//! A checkpoint is a safetensors parameter file plus a small JSON sidecar
//! carrying the epoch counter and the optimizer hyperparameters, keyed by
//! model name and an optional suffix: `<name><suffix>.safetensors` /
//! `<name><suffix>.json`.

use crate::error::ModelError;
use candle_nn::VarMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Optimizer hyperparameters recorded alongside the weights.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizerMeta {
    pub kind: String,
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
}

impl Default for OptimizerMeta {
    fn default() -> Self {
        Self {
            kind: "adam".to_string(),
            learning_rate: 2e-4,
            beta1: 0.5,
            beta2: 0.999,
        }
    }
}

/// Everything in a checkpoint that is not a tensor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CheckpointMeta {
    pub epoch: usize,
    #[serde(default)]
    pub optimizer: Option<OptimizerMeta>,
}

fn checkpoint_paths(dir: &Path, name: &str, suffix: &str) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("{name}{suffix}.safetensors")),
        dir.join(format!("{name}{suffix}.json")),
    )
}

/// Persist the model parameters and metadata.
pub fn save_checkpoint(
    varmap: &VarMap,
    dir: impl AsRef<Path>,
    name: &str,
    suffix: &str,
    meta: &CheckpointMeta,
) -> Result<PathBuf, ModelError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let (weights_path, meta_path) = checkpoint_paths(dir, name, suffix);
    varmap.save(&weights_path)?;
    std::fs::write(&meta_path, serde_json::to_string_pretty(meta)?)?;

    info!(path = %weights_path.display(), epoch = meta.epoch, "checkpoint saved");
    Ok(weights_path)
}

/// Restore model parameters into a live network's [`VarMap`].
///
/// Loading is strict: every parameter the network defines must be present in
/// the file under the same name, otherwise the whole load fails and the map
/// is left to be re-initialized by the caller. Extra tensors in the file are
/// ignored.
pub fn load_checkpoint(
    varmap: &mut VarMap,
    dir: impl AsRef<Path>,
    name: &str,
    suffix: &str,
) -> Result<CheckpointMeta, ModelError> {
    let dir = dir.as_ref();
    let (weights_path, meta_path) = checkpoint_paths(dir, name, suffix);

    if !weights_path.is_file() {
        return Err(ModelError::CheckpointNotFound(weights_path));
    }

    varmap
        .load(&weights_path)
        .map_err(|source| ModelError::StrictLoad {
            path: weights_path.clone(),
            source,
        })?;

    let meta = match std::fs::read_to_string(&meta_path) {
        Ok(raw) => serde_json::from_str(&raw)?,
        Err(_) => {
            warn!(path = %meta_path.display(), "checkpoint has no metadata sidecar");
            CheckpointMeta::default()
        }
    };

    info!(path = %weights_path.display(), epoch = meta.epoch, "checkpoint loaded");
    Ok(meta)
}
