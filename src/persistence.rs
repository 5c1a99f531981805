// File: src/persistence.rs
use crate::core::default_rule::DefaultRule;
use crate::core::discrepancy::Discrepancy;
use crate::core::inventory::SegmentInventory;
use crate::core::rule::Rule;
use crate::core::types::FeatureName;
use crate::error::Result;
use crate::learning::d2l::D2L;
use crate::learning::LearnerConfig;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tempfile::NamedTempFile;

/// Everything needed to predict with a trained model. Training pairs and
/// the discrepancy's collected evidence are not kept; its signature is.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
struct SerializableModel {
    config: LearnerConfig,
    inventory: SegmentInventory,
    feat_diff: Option<Vec<FeatureName>>,
    rule: Option<Rule>,
    default: Option<DefaultRule>,
}

/// Writes the model next to `path` first and renames it into place, so a
/// crash never leaves a half-written file behind.
pub fn save_to_disk(model: &D2L, path: &Path) -> Result<()> {
    let parent_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent_dir)?;

    let state = SerializableModel {
        config: model.config().clone(),
        inventory: model.inventory().clone(),
        feat_diff: model.discrepancy().map(|d| d.feat_diff().to_vec()),
        rule: model.rule().cloned(),
        default: model.default_rule().cloned(),
    };

    let temp_file = NamedTempFile::new_in(parent_dir)?;
    let writer = BufWriter::new(&temp_file);
    bincode::serialize_into(writer, &state)?;

    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub fn load_from_disk(path: &Path) -> Result<D2L> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let state: SerializableModel = bincode::deserialize_from(reader)?;
    tracing::debug!(path = %path.display(), feat_diff = ?state.feat_diff, "loaded model");

    Ok(D2L::from_trained(
        state.inventory,
        state.config,
        state.feat_diff.map(Discrepancy::new),
        state.rule,
        state.default,
    ))
}
