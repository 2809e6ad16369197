//! Lenient application of a weight dictionary to a model

use crate::collaborators::CheckpointModel;
use sdswap_common::Result;
use sdswap_models::WeightDictionary;
use std::collections::HashSet;
use tracing::{debug, info};

/// What a lenient apply matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub applied: usize,
    /// In the dictionary, not in the model. Sorted.
    pub unexpected: Vec<String>,
    /// In the model, not in the dictionary. Sorted.
    pub missing: Vec<String>,
}

impl LoadReport {
    pub fn is_exact(&self) -> bool {
        self.unexpected.is_empty() && self.missing.is_empty()
    }
}

/// Assign every parameter the model knows; tolerate extras and gaps on either side.
pub fn apply_lenient<M: CheckpointModel>(
    model: &mut M,
    weights: &WeightDictionary,
) -> Result<LoadReport> {
    let expected: HashSet<String> = model.parameter_names().into_iter().collect();
    let mut report = LoadReport::default();

    for name in weights.sorted_keys() {
        match weights.get(name) {
            Some(tensor) if expected.contains(name) => {
                model.assign(name, tensor)?;
                report.applied += 1;
            }
            _ => report.unexpected.push(name.to_string()),
        }
    }

    report.missing = expected.into_iter().filter(|n| !weights.contains_key(n)).collect();
    report.missing.sort_unstable();

    if !report.is_exact() {
        info!(
            "Applied {} tensors ({} unexpected, {} missing)",
            report.applied,
            report.unexpected.len(),
            report.missing.len()
        );
        debug!("Unexpected: {:?}", report.unexpected);
        debug!("Missing: {:?}", report.missing);
    }
    Ok(report)
}
