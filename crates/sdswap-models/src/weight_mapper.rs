//! Legacy parameter-name migration
//!
//! Older checkpoints store the text encoder without the `text_model` level that the
//! current schema expects. [`KeyMigration`] rewrites those prefixes and unwraps the
//! `state_dict` envelope so every codec hands back the same flat schema.

use crate::weights::{RawPayload, WeightDictionary};
use sdswap_common::{Result, SwapError};
use tracing::debug;

/// Prefix rewrites applied to legacy checkpoints, in order.
pub const LEGACY_KEY_PREFIXES: [(&str, &str); 3] = [
    (
        "cond_stage_model.transformer.embeddings.",
        "cond_stage_model.transformer.text_model.embeddings.",
    ),
    (
        "cond_stage_model.transformer.encoder.",
        "cond_stage_model.transformer.text_model.encoder.",
    ),
    (
        "cond_stage_model.transformer.final_layer_norm.",
        "cond_stage_model.transformer.text_model.final_layer_norm.",
    ),
];

/// Ordered prefix-rewrite table.
///
/// Construction rejects tables whose rewritten prefixes overlap a legacy prefix, so
/// normalizing an already-normalized dictionary never changes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMigration {
    rules: Vec<(String, String)>,
}

impl Default for KeyMigration {
    fn default() -> Self {
        Self {
            rules: LEGACY_KEY_PREFIXES
                .iter()
                .map(|(old, new)| (old.to_string(), new.to_string()))
                .collect(),
        }
    }
}

impl KeyMigration {
    pub fn new<I, S>(rules: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let rules: Vec<(String, String)> =
            rules.into_iter().map(|(old, new)| (old.into(), new.into())).collect();

        for (old, _) in &rules {
            if old.is_empty() {
                return Err(SwapError::Validation("Empty legacy prefix in key migration".to_string()));
            }
            for (_, new) in &rules {
                if new.starts_with(old.as_str()) || old.starts_with(new.as_str()) {
                    return Err(SwapError::Validation(format!(
                        "Key migration is not idempotent: '{new}' overlaps legacy prefix '{old}'"
                    )));
                }
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[(String, String)] {
        &self.rules
    }

    /// Rewrite one parameter name. Rules apply in order, each to the running result.
    pub fn migrate_key(&self, key: &str) -> String {
        let mut key = key.to_string();
        for (old, new) in &self.rules {
            if let Some(rest) = key.strip_prefix(old.as_str()) {
                key = format!("{new}{rest}");
            }
        }
        key
    }

    /// Unwrap the envelope and migrate every name.
    ///
    /// When two entries migrate to the same name, the later one wins.
    pub fn normalize(&self, payload: RawPayload) -> WeightDictionary {
        if let RawPayload::Enveloped { key, entries } = &payload {
            debug!("Unwrapping '{}' envelope ({} entries)", key, entries.len());
        }
        self.migrate_entries(payload.into_entries())
    }

    /// Migrate the names of an already-flat dictionary.
    pub fn normalize_dict(&self, weights: WeightDictionary) -> WeightDictionary {
        self.migrate_entries(weights)
    }

    /// `(from, to)` pairs for names the table would rewrite, without touching tensors.
    pub fn dry_run<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<(String, String)> {
        names
            .into_iter()
            .filter_map(|name| {
                let migrated = self.migrate_key(name);
                (migrated != name).then(|| (name.to_string(), migrated))
            })
            .collect()
    }

    fn migrate_entries<I>(&self, entries: I) -> WeightDictionary
    where
        I: IntoIterator<Item = (String, candle_core::Tensor)>,
    {
        let mut renamed = 0usize;
        let mut out = WeightDictionary::new();
        for (name, tensor) in entries {
            let migrated = self.migrate_key(&name);
            if migrated != name {
                renamed += 1;
            }
            if out.insert(migrated.clone(), tensor).is_some() {
                debug!("Migrated name {} collided; keeping later entry", migrated);
            }
        }
        if renamed > 0 {
            debug!("Migrated {} legacy parameter name(s)", renamed);
        }
        out
    }
}
