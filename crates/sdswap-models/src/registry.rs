//! Checkpoint discovery and lookup
//!
//! A scan walks the configured storage roots, fingerprints every recognised artifact and
//! builds one [`CheckpointRecord`] per file. Records are keyed by title; a later record
//! with the same title replaces the earlier one in place.

use crate::fingerprint::fingerprint;
use crate::record::{CheckpointFormat, CheckpointRecord};
use sdswap_common::{ModelError, Result, SwapConfig};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Where and how to look for checkpoints.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub models_dir: PathBuf,
    pub extra_dir: Option<PathBuf>,
    /// Explicitly preferred artifact; registered first and becomes the selection.
    pub preferred: Option<PathBuf>,
    /// Suppresses the "preferred not found" warning for the implicit default.
    pub preferred_is_default: bool,
    /// Architecture config for checkpoints without a sidecar `.yaml`.
    pub fallback_config: PathBuf,
}

impl From<&SwapConfig> for ScanOptions {
    fn from(config: &SwapConfig) -> Self {
        Self {
            models_dir: config.storage.models_dir.clone(),
            extra_dir: config.storage.extra_dir.clone(),
            preferred: config.storage.preferred_checkpoint.clone(),
            preferred_is_default: config.preferred_is_default(),
            fallback_config: config.storage.fallback_config.clone(),
        }
    }
}

/// Outcome of resolving the selected title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Exact(CheckpointRecord),
    /// The requested title was unknown; the first registered record stands in.
    Fallback { requested: Option<String>, record: CheckpointRecord },
}

impl Resolution {
    pub fn record(&self) -> &CheckpointRecord {
        match self {
            Resolution::Exact(record) | Resolution::Fallback { record, .. } => record,
        }
    }

    pub fn into_record(self) -> CheckpointRecord {
        match self {
            Resolution::Exact(record) | Resolution::Fallback { record, .. } => record,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::Fallback { .. })
    }
}

/// Title-keyed set of discovered checkpoints.
#[derive(Debug, Clone, Default)]
pub struct CheckpointRegistry {
    records: Vec<CheckpointRecord>,
    index: HashMap<String, usize>,
    preferred_title: Option<String>,
    searched: Vec<String>,
}

impl CheckpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover every checkpoint reachable from `options`.
    ///
    /// Missing directories are skipped. Files are visited in file-name order so titles
    /// are assigned deterministically.
    pub fn scan(options: &ScanOptions) -> Result<Self> {
        let models_dir = std::path::absolute(&options.models_dir)?;
        let extra_dir = options.extra_dir.as_deref().map(std::path::absolute).transpose()?;
        let fallback_config = std::path::absolute(&options.fallback_config)?;

        let mut registry = Self::new();
        let mut seen = HashSet::new();

        if let Some(preferred) = &options.preferred {
            let preferred = std::path::absolute(preferred)?;
            registry.searched.push(format!("file {}", preferred.display()));

            if preferred.is_file() {
                let record =
                    build_record(&preferred, &models_dir, extra_dir.as_deref(), &fallback_config);
                info!("Preferred checkpoint: {}", record.title());
                registry.preferred_title = Some(record.title().to_string());
                registry.insert(record);
                seen.insert(preferred);
            } else if !options.preferred_is_default {
                warn!(
                    "Preferred checkpoint not found (possibly moved to {}): {}",
                    models_dir.display(),
                    preferred.display()
                );
            }
        }

        registry.searched.push(format!("directory {}", models_dir.display()));
        if let Some(extra) = &extra_dir {
            registry.searched.push(format!("directory {}", extra.display()));
        }

        let mut roots = Vec::with_capacity(2);
        if let Some(extra) = &extra_dir
            && *extra != models_dir
        {
            roots.push(extra.as_path());
        }
        roots.push(models_dir.as_path());

        for root in roots {
            for path in discover(root) {
                if !seen.insert(path.clone()) {
                    continue;
                }
                let record =
                    build_record(&path, &models_dir, extra_dir.as_deref(), &fallback_config);
                registry.insert(record);
            }
        }

        info!("Found {} checkpoint(s)", registry.len());
        Ok(registry)
    }

    /// Register a record; a record with the same title is replaced in place.
    pub fn insert(&mut self, record: CheckpointRecord) {
        match self.index.get(record.title()) {
            Some(&idx) => {
                debug!("Replacing checkpoint {}", record.title());
                self.records[idx] = record;
            }
            None => {
                self.index.insert(record.title().to_string(), self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in registration order.
    pub fn records(&self) -> &[CheckpointRecord] {
        &self.records
    }

    pub fn get(&self, title: &str) -> Option<&CheckpointRecord> {
        self.index.get(title).map(|&idx| &self.records[idx])
    }

    /// Title of the preferred artifact, if it was found during the scan.
    pub fn preferred_title(&self) -> Option<&str> {
        self.preferred_title.as_deref()
    }

    /// Human-readable list of every location the scan looked at.
    pub fn searched_locations(&self) -> &[String] {
        &self.searched
    }

    /// All titles in natural order.
    pub fn titles_sorted(&self) -> Vec<&str> {
        let mut titles: Vec<&str> = self.records.iter().map(CheckpointRecord::title).collect();
        titles.sort_by(|a, b| natural_cmp(a, b));
        titles
    }

    /// Shortest title containing `fragment`; ties go to the earliest registered.
    pub fn closest_match(&self, fragment: &str) -> Option<&CheckpointRecord> {
        self.records
            .iter()
            .filter(|r| r.title().contains(fragment))
            .min_by_key(|r| r.title().chars().count())
    }

    /// Resolve the active selection, falling back to the first record.
    pub fn resolve_selected(&self, requested: Option<&str>) -> Result<Resolution> {
        if let Some(record) = requested.and_then(|title| self.get(title)) {
            return Ok(Resolution::Exact(record.clone()));
        }

        let Some(first) = self.records.first() else {
            return Err(ModelError::NoCheckpoints { searched: self.searched.clone() }.into());
        };

        if let Some(title) = requested {
            warn!("Checkpoint {} not found; loading fallback {}", title, first.title());
        }
        Ok(Resolution::Fallback { requested: requested.map(str::to_string), record: first.clone() })
    }
}

fn discover(root: &Path) -> Vec<PathBuf> {
    if !root.is_dir() {
        debug!("Skipping missing checkpoint directory {}", root.display());
        return Vec::new();
    }

    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Error walking {}: {}", root.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| CheckpointFormat::from_path(path).is_some())
        .collect()
}

fn build_record(
    path: &Path,
    models_dir: &Path,
    extra_dir: Option<&Path>,
    fallback_config: &Path,
) -> CheckpointRecord {
    // callers only pass recognised extensions
    let format = CheckpointFormat::from_path(path).unwrap_or(CheckpointFormat::LegacyPickle);

    let relative = extra_dir
        .and_then(|extra| path.strip_prefix(extra).ok())
        .or_else(|| path.strip_prefix(models_dir).ok())
        .map(Path::to_path_buf)
        .or_else(|| path.file_name().map(PathBuf::from))
        .unwrap_or_else(|| path.to_path_buf());
    let name = relative.to_string_lossy().trim_start_matches(['/', '\\']).to_string();

    let hash = fingerprint(path);
    let title = format!("{name} [{}] [{hash}]", format.label());
    let short_name = short_name(&name);
    let config_path = sidecar_config(path).unwrap_or_else(|| fallback_config.to_path_buf());

    debug!("Registered {} (config {})", title, config_path.display());
    CheckpointRecord::new(path, title, hash, short_name, config_path, format)
}

/// Relative name with separators flattened and the extension dropped.
fn short_name(name: &str) -> String {
    let flat = name.replace(['/', '\\'], "_");
    match flat.rfind('.') {
        Some(dot) if dot > 0 => flat[..dot].to_string(),
        _ => flat,
    }
}

fn sidecar_config(path: &Path) -> Option<PathBuf> {
    let candidate = path.with_extension("yaml");
    candidate.is_file().then_some(candidate)
}

/// Human-friendly ordering: digit runs compare numerically, the rest case-insensitively.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let ka = natural_key(a);
    let kb = natural_key(b);

    for (i, (x, y)) in ka.iter().zip(kb.iter()).enumerate() {
        let ord = if i % 2 == 0 { x.cmp(y) } else { cmp_digits(x, y) };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    ka.len().cmp(&kb.len())
}

// Alternating text/digit chunks, always starting with a (possibly empty) text chunk.
// Text chunks are lowercased.
fn natural_key(s: &str) -> Vec<String> {
    let mut chunks = vec![String::new()];
    let mut in_digits = false;

    for c in s.chars() {
        let is_digit = c.is_ascii_digit();
        if is_digit != in_digits {
            chunks.push(String::new());
            in_digits = is_digit;
        }
        if let Some(last) = chunks.last_mut() {
            if is_digit {
                last.push(c);
            } else {
                last.extend(c.to_lowercase());
            }
        }
    }
    chunks
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_sort_by_value() {
        let mut titles = vec!["model10.ckpt", "Model2.ckpt", "model1.ckpt"];
        titles.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(titles, vec!["model1.ckpt", "Model2.ckpt", "model10.ckpt"]);
    }

    #[test]
    fn case_is_ignored_and_sort_is_stable() {
        let mut titles = vec!["B.ckpt", "a.ckpt", "b.ckpt"];
        titles.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(titles, vec!["a.ckpt", "B.ckpt", "b.ckpt"]);
    }

    #[test]
    fn leading_zeros_compare_numerically() {
        assert_eq!(natural_cmp("v007", "v7"), Ordering::Equal);
        assert_eq!(natural_cmp("v0100", "v99"), Ordering::Greater);
        assert_eq!(natural_cmp("123456789012345678901234567890", "9"), Ordering::Greater);
    }

    #[test]
    fn prefix_sorts_first() {
        assert_eq!(natural_cmp("sd", "sd-v1"), Ordering::Less);
        assert_eq!(natural_cmp("1abc", "abc"), Ordering::Less);
    }

    #[test]
    fn short_names_flatten_and_strip() {
        assert_eq!(short_name("sub/dir/model.ckpt"), "sub_dir_model");
        assert_eq!(short_name("v1.5.safetensors"), "v1.5");
        assert_eq!(short_name("plain"), "plain");
    }
}
