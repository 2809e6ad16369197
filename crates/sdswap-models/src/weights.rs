//! In-memory weight dictionaries and raw decoded payloads

use candle_core::Tensor;
use sdswap_common::Result;
use std::collections::HashMap;
use std::collections::hash_map;

/// Envelope key some serializers wrap the parameter mapping in.
pub const STATE_DICT_KEY: &str = "state_dict";

/// Mapping from parameter name to tensor.
#[derive(Debug, Clone, Default)]
pub struct WeightDictionary {
    tensors: HashMap<String, Tensor>,
}

impl WeightDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    /// Insert a tensor, returning the one previously stored under `name`.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) -> Option<Tensor> {
        self.tensors.insert(name.into(), tensor)
    }

    pub fn remove(&mut self, name: &str) -> Option<Tensor> {
        self.tensors.remove(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    /// Parameter names in lexicographic order.
    pub fn sorted_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        keys
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, Tensor> {
        self.tensors.iter()
    }

    /// Total payload size of all tensors in bytes.
    pub fn total_bytes(&self) -> usize {
        self.tensors.values().map(|t| t.elem_count() * t.dtype().size_in_bytes()).sum()
    }

    /// Copy every tensor into fresh storage.
    ///
    /// `Clone` shares tensor storage; the cache needs copies that later in-place
    /// mutation of the live model cannot reach.
    pub fn deep_copy(&self) -> Result<Self> {
        let mut tensors = HashMap::with_capacity(self.tensors.len());
        for (name, tensor) in &self.tensors {
            tensors.insert(name.clone(), tensor.copy()?);
        }
        Ok(Self { tensors })
    }
}

impl FromIterator<(String, Tensor)> for WeightDictionary {
    fn from_iter<I: IntoIterator<Item = (String, Tensor)>>(iter: I) -> Self {
        Self { tensors: iter.into_iter().collect() }
    }
}

impl From<HashMap<String, Tensor>> for WeightDictionary {
    fn from(tensors: HashMap<String, Tensor>) -> Self {
        Self { tensors }
    }
}

impl IntoIterator for WeightDictionary {
    type Item = (String, Tensor);
    type IntoIter = hash_map::IntoIter<String, Tensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.tensors.into_iter()
    }
}

impl<'a> IntoIterator for &'a WeightDictionary {
    type Item = (&'a String, &'a Tensor);
    type IntoIter = hash_map::Iter<'a, String, Tensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.tensors.iter()
    }
}

/// Decoded artifact contents before schema normalization.
///
/// Entries keep the order the codec produced them in, so key collisions during
/// migration resolve deterministically (later entries win).
#[derive(Debug, Clone)]
pub enum RawPayload {
    /// Parameters at the top level.
    Flat(Vec<(String, Tensor)>),
    /// Parameters nested under an envelope key.
    Enveloped { key: String, entries: Vec<(String, Tensor)> },
}

impl RawPayload {
    pub fn is_enveloped(&self) -> bool {
        matches!(self, RawPayload::Enveloped { .. })
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn entries(&self) -> &[(String, Tensor)] {
        match self {
            RawPayload::Flat(entries) | RawPayload::Enveloped { entries, .. } => entries,
        }
    }

    /// Strip the envelope, if any.
    pub fn into_entries(self) -> Vec<(String, Tensor)> {
        match self {
            RawPayload::Flat(entries) | RawPayload::Enveloped { entries, .. } => entries,
        }
    }
}
