//! Decoding of legacy `.ckpt` archives in the torch zip layout.
//!
//! `enveloped.ckpt` wraps two tensors in a `state_dict` entry next to a `global_step`
//! integer; one of them uses a legacy text-encoder name. `flat.ckpt` stores two tensors
//! at the top level. Every tensor is a two-element f32 vector.

#![cfg(feature = "pickle-codec")]

use sdswap_common::SwapConfig;
use sdswap_models::formats::pickle::PickleCodec;
use sdswap_models::{
    ArtifactCodec, CheckpointFormat, CodecRegistry, KeyMigration, RawPayload, STATE_DICT_KEY,
};
use std::path::PathBuf;

const LEGACY_EMBEDDING: &str = "cond_stage_model.transformer.embeddings.token_embedding.weight";
const MIGRATED_EMBEDDING: &str =
    "cond_stage_model.transformer.text_model.embeddings.token_embedding.weight";
const UNET_OUT: &str = "model.diffusion_model.out.weight";
const VAE_OUT: &str = "first_stage_model.decoder.conv_out.weight";

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

fn values(payload: &RawPayload, name: &str) -> Vec<f32> {
    let (_, tensor) = payload
        .entries()
        .iter()
        .find(|(n, _)| n == name)
        .unwrap_or_else(|| panic!("missing tensor {name}"));
    tensor.to_vec1::<f32>().unwrap()
}

// ── Envelope detection ───────────────────────────────────────────────────────

#[test]
fn test_enveloped_checkpoint_reports_state_dict() {
    let payload = PickleCodec.read(&fixture("enveloped.ckpt"), None).unwrap();

    match &payload {
        RawPayload::Enveloped { key, entries } => {
            assert_eq!(key, STATE_DICT_KEY);
            assert_eq!(entries.len(), 2);
        }
        RawPayload::Flat(_) => panic!("expected an enveloped payload"),
    }
    assert_eq!(values(&payload, LEGACY_EMBEDDING), vec![1.0, 2.0]);
    assert_eq!(values(&payload, UNET_OUT), vec![3.0, 4.0]);
}

#[test]
fn test_flat_checkpoint_falls_back_to_top_level() {
    let payload = PickleCodec.read(&fixture("flat.ckpt"), None).unwrap();

    assert!(!payload.is_enveloped());
    assert_eq!(payload.len(), 2);
    assert_eq!(values(&payload, UNET_OUT), vec![5.0, 6.0]);
    assert_eq!(values(&payload, VAE_OUT), vec![7.0, 8.0]);
}

// ── Normalization ────────────────────────────────────────────────────────────

#[test]
fn test_normalize_migrates_legacy_names_from_archive() {
    let payload = PickleCodec.read(&fixture("enveloped.ckpt"), None).unwrap();
    let weights = KeyMigration::default().normalize(payload);

    assert_eq!(weights.sorted_keys(), vec![MIGRATED_EMBEDDING, UNET_OUT]);
    assert!(!weights.contains_key(LEGACY_EMBEDDING));
    let embedding = weights.get(MIGRATED_EMBEDDING).unwrap().to_vec1::<f32>().unwrap();
    assert_eq!(embedding, vec![1.0, 2.0]);
}

#[test]
fn test_normalize_keeps_flat_names() {
    let payload = PickleCodec.read(&fixture("flat.ckpt"), None).unwrap();
    let weights = KeyMigration::default().normalize(payload);

    assert_eq!(weights.sorted_keys(), vec![VAE_OUT, UNET_OUT]);
}

// ── Registry ─────────────────────────────────────────────────────────────────

#[test]
fn test_registry_detects_archive_by_content() {
    let dir = tempfile::tempdir().unwrap();
    let renamed = dir.path().join("enveloped.bin");
    std::fs::copy(fixture("enveloped.ckpt"), &renamed).unwrap();

    let registry = CodecRegistry::with_defaults(&SwapConfig::default());
    let format = registry.detect_format(&renamed).unwrap();
    assert_eq!(format, CheckpointFormat::LegacyPickle);

    let payload = registry.read(&renamed, format, None).unwrap();
    assert!(payload.is_enveloped());
}
