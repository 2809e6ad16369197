//! Error handling tests for sdswap-common

use proptest::prelude::*;
use sdswap_common::*;
use std::io;

#[test]
fn test_swap_error_variants() {
    let config_error = SwapError::Config("bad cache size".to_string());
    assert_eq!(format!("{}", config_error), "Configuration error: bad cache size");

    let validation_error = SwapError::Validation("shape".to_string());
    assert_eq!(format!("{}", validation_error), "Validation error: shape");

    let model_error = SwapError::Model(ModelError::NotFound { path: "/m/a.ckpt".to_string() });
    assert!(format!("{}", model_error).contains("/m/a.ckpt"));
}

#[test]
fn test_model_error_variants() {
    let not_found = ModelError::NotFound { path: "/nonexistent/model.ckpt".to_string() };
    assert_eq!(format!("{}", not_found), "Model not found: /nonexistent/model.ckpt");

    let invalid_format = ModelError::InvalidFormat { format: ".bin".to_string() };
    assert_eq!(format!("{}", invalid_format), "Invalid model format: .bin");

    let loading_failed = ModelError::LoadingFailed { reason: "truncated header".to_string() };
    assert_eq!(format!("{}", loading_failed), "Model loading failed: truncated header");

    let unavailable = ModelError::CodecUnavailable {
        format: "safetensors".to_string(),
        operation: "decoder".to_string(),
        path: "/m/b.safetensors".to_string(),
    };
    assert_eq!(
        format!("{}", unavailable),
        "No decoder available for safetensors artifacts (file: /m/b.safetensors)"
    );

    let empty = ModelError::NoCheckpoints {
        searched: vec!["file /m/model.ckpt".to_string(), "directory /m".to_string()],
    };
    assert_eq!(
        format!("{}", empty),
        "No checkpoints found. Searched: file /m/model.ckpt, directory /m"
    );
}

#[test]
fn test_error_conversions() {
    let swap_error: SwapError = ModelError::NotLoaded.into();
    assert!(matches!(swap_error, SwapError::Model(ModelError::NotLoaded)));

    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    let swap_error: SwapError = io_error.into();
    assert!(matches!(swap_error, SwapError::Io(_)));
}

#[test]
fn test_error_source_chain() {
    use std::error::Error;

    let swap_error = SwapError::Model(ModelError::LoadingFailed { reason: "inner".to_string() });
    assert!(swap_error.source().is_some());
    assert!(swap_error.to_string().contains("Model error"));
}

#[test]
fn test_error_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}

    assert_send_sync::<SwapError>();
    assert_send_sync::<ModelError>();
}

proptest! {
    #[test]
    fn test_config_error_with_arbitrary_strings(message in "\\PC*") {
        let text = SwapError::Config(message.clone()).to_string();
        prop_assert!(text.contains(&message));
    }

    #[test]
    fn test_not_found_with_arbitrary_paths(path in "\\PC*") {
        let text = ModelError::NotFound { path: path.clone() }.to_string();
        prop_assert!(text.contains(&path));
    }

    #[test]
    fn test_device_cuda_serde_roundtrip(idx in 0usize..=255) {
        let device = Device::Cuda(idx);
        let json = serde_json::to_string(&device).expect("serialize");
        let back: Device = serde_json::from_str(&json).expect("deserialize");
        prop_assert_eq!(back, device);
    }
}
