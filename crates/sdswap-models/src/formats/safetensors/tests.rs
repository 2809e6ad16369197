//! SafeTensors codec tests

use super::*;
use candle_core::Device as CandleDevice;
use tempfile::TempDir;

fn sample_weights() -> WeightDictionary {
    let mut weights = WeightDictionary::new();
    weights.insert(
        "model.diffusion_model.out.2.weight",
        Tensor::new(&[[1f32, 2.], [3., 4.]], &CandleDevice::Cpu).unwrap(),
    );
    weights.insert(
        "first_stage_model.decoder.conv_out.bias",
        Tensor::new(&[0.5f32, -0.5, 0.25], &CandleDevice::Cpu).unwrap().to_dtype(DType::F16).unwrap(),
    );
    weights.insert("cond_stage_model.transformer.text_model.embeddings.position_ids", {
        Tensor::new(&[0i64, 1, 2, 3], &CandleDevice::Cpu).unwrap()
    });
    weights
}

#[test]
fn test_safetensors_header_detection() {
    let codec = SafeTensorsCodec::new(Device::Cpu);

    let header = r#"{"w":{"dtype":"F32","shape":[1],"data_offsets":[0,4]}}"#;
    let mut data = Vec::new();
    data.extend_from_slice(&(header.len() as u64).to_le_bytes());
    data.extend_from_slice(header.as_bytes());
    assert!(codec.sniff(&data));

    let mut bad = Vec::new();
    bad.extend_from_slice(&u64::MAX.to_le_bytes());
    bad.extend_from_slice(b"{");
    assert!(!codec.sniff(&bad));
    assert!(!codec.sniff(b"PK\x03\x04"));
}

#[test]
fn test_write_then_read_preserves_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model.safetensors");
    let codec = SafeTensorsCodec::new(Device::Cpu);

    codec.write(&sample_weights(), &path).unwrap();
    let payload = codec.read(&path, None).unwrap();
    assert!(!payload.is_enveloped());

    let names: Vec<&str> = payload.entries().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "cond_stage_model.transformer.text_model.embeddings.position_ids",
            "first_stage_model.decoder.conv_out.bias",
            "model.diffusion_model.out.2.weight",
        ]
    );

    let read = WeightDictionary::from_iter(payload.into_entries());
    let w = read.get("model.diffusion_model.out.2.weight").unwrap();
    assert_eq!(w.dims(), &[2, 2]);
    assert_eq!(w.to_vec2::<f32>().unwrap(), vec![vec![1., 2.], vec![3., 4.]]);

    let b = read.get("first_stage_model.decoder.conv_out.bias").unwrap();
    assert_eq!(b.dtype(), DType::F16);
    let b = b.to_dtype(DType::F32).unwrap().to_vec1::<f32>().unwrap();
    assert_eq!(b, vec![0.5, -0.5, 0.25]);
}

#[test]
fn test_written_file_carries_format_metadata() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("meta.safetensors");
    SafeTensorsCodec::new(Device::Cpu).write(&sample_weights(), &path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let (_, metadata) = safetensors::SafeTensors::read_metadata(&bytes).unwrap();
    let meta = metadata.metadata().as_ref().unwrap();
    assert_eq!(meta.get("format").map(String::as_str), Some("pt"));
}

#[test]
fn test_device_hint_is_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hint.safetensors");
    let codec = SafeTensorsCodec::new(Device::Cpu);
    codec.write(&sample_weights(), &path).unwrap();

    // a GPU hint must not be honoured; the codec's own device is used
    let payload = codec.read(&path, Some(Device::Cuda(0))).unwrap();
    assert!(payload.entries().iter().all(|(_, t)| t.device().is_cpu()));
}

#[test]
fn test_corrupt_file_is_loading_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.safetensors");
    std::fs::write(&path, b"\x05\x00\x00\x00\x00\x00\x00\x00{oops").unwrap();

    let err = SafeTensorsCodec::new(Device::Cpu).read(&path, None).unwrap_err();
    assert!(err.to_string().contains("cannot decode"));
}
