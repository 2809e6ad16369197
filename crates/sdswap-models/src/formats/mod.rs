//! Built-in checkpoint codecs

#[cfg(feature = "pickle-codec")]
pub mod pickle;
#[cfg(feature = "safetensors-codec")]
pub mod safetensors;
