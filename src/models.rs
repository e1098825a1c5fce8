//! Cross-encoder model registry and inference device selection.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

const BGE_RERANKER_BASE: &str = "BAAI/bge-reranker-base";
const BGE_RERANKER_V2_M3: &str = "rozgo/bge-reranker-v2-m3";
const JINA_RERANKER_V1_TURBO_EN: &str = "jinaai/jina-reranker-v1-turbo-en";
const JINA_RERANKER_V2_BASE_MULTILINGUAL: &str = "jinaai/jina-reranker-v2-base-multilingual";

/// Static facts about an allowlisted cross-encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossEncoderSpec {
    pub id: &'static str,
    /// Longest (query, document) token sequence the model accepts
    pub max_length: usize,
}

const SUPPORTED: &[CrossEncoderSpec] = &[
    CrossEncoderSpec {
        id: BGE_RERANKER_BASE,
        max_length: 512,
    },
    CrossEncoderSpec {
        id: BGE_RERANKER_V2_M3,
        max_length: 8192,
    },
    CrossEncoderSpec {
        id: JINA_RERANKER_V1_TURBO_EN,
        max_length: 8192,
    },
    CrossEncoderSpec {
        id: JINA_RERANKER_V2_BASE_MULTILINGUAL,
        max_length: 1024,
    },
];

/// Look up an allowlisted cross-encoder by identifier
pub fn cross_encoder_spec(model: &str) -> Option<&'static CrossEncoderSpec> {
    SUPPORTED.iter().find(|spec| spec.id == model)
}

pub fn supported_cross_encoders() -> Vec<&'static str> {
    SUPPORTED.iter().map(|spec| spec.id).collect()
}

/// Check that `model` is allowlisted and accepts sequences of `max_length`
/// tokens
pub fn check_cross_encoder(model: &str, max_length: usize) -> Result<&'static CrossEncoderSpec> {
    let spec = cross_encoder_spec(model).ok_or_else(|| {
        Error::Initialization(format!(
            "Reranker model '{}' is not allowlisted (supported: {})",
            model,
            supported_cross_encoders().join(", ")
        ))
    })?;

    if max_length == 0 || max_length > spec.max_length {
        return Err(Error::Initialization(format!(
            "model.max_length {} is out of range for {} (1-{})",
            max_length, spec.id, spec.max_length
        )));
    }

    Ok(spec)
}

#[cfg(feature = "local-model")]
pub(crate) fn fastembed_model(model: &str) -> Option<fastembed::RerankerModel> {
    use fastembed::RerankerModel;

    match model {
        BGE_RERANKER_BASE => Some(RerankerModel::BGERerankerBase),
        BGE_RERANKER_V2_M3 => Some(RerankerModel::BGERerankerV2M3),
        JINA_RERANKER_V1_TURBO_EN => Some(RerankerModel::JINARerankerV1TurboEn),
        JINA_RERANKER_V2_BASE_MULTILINGUAL => Some(RerankerModel::JINARerankerV2BaseMultiligual),
        _ => None,
    }
}

/// Requested inference device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSelector {
    Auto,
    Cpu,
    Cuda,
}

impl FromStr for DeviceSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            other => Err(Error::Config(format!(
                "model.device must be one of cpu, cuda, auto (got '{}')",
                other
            ))),
        }
    }
}

/// Device inference actually runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
        }
    }
}

/// Resolve the configured selector to a concrete device.
///
/// The ONNX runtime shipped with fastembed runs the CPU execution provider,
/// so anything other than CPU falls back.
pub fn resolve_device(selector: DeviceSelector, force_cpu: bool) -> Device {
    if force_cpu {
        return Device::Cpu;
    }

    match selector {
        DeviceSelector::Cpu | DeviceSelector::Auto => Device::Cpu,
        DeviceSelector::Cuda => {
            warn!("CUDA execution is not available in this build, falling back to cpu");
            Device::Cpu
        }
    }
}
