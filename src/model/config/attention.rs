//! Attention configuration types.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Scoring function of an attention layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttentionKind {
    /// `target @ source^T`
    #[serde(rename = "dot")]
    Dot,
    /// `W_g(target) @ source^T`
    #[serde(rename = "general")]
    General,
    /// Bello-style additive pointer attention: `v · tanh(W_q q + W_ref r)`
    #[serde(rename = "RL", alias = "rl")]
    Rl,
}

impl AttentionKind {
    /// Whether the layer builds a `linear_out` context vector.
    pub fn has_context(&self) -> bool {
        matches!(self, AttentionKind::Dot | AttentionKind::General)
    }
}

impl FromStr for AttentionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dot" => Ok(AttentionKind::Dot),
            "general" => Ok(AttentionKind::General),
            "RL" | "rl" => Ok(AttentionKind::Rl),
            other => Err(Error::UnsupportedAttention {
                kind: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AttentionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttentionKind::Dot => write!(f, "dot"),
            AttentionKind::General => write!(f, "general"),
            AttentionKind::Rl => write!(f, "RL"),
        }
    }
}

/// Whether a forward call applies pointer-network masking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttentionMode {
    /// Mask visited positions before the softmax
    #[default]
    Masked,
    /// Plain softmax over all positions; the mask passes through untouched
    Unmasked,
}

impl AttentionMode {
    /// `"Attention"` selects masking; any other selector disables it.
    pub fn from_selector(selector: &str) -> Self {
        if selector == "Attention" {
            AttentionMode::Masked
        } else {
            AttentionMode::Unmasked
        }
    }
}

/// Attention layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttentionConfig {
    /// Attention type selector: `"dot"`, `"general"` or `"RL"`
    pub attn_type: String,

    /// Hidden dimension
    pub dim: usize,

    /// Expected batch size; forward rejects other batch sizes when set
    #[serde(default)]
    pub batch_size: Option<usize>,

    /// Score clip constant `C` for RL attention (`C * tanh(u)`); 0 disables
    #[serde(default, alias = "C")]
    pub clip: Option<f64>,
}

impl AttentionConfig {
    pub fn new(attn_type: impl Into<String>, dim: usize) -> Self {
        Self {
            attn_type: attn_type.into(),
            dim,
            batch_size: None,
            clip: None,
        }
    }

    pub fn with_clip(mut self, clip: f64) -> Self {
        self.clip = Some(clip);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Parsed attention type.
    pub fn kind(&self) -> Result<AttentionKind> {
        self.attn_type.parse()
    }

    /// Clip constant, if it has any effect.
    pub fn effective_clip(&self) -> Option<f64> {
        self.clip.filter(|&c| c != 0.0)
    }

    pub fn validate(&self) -> Result<()> {
        self.kind()?;
        if self.dim == 0 {
            return Err(Error::ModelError {
                reason: "dim must be > 0".into(),
            });
        }
        if self.batch_size == Some(0) {
            return Err(Error::ModelError {
                reason: "batch_size must be > 0 when set".into(),
            });
        }
        if let Some(c) = self.clip {
            if !c.is_finite() {
                return Err(Error::ModelError {
                    reason: format!("clip must be finite, got {c}"),
                });
            }
        }
        Ok(())
    }

    pub fn load_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::ModelError {
            reason: format!("IO error: {e}"),
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| Error::ModelError {
            reason: format!("YAML parse error: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::ModelError {
            reason: format!("IO error: {e}"),
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| Error::ModelError {
            reason: format!("JSON parse error: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }
}
