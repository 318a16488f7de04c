// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Embedding configuration.
//!
//! Only the embedder is configured. Everything the extractor needs is written
//! into the frame header, so there is no extraction config to get out of sync.

use crate::stego::ecc;
use crate::stego::error::{Result, StegoError};
use crate::stego::qim::{self, HEADER_STEP};
use crate::stego::selection::{BodyLayout, SlotOrder, DEFAULT_BORDER};

/// Default body step candidates, finest first.
pub const DEFAULT_Q_CANDIDATES: [f64; 5] = [2.0, 3.0, 5.0, 7.0, 10.0];

/// Perceptual and robustness goals for Q-factor selection.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QualityTarget {
    /// Minimum estimated PSNR in dB. Default: 38.
    pub min_psnr_db: f64,
    /// Expected per-coefficient channel noise. A candidate is robust enough
    /// only if half its step exceeds this. Default: 0 (no noise expected).
    pub noise_margin: f64,
}

impl Default for QualityTarget {
    fn default() -> Self {
        Self { min_psnr_db: 38.0, noise_margin: 0.0 }
    }
}

/// Requested body slot ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OrderingConfig {
    #[default]
    Fixed,
    /// Seeded reorder. Without a seed the order could not be reproduced on
    /// extraction, so it is rejected.
    SeededReorder { seed: Option<u64>, passes: u8 },
}

impl OrderingConfig {
    /// Turn the request into a reproducible ordering.
    ///
    /// # Errors
    /// [`StegoError::UnsupportedStrategy`] if the frame could not carry
    /// everything needed to rebuild the order.
    pub fn resolve(&self) -> Result<SlotOrder> {
        match *self {
            Self::Fixed => Ok(SlotOrder::Fixed),
            Self::SeededReorder { seed: None, .. } => {
                Err(StegoError::UnsupportedStrategy("seeded reorder without a seed"))
            }
            Self::SeededReorder { passes: 0, .. } => {
                Err(StegoError::UnsupportedStrategy("seeded reorder with zero passes"))
            }
            Self::SeededReorder { seed: Some(seed), passes } => Ok(SlotOrder::SeededReorder { seed, passes }),
        }
    }
}

/// Embedding configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CodecConfig {
    /// Rows and columns skipped at the top-left of each band. Default: 8.
    pub border: usize,
    /// Body step candidates, strictly increasing, none finer than
    /// [`HEADER_STEP`]. Default: `[2, 3, 5, 7, 10]`.
    pub q_candidates: Vec<f64>,
    pub quality: QualityTarget,
    /// Peak signal value for the PSNR estimate. Default: 255.
    pub peak_value: f64,
    /// Parity symbols per RS block. `None` picks by payload size.
    pub ecc_strength: Option<u8>,
    pub ordering: OrderingConfig,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            border: DEFAULT_BORDER as usize,
            q_candidates: DEFAULT_Q_CANDIDATES.to_vec(),
            quality: QualityTarget::default(),
            peak_value: 255.0,
            ecc_strength: None,
            ordering: OrderingConfig::Fixed,
        }
    }
}

impl CodecConfig {
    /// Check the configuration for values the frame cannot represent.
    pub fn validate(&self) -> Result<()> {
        if self.border > u8::MAX as usize {
            return Err(StegoError::InvalidConfig(format!("border {} exceeds 255", self.border)));
        }
        if self.q_candidates.is_empty() {
            return Err(StegoError::InvalidConfig("no q-factor candidates".into()));
        }
        for &q in &self.q_candidates {
            if qim::encode_step(q).is_none() {
                return Err(StegoError::InvalidConfig(format!(
                    "q-factor {q} is not a multiple of 0.25 within 0.25..=63.75"
                )));
            }
            if q < HEADER_STEP {
                return Err(StegoError::InvalidConfig(format!(
                    "q-factor {q} is finer than the header step {HEADER_STEP}"
                )));
            }
        }
        if self.q_candidates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(StegoError::InvalidConfig("q-factor candidates must be strictly increasing".into()));
        }
        if !(self.peak_value.is_finite() && self.peak_value > 0.0) {
            return Err(StegoError::InvalidConfig(format!("peak value {} must be positive", self.peak_value)));
        }
        if let Some(strength) = self.ecc_strength {
            ecc::validate_strength(strength)?;
        }
        Ok(())
    }

    /// Body layout this configuration asks for.
    pub fn body_layout(&self) -> Result<BodyLayout> {
        let order = self.ordering.resolve()?;
        let border = u8::try_from(self.border)
            .map_err(|_| StegoError::InvalidConfig(format!("border {} exceeds 255", self.border)))?;
        Ok(BodyLayout { border, order })
    }
}
