// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Capacity and Q-factor selection.
//!
//! One bit goes into every slot whatever the step, so capacity does not depend
//! on Q. The step only trades distortion (PSNR) against robustness to channel
//! noise: a coarser step tolerates more drift but moves coefficients further.

use tracing::warn;

use crate::coeff::CoefficientProvider;
use crate::stego::config::{CodecConfig, QualityTarget};
use crate::stego::ecc;
use crate::stego::error::{Result, StegoError};
use crate::stego::frame::FrameHeader;
use crate::stego::qim::{self, HEADER_STEP};
use crate::stego::selection::PositionSelector;

/// Slot demand of one frame, in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDemand {
    pub payload_bits: usize,
    /// Protected (RS-encoded) metadata, in bits.
    pub metadata_bits: usize,
    /// Header plus ordering extension, in bits.
    pub header_bits: usize,
}

impl FrameDemand {
    pub fn total(&self) -> usize {
        self.header_bits + self.metadata_bits + self.payload_bits
    }

    fn body_bits(&self) -> usize {
        self.metadata_bits + self.payload_bits
    }
}

/// Outcome of Q-factor selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QSelection {
    pub step: f64,
    /// Header byte for `step`.
    pub code: u8,
    pub estimated_psnr_db: f64,
    /// Whether both the PSNR target and the noise margin were met.
    pub meets_quality_target: bool,
    pub required_slots: usize,
    pub available_slots: usize,
}

/// Estimated PSNR after embedding `demand` with body step `step`.
///
/// Each embedded coefficient moves by an error roughly uniform on
/// `[-step, step]`, i.e. variance `step² / 3`. Header bits use [`HEADER_STEP`].
/// The error energy is spread over all `total_coefficients`.
pub fn estimate_psnr(step: f64, demand: &FrameDemand, total_coefficients: usize, peak: f64) -> f64 {
    if total_coefficients == 0 {
        return 0.0;
    }
    let energy = demand.header_bits as f64 * HEADER_STEP * HEADER_STEP / 3.0
        + demand.body_bits() as f64 * step * step / 3.0;
    let mse = energy / total_coefficients as f64;
    if mse <= 0.0 {
        return f64::INFINITY;
    }
    10.0 * (peak * peak / mse).log10()
}

/// Pick the body step for a frame.
///
/// Walks `candidates` finest first and takes the first one whose half-step
/// exceeds the noise margin and whose estimated PSNR meets the target. When
/// no candidate meets both, falls back to the finest one that still clears the
/// noise margin, then to the coarsest.
///
/// # Errors
/// [`StegoError::CapacityExceeded`] if the frame does not fit, whatever the
/// step. Checked before anything else.
pub fn select_q_factor(
    candidates: &[f64],
    demand: &FrameDemand,
    available_slots: usize,
    total_coefficients: usize,
    quality: &QualityTarget,
    peak: f64,
) -> Result<QSelection> {
    let required = demand.total();
    if required > available_slots {
        return Err(StegoError::CapacityExceeded { required, available: available_slots });
    }

    let robust = |q: f64| q / 2.0 > quality.noise_margin;
    let psnr = |q: f64| estimate_psnr(q, demand, total_coefficients, peak);

    let (step, met) = if let Some(&q) = candidates.iter().find(|&&q| robust(q) && psnr(q) >= quality.min_psnr_db) {
        (q, true)
    } else if let Some(&q) = candidates.iter().find(|&&q| robust(q)) {
        warn!(step = q, psnr_db = psnr(q), target_db = quality.min_psnr_db, "no q-factor meets the PSNR target");
        (q, false)
    } else {
        let q = candidates
            .last()
            .copied()
            .ok_or_else(|| StegoError::InvalidConfig("no q-factor candidates".into()))?;
        warn!(step = q, noise_margin = quality.noise_margin, "no q-factor clears the noise margin");
        (q, false)
    };

    let code = qim::encode_step(step)
        .ok_or_else(|| StegoError::InvalidConfig(format!("q-factor {step} has no header code")))?;

    Ok(QSelection {
        step,
        code,
        estimated_psnr_db: psnr(step),
        meets_quality_target: met,
        required_slots: required,
        available_slots,
    })
}

/// Largest payload, in bytes, that fits next to `metadata_len` bytes of
/// metadata in `provider` under `config`.
///
/// Accounts for the header, ordering extension and the error-correction
/// overhead at the strength `config` would pick.
///
/// # Errors
/// - [`StegoError::InvalidConfig`] / [`StegoError::UnsupportedStrategy`] for a bad `config`.
/// - [`StegoError::CapacityExceeded`] if not even an empty payload fits.
pub fn max_payload_len<P: CoefficientProvider + ?Sized>(
    provider: &P,
    metadata_len: usize,
    config: &CodecConfig,
) -> Result<usize> {
    config.validate()?;
    let layout = config.body_layout()?;
    let selector = PositionSelector::from_provider(provider);

    // Header size only depends on the layout.
    let empty_frame = FrameHeader::new(0, 0, 1, ecc::MIN_STRENGTH, layout)?;
    let bootstrap = selector.bootstrap(empty_frame.bootstrap_bits());
    let body_slots = selector.body_count(&layout, &bootstrap);

    let body_demand = |payload_len: usize| -> usize {
        let strength = config.ecc_strength.unwrap_or_else(|| ecc::default_strength(payload_len));
        ecc::protected_len(metadata_len, strength) * 8 + payload_len * 8
    };

    if bootstrap.len() < empty_frame.bootstrap_bits() || body_demand(0) > body_slots {
        return Err(StegoError::CapacityExceeded {
            required: empty_frame.bootstrap_bits() + body_demand(0),
            available: bootstrap.len() + body_slots,
        });
    }

    // Demand is monotone in payload length.
    let (mut lo, mut hi) = (0usize, body_slots / 8);
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if body_demand(mid) <= body_slots {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    Ok(lo)
}
