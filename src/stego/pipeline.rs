// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Embedding and extraction pipelines.
//!
//! Embed: `BUILD_METADATA → SELECT_Q → ENCODE_FRAME → SELECT_SLOTS →
//! WRITE_BITS → DONE`. Extract: `SELECT_SLOTS → READ_HEADER →
//! RECOVER_METADATA → READ_PAYLOAD_BITS → DONE`.
//!
//! The header and ordering extension are written at [`HEADER_STEP`] into the
//! first slots of the default walk, so extraction needs no parameters beyond
//! the coefficients themselves.

use tracing::{debug, info, warn};

use crate::coeff::{CoefficientProvider, Slot};
use crate::stego::capacity::{select_q_factor, FrameDemand};
use crate::stego::config::CodecConfig;
use crate::stego::ecc;
use crate::stego::error::{HeaderFault, Result, StegoError};
use crate::stego::frame::{self, FrameHeader, HEADER_BITS};
use crate::stego::qim::{self, HEADER_STEP};
use crate::stego::selection::PositionSelector;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Embedding pipeline states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedStage {
    BuildMetadata,
    SelectQ,
    EncodeFrame,
    SelectSlots,
    WriteBits,
    Done,
}

/// Extraction pipeline states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStage {
    SelectSlots,
    ReadHeader,
    RecoverMetadata,
    ReadPayloadBits,
    Done,
}

/// What an embedding did to the carrier.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedReport {
    pub q_step: f64,
    pub q_code: u8,
    pub ecc_strength: u8,
    /// Header plus ordering extension.
    pub header_bits: usize,
    /// Protected metadata plus payload.
    pub body_bits: usize,
    pub available_slots: usize,
    pub estimated_psnr_db: f64,
    pub meets_quality_target: bool,
    /// Largest change applied to any single coefficient.
    pub max_abs_change: f64,
}

/// How cleanly a frame came back.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractReport {
    pub version: u8,
    pub q_step: f64,
    /// Strength named in the header.
    pub declared_strength: u8,
    /// Strength the metadata actually decoded at.
    pub used_strength: u8,
    pub symbols_corrected: usize,
    pub correction_capacity: usize,
    /// 0..=100. 100 for an untouched carrier.
    pub integrity_percent: u8,
    /// Mean QIM decision margin over every bit read, 0..=1.
    pub mean_margin: f64,
}

/// Payload and metadata recovered from a carrier.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub payload: Vec<u8>,
    pub metadata: Vec<u8>,
    pub report: ExtractReport,
}

/// A planned coefficient write.
#[derive(Debug, Clone, Copy)]
struct Write {
    slot: Slot,
    original: f64,
    value: f64,
}

/// Hide `payload` and `metadata` in the provider's coefficients.
///
/// Either every coefficient of the frame is written or none is: capacity is
/// checked before the first write, and a write the provider rejects rolls back
/// the ones already made.
///
/// # Errors
/// - [`StegoError::InvalidConfig`] / [`StegoError::UnsupportedStrategy`] for a bad `config`.
/// - [`StegoError::CapacityExceeded`] if the frame does not fit.
/// - [`StegoError::Provider`] if the provider rejects a read or write.
pub fn embed<P: CoefficientProvider + ?Sized>(
    provider: &mut P,
    payload: &[u8],
    metadata: &[u8],
    config: &CodecConfig,
) -> Result<EmbedReport> {
    config.validate()?;
    let layout = config.body_layout()?;

    debug!(stage = ?EmbedStage::BuildMetadata, payload_len = payload.len(), metadata_len = metadata.len());
    let strength = config.ecc_strength.unwrap_or_else(|| ecc::default_strength(payload.len()));
    let protected = ecc::protect(metadata, strength)?;
    // Step code is filled in once the step is chosen.
    let mut header = FrameHeader::new(payload.len(), protected.len(), 1, strength, layout)?;

    let selector = PositionSelector::from_provider(&*provider);
    let bootstrap = selector.bootstrap(header.bootstrap_bits());
    let body_available = selector.body_count(&layout, &bootstrap);
    let available = bootstrap.len() + body_available;
    let demand = FrameDemand {
        payload_bits: payload.len() * 8,
        metadata_bits: protected.len() * 8,
        header_bits: header.bootstrap_bits(),
    };
    if bootstrap.len() < header.bootstrap_bits() {
        return Err(StegoError::CapacityExceeded { required: demand.total(), available });
    }

    debug!(stage = ?EmbedStage::SelectQ, required = demand.total(), available);
    let q = select_q_factor(
        &config.q_candidates,
        &demand,
        available,
        provider.total_coefficients(),
        &config.quality,
        config.peak_value,
    )?;
    header.q_code = q.code;

    debug!(stage = ?EmbedStage::EncodeFrame, version = header.version(), q_step = q.step, strength);
    let bits = frame::bytes_to_bits(&frame::encode(&header, &protected, payload));
    let (head_bits, body_bits) = bits.split_at(header.bootstrap_bits());

    debug!(stage = ?EmbedStage::SelectSlots, order = ?layout.order, border = layout.border);
    let body_slots: Vec<Slot> = selector.body(&layout, &bootstrap).take(body_bits.len()).collect();
    if body_slots.len() < body_bits.len() {
        return Err(StegoError::CapacityExceeded { required: demand.total(), available });
    }

    debug!(stage = ?EmbedStage::WriteBits, bits = bits.len());
    let mut writes = plan_writes(&*provider, &bootstrap, head_bits, HEADER_STEP)?;
    writes.extend(plan_writes(&*provider, &body_slots, body_bits, q.step)?);
    let max_abs_change = writes.iter().map(|w| (w.value - w.original).abs()).fold(0.0, f64::max);
    commit(provider, &writes)?;

    debug!(stage = ?EmbedStage::Done);
    info!(
        payload_len = payload.len(),
        q_step = q.step,
        strength,
        psnr_db = q.estimated_psnr_db,
        used = demand.total(),
        available,
        "frame embedded"
    );

    Ok(EmbedReport {
        q_step: q.step,
        q_code: q.code,
        ecc_strength: strength,
        header_bits: head_bits.len(),
        body_bits: body_bits.len(),
        available_slots: available,
        estimated_psnr_db: q.estimated_psnr_db,
        meets_quality_target: q.meets_quality_target,
        max_abs_change,
    })
}

/// Recover payload and metadata from the provider's coefficients.
///
/// Takes no parameters: step, strength, lengths and slot order all come from
/// the frame header.
///
/// # Errors
/// - [`StegoError::TruncatedCarrier`] if the carrier holds fewer slots than the frame needs.
/// - [`StegoError::UnsupportedFrame`] if the header is not one this codec writes.
/// - [`StegoError::FrameCorrupt`] if the metadata cannot be recovered at any strength.
/// - [`StegoError::Provider`] if the provider rejects a read.
pub fn extract<P: CoefficientProvider + ?Sized>(provider: &P) -> Result<Extracted> {
    debug!(stage = ?ExtractStage::SelectSlots, channels = provider.channels());
    let selector = PositionSelector::from_provider(provider);
    let mut bootstrap = selector.bootstrap(HEADER_BITS);
    if bootstrap.len() < HEADER_BITS {
        return Err(StegoError::TruncatedCarrier { required: HEADER_BITS, available: bootstrap.len() });
    }

    debug!(stage = ?ExtractStage::ReadHeader);
    let mut soft = read_soft(provider, &bootstrap, HEADER_STEP)?;
    let version = frame::bits_to_bytes(&hard_bits(&soft[..8]))[0];
    let ext_bits = frame::extension_len(version)? * 8;
    if ext_bits > 0 {
        bootstrap = selector.bootstrap(HEADER_BITS + ext_bits);
        if bootstrap.len() < HEADER_BITS + ext_bits {
            return Err(StegoError::TruncatedCarrier {
                required: HEADER_BITS + ext_bits,
                available: bootstrap.len(),
            });
        }
        soft.extend(read_soft(provider, &bootstrap[HEADER_BITS..], HEADER_STEP)?);
    }
    let header = FrameHeader::parse(&frame::bits_to_bytes(&hard_bits(&soft)))?;
    let step = qim::decode_step(header.q_code).ok_or(HeaderFault::ZeroStep)?;

    let body_available = selector.body_count(&header.layout, &bootstrap);
    let body_bits = header.body_bits();
    if body_available < body_bits {
        return Err(StegoError::TruncatedCarrier {
            required: bootstrap.len() + body_bits,
            available: bootstrap.len() + body_available,
        });
    }
    let mut body_slots = selector.body(&header.layout, &bootstrap);

    debug!(stage = ?ExtractStage::RecoverMetadata, metadata_len = header.metadata_len, declared = header.ecc_strength);
    let meta_slots: Vec<Slot> = body_slots.by_ref().take(header.metadata_len as usize * 8).collect();
    let meta_soft = read_soft(provider, &meta_slots, step)?;
    let recovered = ecc::recover(&frame::bits_to_bytes(&hard_bits(&meta_soft)), header.ecc_strength)?;
    soft.extend(meta_soft);

    debug!(stage = ?ExtractStage::ReadPayloadBits, payload_bits = header.payload_bit_length, q_step = step);
    let payload_slots: Vec<Slot> = body_slots.take(header.payload_bit_length as usize).collect();
    let payload_soft = read_soft(provider, &payload_slots, step)?;
    let payload = frame::bits_to_bytes(&hard_bits(&payload_soft));
    soft.extend(payload_soft);

    let mean_margin = soft.iter().map(|&(_, m)| m).sum::<f64>() / soft.len() as f64;
    let integrity_percent = compute_integrity(mean_margin, &recovered);

    debug!(stage = ?ExtractStage::Done);
    info!(
        payload_len = payload.len(),
        q_step = step,
        strength = recovered.strength,
        corrected = recovered.symbols_corrected,
        integrity = integrity_percent,
        "frame extracted"
    );

    Ok(Extracted {
        payload,
        metadata: recovered.metadata,
        report: ExtractReport {
            version: header.version(),
            q_step: step,
            declared_strength: header.ecc_strength,
            used_strength: recovered.strength,
            symbols_corrected: recovered.symbols_corrected,
            correction_capacity: recovered.correction_capacity,
            integrity_percent,
            mean_margin,
        },
    })
}

/// Read the originals for `slots` and compute the values that carry `bits`.
fn plan_writes<P: CoefficientProvider + ?Sized>(
    provider: &P,
    slots: &[Slot],
    bits: &[u8],
    step: f64,
) -> Result<Vec<Write>> {
    debug_assert_eq!(slots.len(), bits.len());
    let originals = slots.iter().map(|s| provider.get(s)).collect::<core::result::Result<Vec<f64>, _>>()?;

    #[cfg(feature = "parallel")]
    let values: Vec<f64> = originals
        .par_iter()
        .zip(bits.par_iter())
        .map(|(&c, &b)| qim::embed_bit(c, step, b))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let values: Vec<f64> = originals.iter().zip(bits).map(|(&c, &b)| qim::embed_bit(c, step, b)).collect();

    Ok(slots
        .iter()
        .zip(originals)
        .zip(values)
        .map(|((&slot, original), value)| Write { slot, original, value })
        .collect())
}

/// Apply `writes` in order. On a rejected write, restore every coefficient
/// already written and return the provider's error.
fn commit<P: CoefficientProvider + ?Sized>(provider: &mut P, writes: &[Write]) -> Result<()> {
    for (done, w) in writes.iter().enumerate() {
        if let Err(e) = provider.set(&w.slot, w.value) {
            warn!(slot = %w.slot, written = done, error = %e, "coefficient write rejected, rolling back");
            for prev in writes[..done].iter().rev() {
                if let Err(restore) = provider.set(&prev.slot, prev.original) {
                    warn!(slot = %prev.slot, error = %restore, "rollback write failed");
                }
            }
            return Err(e.into());
        }
    }
    Ok(())
}

/// Soft-read every slot: `(bit, margin)` pairs in slot order.
fn read_soft<P: CoefficientProvider + ?Sized>(provider: &P, slots: &[Slot], step: f64) -> Result<Vec<(u8, f64)>> {
    let coeffs = slots.iter().map(|s| provider.get(s)).collect::<core::result::Result<Vec<f64>, _>>()?;

    #[cfg(feature = "parallel")]
    let soft = coeffs.par_iter().map(|&c| qim::extract_soft(c, step)).collect();
    #[cfg(not(feature = "parallel"))]
    let soft = coeffs.iter().map(|&c| qim::extract_soft(c, step)).collect();

    Ok(soft)
}

fn hard_bits(soft: &[(u8, f64)]) -> Vec<u8> {
    soft.iter().map(|&(b, _)| b).collect()
}

/// Integrity from decision margins (70%) and RS error headroom (30%).
fn compute_integrity(mean_margin: f64, recovered: &ecc::Recovered) -> u8 {
    let margin_score = mean_margin.clamp(0.0, 1.0);
    let rs_score = if recovered.correction_capacity == 0 {
        1.0
    } else {
        let ratio = recovered.symbols_corrected as f64 / recovered.correction_capacity as f64;
        (1.0 - ratio).max(0.0)
    };
    let combined = 0.7 * margin_score + 0.3 * rs_score;
    (combined * 100.0).round().clamp(0.0, 100.0) as u8
}
