// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Quantization-index modulation (QIM) on single coefficients.
//!
//! A bit is carried by the parity of a coefficient's quantization index
//! `round(c / Q)`. Embedding moves the coefficient to the nearest lattice
//! point `index × Q` whose index has the wanted parity. Extraction is exact as
//! long as the coefficient drifts by less than `Q / 2` afterwards.

/// Fixed step for the header region.
///
/// The header (and ordering extension) are always written with this step so
/// the extractor can read them before it knows the payload's Q-factor.
/// `CodecConfig::validate` rejects body candidates finer than this, so the
/// header step is never coarser than the body step.
pub const HEADER_STEP: f64 = 2.0;

/// Smallest step representable by a Q-factor code.
pub const STEP_UNIT: f64 = 0.25;

/// Embed `bit` into `coefficient` with step `step`. Returns the new value.
///
/// When the current index already has the right parity the coefficient is
/// snapped to it. Otherwise the index moves by one in the direction that
/// lands closer to the original value; on a tie the move that lowers the
/// magnitude wins.
pub fn embed_bit(coefficient: f64, step: f64, bit: u8) -> f64 {
    debug_assert!(bit <= 1);
    debug_assert!(step > 0.0);

    let index = (coefficient / step).round() as i64;
    if index.rem_euclid(2) as u8 == bit & 1 {
        return index as f64 * step;
    }

    let up = (index + 1) as f64 * step;
    let down = (index - 1) as f64 * step;
    let d_up = (up - coefficient).abs();
    let d_down = (down - coefficient).abs();

    if d_up < d_down {
        up
    } else if d_down < d_up {
        down
    } else if up.abs() < down.abs() {
        up
    } else {
        down
    }
}

/// Read the bit carried by `coefficient` at step `step`.
pub fn extract_bit(coefficient: f64, step: f64) -> u8 {
    debug_assert!(step > 0.0);
    ((coefficient / step).round() as i64).rem_euclid(2) as u8
}

/// Extract a bit with a soft confidence.
///
/// Returns `(bit, margin)` where `margin` is the distance from the nearest
/// decision boundary in units of `step / 2`: 1.0 means the coefficient sits
/// exactly on a lattice point, 0.0 means it is on a boundary.
pub fn extract_soft(coefficient: f64, step: f64) -> (u8, f64) {
    let scaled = coefficient / step;
    let index = scaled.round();
    let offset = (scaled - index).abs(); // 0.0 ..= 0.5
    let bit = (index as i64).rem_euclid(2) as u8;
    (bit, 1.0 - 2.0 * offset)
}

/// Encode a step as its header byte: `round(step × 4)`.
///
/// Returns `None` unless the step is an exact multiple of 0.25 in
/// `0.25..=63.75`.
pub fn encode_step(step: f64) -> Option<u8> {
    if !step.is_finite() {
        return None;
    }
    let scaled = step / STEP_UNIT;
    let code = scaled.round();
    if (scaled - code).abs() > 1e-9 || !(1.0..=255.0).contains(&code) {
        return None;
    }
    Some(code as u8)
}

/// Decode a header byte back to its step. Code 0 yields `None`.
pub fn decode_step(code: u8) -> Option<f64> {
    (code != 0).then(|| code as f64 * STEP_UNIT)
}
