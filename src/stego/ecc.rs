// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Reed-Solomon protection of the metadata blob.
//!
//! RS(255, 255 - s) over GF(2^8) with primitive polynomial 0x11D and first
//! consecutive root 0, where the strength `s` is the number of parity symbols
//! per block. Decoding is Berlekamp-Massey, Chien search and Forney.
//! Shortened codes cover blocks smaller than 255 symbols.
//!
//! # Protected blob layout
//!
//! ```text
//! wrapper = metadata || CRC-32(strength || metadata)   (CRC big-endian)
//! blob    = RS_s(chunk_0) || RS_s(chunk_1) || ...      (chunks of 255 - s bytes)
//! ```
//!
//! The CRC binds the strength, so decoding at a wrong strength cannot pass
//! the residual check even when the RS syndromes happen to vanish.

use tracing::{debug, warn};

use crate::stego::error::{Result, StegoError};

/// Primitive polynomial for GF(2^8): x^8 + x^4 + x^3 + x^2 + 1.
const PRIM_POLY: u16 = 0x11D;

/// Maximum RS block size.
const N_MAX: usize = 255;

/// Trailing CRC-32 in the wrapper.
const CRC_LEN: usize = 4;

/// Weakest supported strength (parity symbols per block).
pub const MIN_STRENGTH: u8 = 2;

/// Strongest supported strength.
pub const MAX_STRENGTH: u8 = 64;

/// Strengths tried after the declared one, strongest first.
///
/// Holds every strength [`default_strength`] can pick, so a frame written
/// with defaults is always reachable from a corrupted strength code.
pub const FALLBACK_STRENGTHS: [u8; 6] = [32, 16, 8, 6, 4, 2];

// --- GF(2^8) arithmetic ---

struct GfTables {
    exp: [u8; 512],
    log: [u8; 256],
}

fn build_gf_tables() -> GfTables {
    let mut exp = [0u8; 512];
    let mut log = [0u8; 256];

    let mut x: u16 = 1;
    for i in 0..255u16 {
        exp[i as usize] = x as u8;
        exp[(i + 255) as usize] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= PRIM_POLY;
        }
    }
    exp[510] = exp[0];
    exp[511] = exp[1];

    GfTables { exp, log }
}

fn gf() -> &'static GfTables {
    use std::sync::OnceLock;
    static TABLES: OnceLock<GfTables> = OnceLock::new();
    TABLES.get_or_init(build_gf_tables)
}

fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let t = gf();
    t.exp[t.log[a as usize] as usize + t.log[b as usize] as usize]
}

/// Multiplicative inverse; `a` must be non-zero.
fn gf_inv(a: u8) -> u8 {
    debug_assert_ne!(a, 0);
    let t = gf();
    t.exp[255 - t.log[a as usize] as usize]
}

/// alpha^p for any non-negative p.
fn alpha_pow(p: usize) -> u8 {
    gf().exp[p % 255]
}

/// alpha^-p.
fn alpha_inv_pow(p: usize) -> u8 {
    gf().exp[(255 - p % 255) % 255]
}

/// Evaluate a polynomial stored highest degree first.
fn eval_desc(poly: &[u8], x: u8) -> u8 {
    poly.iter().fold(0u8, |acc, &c| gf_mul(acc, x) ^ c)
}

/// Evaluate a polynomial stored lowest degree first.
fn eval_asc(poly: &[u8], x: u8) -> u8 {
    let mut result = 0u8;
    let mut x_pow = 1u8;
    for &c in poly {
        result ^= gf_mul(c, x_pow);
        x_pow = gf_mul(x_pow, x);
    }
    result
}

/// g(x) = prod_{i=0}^{parity-1} (x - alpha^i), highest degree first.
fn generator_poly(parity: usize) -> Vec<u8> {
    let mut g = vec![1u8];
    for i in 0..parity {
        let root = alpha_pow(i);
        let mut next = vec![0u8; g.len() + 1];
        for (j, &c) in g.iter().enumerate() {
            next[j] ^= c;
            next[j + 1] ^= gf_mul(c, root);
        }
        g = next;
    }
    g
}

// --- Block codec ---

/// Systematically encode one block: `data || parity`.
///
/// `data.len()` must not exceed `255 - parity`.
fn encode_block(data: &[u8], gpoly: &[u8]) -> Vec<u8> {
    let parity = gpoly.len() - 1;
    debug_assert!(data.len() + parity <= N_MAX);

    let mut reg = vec![0u8; parity];
    for &byte in data {
        let feedback = byte ^ reg[0];
        for j in 0..parity - 1 {
            reg[j] = reg[j + 1] ^ gf_mul(feedback, gpoly[j + 1]);
        }
        reg[parity - 1] = gf_mul(feedback, gpoly[parity]);
    }

    let mut out = Vec::with_capacity(data.len() + parity);
    out.extend_from_slice(data);
    out.extend_from_slice(&reg);
    out
}

fn syndromes(block: &[u8], parity: usize) -> Vec<u8> {
    (0..parity).map(|i| eval_desc(block, alpha_pow(i))).collect()
}

/// Berlekamp-Massey. Returns the error locator, lowest degree first.
fn berlekamp_massey(synd: &[u8]) -> Vec<u8> {
    let n = synd.len();
    let mut c = vec![0u8; n + 1];
    let mut b = vec![0u8; n + 1];
    c[0] = 1;
    b[0] = 1;
    let mut c_len = 1usize;
    let mut b_len = 1usize;
    let mut ell = 0usize;
    let mut b_disc = 1u8;
    let mut m = 1usize;

    for r in 0..n {
        let mut delta = synd[r];
        for i in 1..c_len {
            delta ^= gf_mul(c[i], synd[r - i]);
        }
        if delta == 0 {
            m += 1;
            continue;
        }

        let factor = gf_mul(delta, gf_inv(b_disc));
        let new_len = (b_len + m).max(c_len).min(n + 1);

        if 2 * ell <= r {
            let prev = c.clone();
            let prev_len = c_len;
            for j in 0..b_len.min(n + 1 - m) {
                c[j + m] ^= gf_mul(factor, b[j]);
            }
            c_len = new_len;
            b.fill(0);
            b[..prev_len].copy_from_slice(&prev[..prev_len]);
            b_len = prev_len;
            ell = r + 1 - ell;
            b_disc = delta;
            m = 1;
        } else {
            for j in 0..b_len.min(n + 1 - m) {
                c[j + m] ^= gf_mul(factor, b[j]);
            }
            c_len = new_len;
            m += 1;
        }
    }

    let mut sigma = c[..c_len].to_vec();
    while sigma.len() > 1 && sigma[sigma.len() - 1] == 0 {
        sigma.pop();
    }
    sigma
}

/// Chien search over all 255 positions of the (unshortened) block.
///
/// Returns `(power, array_index)` pairs, or `None` when the locator does not
/// split into distinct roots inside the field.
fn chien_search(sigma: &[u8]) -> Option<Vec<(usize, usize)>> {
    let degree = sigma.len() - 1;
    let found: Vec<(usize, usize)> = (0..N_MAX)
        .filter(|&p| eval_asc(sigma, alpha_inv_pow(p)) == 0)
        .map(|p| (p, N_MAX - 1 - p))
        .collect();
    (found.len() == degree).then_some(found)
}

/// Forney with FCR = 0: e = X * Omega(X^-1) / Sigma'(X^-1).
fn forney(sigma: &[u8], synd: &[u8], found: &[(usize, usize)]) -> Option<Vec<u8>> {
    let two_t = synd.len();

    let mut omega = vec![0u8; two_t];
    for (i, &s) in sigma.iter().enumerate().take(two_t) {
        for j in 0..two_t - i {
            omega[i + j] ^= gf_mul(s, synd[j]);
        }
    }

    // Formal derivative: only odd powers survive in characteristic 2.
    let mut sigma_prime = vec![0u8; sigma.len().saturating_sub(1)];
    for i in (1..sigma.len()).step_by(2) {
        sigma_prime[i - 1] = sigma[i];
    }

    found
        .iter()
        .map(|&(p, _)| {
            let x_inv = alpha_inv_pow(p);
            let denom = eval_asc(&sigma_prime, x_inv);
            if denom == 0 {
                return None;
            }
            Some(gf_mul(alpha_pow(p), gf_mul(eval_asc(&omega, x_inv), gf_inv(denom))))
        })
        .collect()
}

/// Decode one block in place. Returns the number of corrected symbols, or
/// `None` if the block is uncorrectable.
fn decode_block(block: &mut [u8], parity: usize) -> Option<usize> {
    let len = block.len();
    debug_assert!(len > parity && len <= N_MAX);

    // Shortened codes are conceptually zero-padded at the front.
    let padding = N_MAX - len;
    let mut full = vec![0u8; N_MAX];
    full[padding..].copy_from_slice(block);

    let synd = syndromes(&full, parity);
    if synd.iter().all(|&s| s == 0) {
        return Some(0);
    }

    let sigma = berlekamp_massey(&synd);
    let num_errors = sigma.len() - 1;
    if num_errors == 0 || num_errors > parity / 2 {
        return None;
    }

    let found = chien_search(&sigma)?;
    let magnitudes = forney(&sigma, &synd, &found)?;

    for (&(_, idx), &mag) in found.iter().zip(&magnitudes) {
        if idx < padding {
            // Error located in the virtual zero padding.
            return None;
        }
        full[idx] ^= mag;
    }

    if syndromes(&full, parity).iter().any(|&s| s != 0) {
        return None;
    }

    block.copy_from_slice(&full[padding..]);
    Some(num_errors)
}

// --- Adapter ---

/// Check that `strength` is a supported parity count.
pub fn validate_strength(strength: u8) -> Result<()> {
    if strength < MIN_STRENGTH || strength > MAX_STRENGTH || strength % 2 != 0 {
        return Err(StegoError::InvalidConfig(format!(
            "ecc strength {strength} must be even and within {MIN_STRENGTH}..={MAX_STRENGTH}"
        )));
    }
    Ok(())
}

fn is_valid_strength(strength: u8) -> bool {
    validate_strength(strength).is_ok()
}

/// Default strength for a payload of `payload_len` bytes.
///
/// Channel noise costs roughly the same number of symbols regardless of
/// payload size, so small payloads get by with fewer parity symbols.
pub fn default_strength(payload_len: usize) -> u8 {
    match payload_len {
        0..=64 => 4,
        65..=1024 => 8,
        1025..=16384 => 16,
        _ => 32,
    }
}

/// Length of the protected blob for `metadata_len` bytes at `strength`.
pub fn protected_len(metadata_len: usize, strength: u8) -> usize {
    let s = strength as usize;
    let data = metadata_len + CRC_LEN;
    let blocks = data.div_ceil(N_MAX - s);
    data + blocks * s
}

fn wrapper_crc(strength: u8, metadata: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[strength]);
    hasher.update(metadata);
    hasher.finalize()
}

/// Protect `metadata` with `strength` parity symbols per RS block.
pub fn protect(metadata: &[u8], strength: u8) -> Result<Vec<u8>> {
    validate_strength(strength)?;
    let s = strength as usize;

    let mut wrapper = Vec::with_capacity(metadata.len() + CRC_LEN);
    wrapper.extend_from_slice(metadata);
    wrapper.extend_from_slice(&wrapper_crc(strength, metadata).to_be_bytes());

    let gpoly = generator_poly(s);
    let mut out = Vec::with_capacity(protected_len(metadata.len(), strength));
    for chunk in wrapper.chunks(N_MAX - s) {
        out.extend_from_slice(&encode_block(chunk, &gpoly));
    }
    Ok(out)
}

/// A successfully recovered metadata blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered {
    pub metadata: Vec<u8>,
    /// Strength the blob decoded at.
    pub strength: u8,
    /// Symbols corrected across all blocks.
    pub symbols_corrected: usize,
    /// Correctable symbols across all blocks at this strength.
    pub correction_capacity: usize,
}

/// Strengths to try, in order: the declared one, then every fallback
/// strictly weaker than it. An invalid declared code (odd, zero, out of
/// range) says nothing about the true strength, so every fallback is tried.
pub fn recovery_ladder(declared: u8) -> Vec<u8> {
    if !is_valid_strength(declared) {
        return FALLBACK_STRENGTHS.to_vec();
    }
    let mut ladder = Vec::with_capacity(FALLBACK_STRENGTHS.len() + 1);
    ladder.push(declared);
    ladder.extend(FALLBACK_STRENGTHS.iter().copied().filter(|&s| s < declared));
    ladder
}

/// Recover the metadata blob, trying the declared strength first and then
/// each weaker fallback.
///
/// # Errors
/// [`StegoError::FrameCorrupt`] if no candidate decodes with zero residual
/// errors and a matching CRC.
pub fn recover(protected: &[u8], declared: u8) -> Result<Recovered> {
    for strength in recovery_ladder(declared) {
        match recover_at(protected, strength) {
            Some(rec) => {
                if strength != declared {
                    warn!(declared, used = strength, "metadata recovered at fallback strength");
                }
                return Ok(rec);
            }
            None => debug!(strength, len = protected.len(), "ecc candidate rejected"),
        }
    }
    Err(StegoError::FrameCorrupt)
}

/// Single-strength decode. `None` on any inconsistency.
fn recover_at(protected: &[u8], strength: u8) -> Option<Recovered> {
    let s = strength as usize;
    if protected.is_empty() {
        return None;
    }

    // Every block but the last is full; the last must hold at least one
    // data symbol.
    let blocks = protected.len().div_ceil(N_MAX);
    let last_len = protected.len() - (blocks - 1) * N_MAX;
    if last_len <= s {
        return None;
    }
    let data_len = protected.len() - blocks * s;
    if data_len < CRC_LEN {
        return None;
    }

    let mut wrapper = Vec::with_capacity(data_len);
    let mut symbols_corrected = 0;
    for block in protected.chunks(N_MAX) {
        let mut block = block.to_vec();
        symbols_corrected += decode_block(&mut block, s)?;
        wrapper.extend_from_slice(&block[..block.len() - s]);
    }

    let (metadata, crc_bytes) = wrapper.split_at(data_len - CRC_LEN);
    let stored = u32::from_be_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    if stored != wrapper_crc(strength, metadata) {
        return None;
    }

    Some(Recovered {
        metadata: metadata.to_vec(),
        strength,
        symbols_corrected,
        correction_capacity: blocks * (s / 2),
    })
}
