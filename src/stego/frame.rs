// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Frame construction and parsing.
//!
//! The frame is the byte container written into the coefficients. Every
//! parameter the extractor needs is in the header, so extraction never
//! depends on caller-supplied settings:
//!
//! ```text
//! [1 byte ] version
//! [4 bytes] payload bit length (big-endian u32, multiple of 8)
//! [4 bytes] protected metadata length in bytes (big-endian u32)
//! [1 byte ] q-factor code (body step = code / 4)
//! [1 byte ] ecc strength (parity symbols per RS block)
//! -- version 2 only: ordering extension --
//! [1 byte ] border
//! [1 byte ] ordering kind (0 = fixed, 1 = seeded reorder)
//! [1 byte ] reorder passes
//! [8 bytes] reorder seed (big-endian u64)
//! -- body --
//! [M bytes] protected metadata
//! [P bytes] payload (payload bit length / 8)
//! ```
//!
//! Header and extension are written at the fixed header step; the body uses
//! the step named by the q-factor code.

use crate::stego::error::{HeaderFault, Result, StegoError};
use crate::stego::selection::{BodyLayout, SlotOrder};

/// Frame with default layout (fixed order, default border). No extension.
pub const FRAME_VERSION: u8 = 1;
/// Frame followed by an ordering extension.
pub const FRAME_VERSION_ORDERED: u8 = 2;

/// Fixed header length in bytes.
pub const HEADER_LEN: usize = 11;
/// Ordering extension length in bytes (version 2 only).
pub const ORDERING_EXT_LEN: usize = 11;

/// Fixed header length in bits (one slot per bit).
pub const HEADER_BITS: usize = HEADER_LEN * 8;

const ORDER_FIXED: u8 = 0;
const ORDER_SEEDED: u8 = 1;

/// Parsed or to-be-written frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub payload_bit_length: u32,
    /// Length of the protected metadata blob in bytes.
    pub metadata_len: u32,
    pub q_code: u8,
    pub ecc_strength: u8,
    pub layout: BodyLayout,
}

impl FrameHeader {
    /// Build a header for a payload of `payload_len` bytes.
    ///
    /// # Errors
    /// [`StegoError::CapacityExceeded`] if a length does not fit its u32 field.
    pub fn new(payload_len: usize, metadata_len: usize, q_code: u8, ecc_strength: u8, layout: BodyLayout) -> Result<Self> {
        let payload_bits = payload_len.checked_mul(8).unwrap_or(usize::MAX);
        let payload_bit_length = u32::try_from(payload_bits)
            .map_err(|_| StegoError::CapacityExceeded { required: payload_bits, available: u32::MAX as usize })?;
        let metadata_len = u32::try_from(metadata_len)
            .map_err(|_| StegoError::CapacityExceeded { required: metadata_len, available: u32::MAX as usize })?;
        Ok(Self { payload_bit_length, metadata_len, q_code, ecc_strength, layout })
    }

    pub fn version(&self) -> u8 {
        if self.layout.is_default() { FRAME_VERSION } else { FRAME_VERSION_ORDERED }
    }

    /// Header plus extension, in bytes.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + extension_len(self.version()).unwrap_or(0)
    }

    /// Slots taken by header and extension.
    pub fn bootstrap_bits(&self) -> usize {
        self.encoded_len() * 8
    }

    pub fn payload_len(&self) -> usize {
        self.payload_bit_length as usize / 8
    }

    /// Slots taken by the body.
    pub fn body_bits(&self) -> usize {
        self.metadata_len as usize * 8 + self.payload_bit_length as usize
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(self.version());
        out.extend_from_slice(&self.payload_bit_length.to_be_bytes());
        out.extend_from_slice(&self.metadata_len.to_be_bytes());
        out.push(self.q_code);
        out.push(self.ecc_strength);

        if self.version() == FRAME_VERSION_ORDERED {
            let (kind, passes, seed) = match self.layout.order {
                SlotOrder::Fixed => (ORDER_FIXED, 0, 0),
                SlotOrder::SeededReorder { seed, passes } => (ORDER_SEEDED, passes, seed),
            };
            out.push(self.layout.border);
            out.push(kind);
            out.push(passes);
            out.extend_from_slice(&seed.to_be_bytes());
        }
        out
    }

    /// Parse a header (and extension) from the front of `bytes`.
    ///
    /// The version byte is checked before anything else.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let Some(&version) = bytes.first() else {
            return Err(StegoError::TruncatedCarrier { required: HEADER_BITS, available: 0 });
        };
        let needed = HEADER_LEN + extension_len(version)?;
        if bytes.len() < needed {
            return Err(StegoError::TruncatedCarrier { required: needed * 8, available: bytes.len() * 8 });
        }

        let payload_bit_length = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let metadata_len = u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
        let q_code = bytes[9];
        let ecc_strength = bytes[10];

        if payload_bit_length % 8 != 0 {
            return Err(HeaderFault::PartialByte(payload_bit_length).into());
        }
        if q_code == 0 {
            return Err(HeaderFault::ZeroStep.into());
        }

        let layout = if version == FRAME_VERSION_ORDERED {
            parse_extension(&bytes[HEADER_LEN..needed])?
        } else {
            BodyLayout::default()
        };

        Ok(Self { payload_bit_length, metadata_len, q_code, ecc_strength, layout })
    }
}

/// Extension length implied by a version byte.
pub fn extension_len(version: u8) -> Result<usize> {
    match version {
        FRAME_VERSION => Ok(0),
        FRAME_VERSION_ORDERED => Ok(ORDERING_EXT_LEN),
        v => Err(HeaderFault::UnknownVersion(v).into()),
    }
}

fn parse_extension(ext: &[u8]) -> Result<BodyLayout> {
    let border = ext[0];
    let passes = ext[2];
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&ext[3..11]);
    let order = match ext[1] {
        ORDER_FIXED => SlotOrder::Fixed,
        ORDER_SEEDED if passes == 0 => return Err(HeaderFault::ZeroPasses.into()),
        ORDER_SEEDED => SlotOrder::SeededReorder { seed: u64::from_be_bytes(seed), passes },
        other => return Err(HeaderFault::UnknownOrdering(other).into()),
    };
    Ok(BodyLayout { border, order })
}

/// A frame split back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub header: FrameHeader,
    /// Protected metadata blob (still RS-encoded).
    pub metadata: Vec<u8>,
    pub payload: Vec<u8>,
}

/// Serialize a frame: header, optional extension, protected metadata, payload.
pub fn encode(header: &FrameHeader, protected_metadata: &[u8], payload: &[u8]) -> Vec<u8> {
    debug_assert_eq!(header.metadata_len as usize, protected_metadata.len());
    debug_assert_eq!(header.payload_len(), payload.len());

    let mut frame = header.to_bytes();
    frame.reserve(protected_metadata.len() + payload.len());
    frame.extend_from_slice(protected_metadata);
    frame.extend_from_slice(payload);
    frame
}

/// Parse a frame. `data` may be longer than the frame; trailing bytes are ignored.
///
/// # Errors
/// - [`StegoError::UnsupportedFrame`] for an unknown version or malformed header.
/// - [`StegoError::TruncatedCarrier`] if `data` ends before the declared body does.
pub fn decode(data: &[u8]) -> Result<DecodedFrame> {
    let header = FrameHeader::parse(data)?;
    let start = header.encoded_len();
    let meta_end = start + header.metadata_len as usize;
    let end = meta_end + header.payload_len();
    if data.len() < end {
        return Err(StegoError::TruncatedCarrier { required: end * 8, available: data.len() * 8 });
    }
    Ok(DecodedFrame {
        header,
        metadata: data[start..meta_end].to_vec(),
        payload: data[meta_end..end].to_vec(),
    })
}

/// Convert bytes to a bit vector (MSB first within each byte).
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for bit_pos in (0..8).rev() {
            bits.push((byte >> bit_pos) & 1);
        }
    }
    bits
}

/// Convert a bit vector (MSB first) back to bytes.
/// Pads the last byte with zero bits if `bits.len()` is not a multiple of 8.
pub fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, &bit)| byte | ((bit & 1) << (7 - i)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(payload_len: usize, metadata_len: usize) -> FrameHeader {
        FrameHeader::new(payload_len, metadata_len, 8, 10, BodyLayout::default()).unwrap()
    }

    #[test]
    fn header_layout_is_bit_exact() {
        let h = header(16, 46);
        let bytes = h.to_bytes();
        assert_eq!(
            bytes,
            vec![0x01, 0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00, 0x2E, 0x08, 0x0A]
        );
        assert_eq!(h.encoded_len(), HEADER_LEN);
        assert_eq!(h.bootstrap_bits(), 88);
        assert_eq!(h.body_bits(), 46 * 8 + 128);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let meta = vec![0xA5; 46];
        let payload: Vec<u8> = (0..16).collect();
        let h = header(payload.len(), meta.len());
        let mut bytes = encode(&h, &meta, &payload);
        assert_eq!(bytes.len(), 11 + 46 + 16);

        // Trailing padding is ignored.
        bytes.extend_from_slice(&[0; 5]);
        let frame = decode(&bytes).unwrap();
        assert_eq!(frame.header, h);
        assert_eq!(frame.metadata, meta);
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn ordered_extension_roundtrip() {
        let layout = BodyLayout { border: 4, order: SlotOrder::SeededReorder { seed: 0xDEAD_BEEF_0102_0304, passes: 3 } };
        let h = FrameHeader::new(4, 10, 12, 6, layout).unwrap();
        let bytes = h.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN + ORDERING_EXT_LEN);
        assert_eq!(bytes[0], FRAME_VERSION_ORDERED);
        assert_eq!(&bytes[11..14], &[4, 1, 3]);
        assert_eq!(&bytes[14..], &[0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(FrameHeader::parse(&bytes).unwrap(), h);
    }

    #[test]
    fn custom_border_without_reorder_uses_extension() {
        let layout = BodyLayout { border: 2, order: SlotOrder::Fixed };
        let h = FrameHeader::new(1, 8, 8, 4, layout).unwrap();
        assert_eq!(h.version(), FRAME_VERSION_ORDERED);
        assert_eq!(FrameHeader::parse(&h.to_bytes()).unwrap().layout, layout);
    }

    #[test]
    fn unknown_version_rejected_first() {
        let mut bytes = header(1, 1).to_bytes();
        bytes[0] = 9;
        // Also malformed elsewhere, but the version is checked first.
        bytes[4] = 0x03;
        assert!(matches!(
            FrameHeader::parse(&bytes),
            Err(StegoError::UnsupportedFrame(HeaderFault::UnknownVersion(9)))
        ));
        // Even a lone version byte is enough to reject.
        assert!(matches!(decode(&[0xFF]), Err(StegoError::UnsupportedFrame(HeaderFault::UnknownVersion(0xFF)))));
    }

    #[test]
    fn partial_byte_payload_rejected() {
        let mut bytes = header(2, 8).to_bytes();
        // 13 payload bits.
        bytes[1..5].copy_from_slice(&13u32.to_be_bytes());
        assert!(matches!(
            decode(&bytes),
            Err(StegoError::UnsupportedFrame(HeaderFault::PartialByte(13)))
        ));
    }

    #[test]
    fn zero_step_rejected() {
        let mut bytes = header(1, 1).to_bytes();
        bytes[9] = 0;
        assert!(matches!(FrameHeader::parse(&bytes), Err(StegoError::UnsupportedFrame(HeaderFault::ZeroStep))));
    }

    #[test]
    fn bad_extensions_rejected() {
        let layout = BodyLayout { border: 8, order: SlotOrder::SeededReorder { seed: 1, passes: 1 } };
        let good = FrameHeader::new(1, 1, 8, 4, layout).unwrap().to_bytes();

        let mut bytes = good.clone();
        bytes[13] = 0;
        assert!(matches!(FrameHeader::parse(&bytes), Err(StegoError::UnsupportedFrame(HeaderFault::ZeroPasses))));

        let mut bytes = good;
        bytes[12] = 7;
        assert!(matches!(
            FrameHeader::parse(&bytes),
            Err(StegoError::UnsupportedFrame(HeaderFault::UnknownOrdering(7)))
        ));
    }

    #[test]
    fn truncated_input() {
        assert!(matches!(decode(&[]), Err(StegoError::TruncatedCarrier { .. })));
        let h = header(4, 4);
        let bytes = encode(&h, &[1; 4], &[2; 4]);
        assert!(matches!(
            decode(&bytes[..bytes.len() - 1]),
            Err(StegoError::TruncatedCarrier { required: 152, available: 144 })
        ));
        assert!(matches!(decode(&bytes[..6]), Err(StegoError::TruncatedCarrier { required: 88, available: 48 })));
    }

    #[test]
    fn empty_payload_frame() {
        let h = header(0, 8);
        let frame = decode(&encode(&h, &[9; 8], &[])).unwrap();
        assert!(frame.payload.is_empty());
        assert_eq!(frame.metadata, vec![9; 8]);
    }

    #[test]
    fn bytes_bits_roundtrip() {
        let original = vec![0xDE, 0xAD, 0xBE, 0xEF];
        let bits = bytes_to_bits(&original);
        assert_eq!(bits.len(), 32);
        assert_eq!(&bits[..8], &[1, 1, 0, 1, 1, 1, 1, 0]);
        assert_eq!(bits_to_bytes(&bits), original);
    }

    #[test]
    fn bits_to_bytes_partial_byte() {
        // 10110_000 = 0xB0
        assert_eq!(bits_to_bytes(&[1, 0, 1, 1, 0]), vec![0xB0]);
    }
}
