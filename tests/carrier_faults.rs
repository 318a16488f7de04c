// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Failure paths: truncated carriers, crafted headers, failing providers.

use phasm_qim::stego::frame::{self, HEADER_BITS};
use phasm_qim::stego::qim::{self, HEADER_STEP};
use phasm_qim::stego::selection::PositionSelector;
use phasm_qim::{
    embed, extract, BandShape, BandTag, CodecConfig, CoefficientError, CoefficientPlanes, CoefficientProvider,
    HeaderFault, OrderingConfig, Slot, StegoError,
};

fn make_carrier(rows: usize, cols: usize) -> CoefficientPlanes {
    CoefficientPlanes::from_shapes(1, &BandShape::pyramid(rows, cols, 2), |_, _, r, c| {
        ((r * 7 + c * 3) % 41) as f64 - 20.5
    })
}

fn snapshot(carrier: &CoefficientPlanes) -> Vec<f64> {
    let mut copy = carrier.clone();
    let mut all = Vec::new();
    copy.for_each_mut(|c| all.push(*c));
    all
}

/// Write raw header bytes into the bootstrap slots.
fn write_header(carrier: &mut CoefficientPlanes, header: &[u8]) {
    let bits = frame::bytes_to_bits(header);
    let slots = PositionSelector::from_provider(&*carrier).bootstrap(bits.len());
    for (slot, bit) in slots.iter().zip(bits) {
        let c = carrier.get(slot).unwrap();
        carrier.set(slot, qim::embed_bit(c, HEADER_STEP, bit)).unwrap();
    }
}

/// View of a carrier that only reports its level-1 bands.
struct FinestOnly(CoefficientPlanes);

impl CoefficientProvider for FinestOnly {
    fn channels(&self) -> usize {
        self.0.channels()
    }
    fn bands(&self, channel: usize) -> Vec<BandShape> {
        self.0.bands(channel).into_iter().filter(|b| b.tag.level() == Some(1)).collect()
    }
    fn get(&self, slot: &Slot) -> Result<f64, CoefficientError> {
        self.0.get(slot)
    }
    fn set(&mut self, slot: &Slot, value: f64) -> Result<(), CoefficientError> {
        self.0.set(slot, value)
    }
}

/// Provider whose reads fail on one band.
struct BrokenBand {
    inner: CoefficientPlanes,
    broken: BandTag,
}

impl CoefficientProvider for BrokenBand {
    fn channels(&self) -> usize {
        self.inner.channels()
    }
    fn bands(&self, channel: usize) -> Vec<BandShape> {
        self.inner.bands(channel)
    }
    fn get(&self, slot: &Slot) -> Result<f64, CoefficientError> {
        if slot.band == self.broken {
            return Err(CoefficientError::OutOfBounds(*slot));
        }
        self.inner.get(slot)
    }
    fn set(&mut self, slot: &Slot, value: f64) -> Result<(), CoefficientError> {
        self.inner.set(slot, value)
    }
}

#[test]
fn body_past_end_of_carrier_is_truncated() {
    // 64x64, two levels: 1728 level-1 slots, 192 level-2 slots.
    let mut carrier = make_carrier(64, 64);
    embed(&mut carrier, &[0xA5u8; 200], b"", &CodecConfig::default()).unwrap();
    assert_eq!(extract(&carrier).unwrap().payload, vec![0xA5u8; 200]);

    match extract(&FinestOnly(carrier)) {
        Err(StegoError::TruncatedCarrier { required, available }) => {
            assert_eq!(available, 1728);
            assert!(required > available);
        }
        other => panic!("expected TruncatedCarrier, got {other:?}"),
    }
}

#[test]
fn carrier_without_room_for_header_is_truncated() {
    let carrier = CoefficientPlanes::from_shapes(2, &[BandShape::new(BandTag::Horizontal(1), 12, 13)], |_, _, _, _| 0.0);
    assert!(matches!(
        extract(&carrier),
        Err(StegoError::TruncatedCarrier { required: HEADER_BITS, available: 40 })
    ));
}

#[test]
fn unknown_version_stops_parsing() {
    let mut carrier = make_carrier(64, 64);
    write_header(&mut carrier, &[9, 0, 0, 0, 8, 0, 0, 0, 4, 8, 4]);
    assert!(matches!(
        extract(&carrier),
        Err(StegoError::UnsupportedFrame(HeaderFault::UnknownVersion(9)))
    ));
}

#[test]
fn partial_byte_payload_length_is_unsupported() {
    let mut carrier = make_carrier(64, 64);
    write_header(&mut carrier, &[1, 0, 0, 0, 12, 0, 0, 0, 8, 8, 4]);
    assert!(matches!(
        extract(&carrier),
        Err(StegoError::UnsupportedFrame(HeaderFault::PartialByte(12)))
    ));
}

#[test]
fn zero_step_code_is_unsupported() {
    let mut carrier = make_carrier(64, 64);
    write_header(&mut carrier, &[1, 0, 0, 0, 8, 0, 0, 0, 8, 0, 4]);
    assert!(matches!(
        extract(&carrier),
        Err(StegoError::UnsupportedFrame(HeaderFault::ZeroStep))
    ));
}

#[test]
fn huge_declared_lengths_are_truncated_not_allocated() {
    let mut carrier = make_carrier(64, 64);
    write_header(&mut carrier, &[1, 0xFF, 0xFF, 0xFF, 0xF8, 0xFF, 0xFF, 0xFF, 0xFF, 8, 4]);
    assert!(matches!(extract(&carrier), Err(StegoError::TruncatedCarrier { .. })));
}

#[test]
fn capacity_exceeded_leaves_carrier_untouched() {
    let mut carrier = make_carrier(64, 64);
    let before = snapshot(&carrier);
    match embed(&mut carrier, &[0u8; 400], &[1u8; 30], &CodecConfig::default()) {
        Err(StegoError::CapacityExceeded { required, available }) => {
            assert!(required > available);
            assert_eq!(available, 1920);
        }
        other => panic!("expected CapacityExceeded, got {other:?}"),
    }
    assert_eq!(snapshot(&carrier), before);
}

#[test]
fn unreproducible_ordering_is_rejected() {
    let mut carrier = make_carrier(64, 64);
    let before = snapshot(&carrier);
    let cfg = CodecConfig {
        ordering: OrderingConfig::SeededReorder { seed: None, passes: 3 },
        ..Default::default()
    };
    assert!(matches!(
        embed(&mut carrier, b"hi", b"", &cfg),
        Err(StegoError::UnsupportedStrategy(_))
    ));
    assert_eq!(snapshot(&carrier), before);
}

#[test]
fn read_failure_aborts_before_any_write() {
    let inner = make_carrier(128, 128);
    let before = snapshot(&inner);
    // Level-2 bands hold the tail of a body that spills past level 1.
    let mut provider = BrokenBand { inner, broken: BandTag::Diagonal(2) };
    let err = embed(&mut provider, &[3u8; 1200], b"", &CodecConfig::default()).unwrap_err();
    assert!(matches!(err, StegoError::Provider(CoefficientError::OutOfBounds(_))));
    assert_eq!(snapshot(&provider.inner), before);
}
