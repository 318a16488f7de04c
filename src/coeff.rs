// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Wavelet coefficient storage and the provider interface.
//!
//! The codec never runs a transform itself. It sees the carrier as a set of
//! coefficient bands per channel, addressed one coefficient at a time through
//! a [`Slot`]. [`CoefficientProvider`] is the seam to whatever transform and
//! image I/O layer produced those bands; [`CoefficientPlanes`] is a plain
//! in-memory implementation.

use thiserror::Error;

/// Identifies one subband of a 2-D wavelet decomposition.
///
/// Levels count from 1 (finest detail) upwards. The approximation band is the
/// residual low-pass band of the coarsest level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BandTag {
    Approximation,
    Horizontal(u8),
    Vertical(u8),
    Diagonal(u8),
}

impl BandTag {
    /// Decomposition level, or `None` for the approximation band.
    pub fn level(&self) -> Option<u8> {
        match *self {
            Self::Approximation => None,
            Self::Horizontal(l) | Self::Vertical(l) | Self::Diagonal(l) => Some(l),
        }
    }

    /// Position of this band in the embedding priority list.
    ///
    /// Finer levels come first; within a level diagonal detail is used before
    /// horizontal, then vertical. The approximation band has no priority.
    pub fn priority(&self) -> Option<(u8, u8)> {
        match *self {
            Self::Approximation => None,
            Self::Diagonal(l) => Some((l, 0)),
            Self::Horizontal(l) => Some((l, 1)),
            Self::Vertical(l) => Some((l, 2)),
        }
    }
}

/// Shape of one band: its tag and dimensions in coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandShape {
    pub tag: BandTag,
    pub rows: usize,
    pub cols: usize,
}

impl BandShape {
    pub fn new(tag: BandTag, rows: usize, cols: usize) -> Self {
        Self { tag, rows, cols }
    }

    /// Band shapes of a `levels`-deep dyadic decomposition of a
    /// `rows` × `cols` plane.
    ///
    /// Each level halves the low-pass plane (rounding up, as a symmetric
    /// extension transform does). Detail bands are listed from level 1
    /// upwards; the approximation band of the last level comes last.
    pub fn pyramid(rows: usize, cols: usize, levels: u8) -> Vec<BandShape> {
        let mut shapes = Vec::with_capacity(levels as usize * 3 + 1);
        let (mut r, mut c) = (rows, cols);
        for level in 1..=levels {
            let lo_r = (r + 1) / 2;
            let lo_c = (c + 1) / 2;
            let hi_r = r / 2;
            let hi_c = c / 2;
            shapes.push(BandShape::new(BandTag::Horizontal(level), hi_r, lo_c));
            shapes.push(BandShape::new(BandTag::Vertical(level), lo_r, hi_c));
            shapes.push(BandShape::new(BandTag::Diagonal(level), hi_r, hi_c));
            r = lo_r;
            c = lo_c;
        }
        shapes.push(BandShape::new(BandTag::Approximation, r, c));
        shapes
    }

    /// Number of coefficients in the band.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Address of exactly one coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub band: BandTag,
    pub row: usize,
    pub col: usize,
    pub channel: usize,
}

impl core::fmt::Display for Slot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}[{}, {}]@ch{}", self.band, self.row, self.col, self.channel)
    }
}

/// Errors raised by a coefficient provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoefficientError {
    /// The slot names a band, row, column or channel the provider does not hold.
    #[error("slot {0} is outside the coefficient planes")]
    OutOfBounds(Slot),
    /// The provider refused to store the value.
    #[error("provider rejected value {value} at slot {slot}")]
    Rejected { slot: Slot, value: f64 },
}

/// Source and sink of transform coefficients.
///
/// Implementations must report the same band set and shapes for an unmodified
/// carrier before embedding and after a lossless transform round trip, or the
/// slot order on the extraction side will not match.
pub trait CoefficientProvider {
    /// Number of channels (color planes).
    fn channels(&self) -> usize;

    /// Bands of one channel, in any order.
    fn bands(&self, channel: usize) -> Vec<BandShape>;

    /// Read one coefficient.
    fn get(&self, slot: &Slot) -> Result<f64, CoefficientError>;

    /// Overwrite one coefficient.
    fn set(&mut self, slot: &Slot, value: f64) -> Result<(), CoefficientError>;

    /// Total number of coefficients across all channels and bands,
    /// including the ones the codec never touches.
    fn total_coefficients(&self) -> usize {
        (0..self.channels())
            .map(|ch| self.bands(ch).iter().map(BandShape::len).sum::<usize>())
            .sum()
    }
}

/// One band of coefficients, stored row-major.
#[derive(Debug, Clone)]
pub struct Band {
    shape: BandShape,
    coeffs: Vec<f64>,
}

impl Band {
    /// Create a band initialized to zero.
    pub fn new(shape: BandShape) -> Self {
        Self { shape, coeffs: vec![0.0; shape.len()] }
    }

    /// Create a band filled by `f(row, col)`.
    pub fn from_fn(shape: BandShape, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut coeffs = Vec::with_capacity(shape.len());
        for r in 0..shape.rows {
            for c in 0..shape.cols {
                coeffs.push(f(r, c));
            }
        }
        Self { shape, coeffs }
    }

    pub fn shape(&self) -> BandShape {
        self.shape
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.index(row, col).map(|i| self.coeffs[i])
    }

    /// Raw read-only access, row-major.
    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    /// Raw mutable access, row-major.
    pub fn coeffs_mut(&mut self) -> &mut [f64] {
        &mut self.coeffs
    }

    fn index(&self, row: usize, col: usize) -> Option<usize> {
        if row < self.shape.rows && col < self.shape.cols {
            Some(row * self.shape.cols + col)
        } else {
            None
        }
    }
}

/// In-memory coefficient planes: a list of bands per channel.
///
/// Rejects non-finite values on write, which is what a real inverse
/// transform would choke on.
#[derive(Debug, Clone, Default)]
pub struct CoefficientPlanes {
    channels: Vec<Vec<Band>>,
}

impl CoefficientPlanes {
    pub fn new(channels: Vec<Vec<Band>>) -> Self {
        Self { channels }
    }

    /// Build planes with the same band shapes on every channel, each
    /// coefficient filled by `f(channel, tag, row, col)`.
    pub fn from_shapes(
        channels: usize,
        shapes: &[BandShape],
        mut f: impl FnMut(usize, BandTag, usize, usize) -> f64,
    ) -> Self {
        let planes = (0..channels)
            .map(|ch| {
                shapes
                    .iter()
                    .map(|&shape| Band::from_fn(shape, |r, c| f(ch, shape.tag, r, c)))
                    .collect()
            })
            .collect();
        Self::new(planes)
    }

    pub fn band(&self, channel: usize, tag: BandTag) -> Option<&Band> {
        self.channels.get(channel)?.iter().find(|b| b.shape.tag == tag)
    }

    pub fn band_mut(&mut self, channel: usize, tag: BandTag) -> Option<&mut Band> {
        self.channels.get_mut(channel)?.iter_mut().find(|b| b.shape.tag == tag)
    }

    /// Iterate over every stored coefficient mutably, across all channels.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut f64)) {
        for band in self.channels.iter_mut().flatten() {
            band.coeffs.iter_mut().for_each(&mut f);
        }
    }
}

impl CoefficientProvider for CoefficientPlanes {
    fn channels(&self) -> usize {
        self.channels.len()
    }

    fn bands(&self, channel: usize) -> Vec<BandShape> {
        self.channels
            .get(channel)
            .map(|bands| bands.iter().map(Band::shape).collect())
            .unwrap_or_default()
    }

    fn get(&self, slot: &Slot) -> Result<f64, CoefficientError> {
        self.band(slot.channel, slot.band)
            .and_then(|b| b.get(slot.row, slot.col))
            .ok_or(CoefficientError::OutOfBounds(*slot))
    }

    fn set(&mut self, slot: &Slot, value: f64) -> Result<(), CoefficientError> {
        if !value.is_finite() {
            return Err(CoefficientError::Rejected { slot: *slot, value });
        }
        let band = self
            .band_mut(slot.channel, slot.band)
            .ok_or(CoefficientError::OutOfBounds(*slot))?;
        let idx = band.index(slot.row, slot.col).ok_or(CoefficientError::OutOfBounds(*slot))?;
        band.coeffs[idx] = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pyramid_shapes() {
        let shapes = BandShape::pyramid(64, 48, 2);
        assert_eq!(shapes.len(), 7);
        assert_eq!(shapes[0], BandShape::new(BandTag::Horizontal(1), 32, 24));
        assert_eq!(shapes[2], BandShape::new(BandTag::Diagonal(1), 32, 24));
        assert_eq!(shapes[5], BandShape::new(BandTag::Diagonal(2), 16, 12));
        assert_eq!(shapes[6], BandShape::new(BandTag::Approximation, 16, 12));
        let total: usize = shapes.iter().map(BandShape::len).sum();
        assert_eq!(total, 64 * 48);
    }

    #[test]
    fn pyramid_odd_dimensions_cover_plane() {
        let shapes = BandShape::pyramid(33, 17, 3);
        let total: usize = shapes.iter().map(BandShape::len).sum();
        assert_eq!(total, 33 * 17);
    }

    #[test]
    fn approximation_has_no_priority() {
        assert_eq!(BandTag::Approximation.priority(), None);
        assert!(BandTag::Diagonal(1).priority() < BandTag::Horizontal(1).priority());
        assert!(BandTag::Vertical(1).priority() < BandTag::Diagonal(2).priority());
        assert_eq!(BandTag::Vertical(3).level(), Some(3));
    }

    #[test]
    fn planes_get_set() {
        let shapes = BandShape::pyramid(16, 16, 1);
        let mut planes = CoefficientPlanes::from_shapes(2, &shapes, |ch, _, r, c| (ch * 1000 + r * 10 + c) as f64);
        let slot = Slot { band: BandTag::Diagonal(1), row: 3, col: 4, channel: 1 };
        assert_eq!(planes.get(&slot).unwrap(), 1034.0);

        planes.set(&slot, -7.5).unwrap();
        assert_eq!(planes.get(&slot).unwrap(), -7.5);

        // Same position on the other channel untouched.
        let other = Slot { channel: 0, ..slot };
        assert_eq!(planes.get(&other).unwrap(), 34.0);
        assert_eq!(planes.total_coefficients(), 2 * 16 * 16);
    }

    #[test]
    fn planes_from_raw_bands() {
        let shape = BandShape::new(BandTag::Vertical(1), 3, 4);
        let mut band = Band::new(shape);
        assert!(band.coeffs().iter().all(|&c| c == 0.0));
        for (i, c) in band.coeffs_mut().iter_mut().enumerate() {
            *c = i as f64;
        }
        // Row-major: (2, 1) is element 2 * 4 + 1.
        assert_eq!(band.get(2, 1), Some(9.0));
        assert_eq!(band.get(3, 0), None);

        let planes = CoefficientPlanes::new(vec![vec![band]]);
        let slot = Slot { band: BandTag::Vertical(1), row: 1, col: 3, channel: 0 };
        assert_eq!(planes.get(&slot).unwrap(), 7.0);
        assert_eq!(planes.bands(0), vec![shape]);
        assert_eq!(planes.band(0, BandTag::Vertical(1)).map(|b| b.coeffs().len()), Some(12));
    }

    #[test]
    fn out_of_bounds_slot() {
        let planes = CoefficientPlanes::from_shapes(1, &BandShape::pyramid(8, 8, 1), |_, _, _, _| 0.0);
        let slot = Slot { band: BandTag::Diagonal(1), row: 4, col: 0, channel: 0 };
        assert!(matches!(planes.get(&slot), Err(CoefficientError::OutOfBounds(_))));
        let slot = Slot { band: BandTag::Diagonal(2), row: 0, col: 0, channel: 0 };
        assert!(matches!(planes.get(&slot), Err(CoefficientError::OutOfBounds(_))));
        let slot = Slot { band: BandTag::Diagonal(1), row: 0, col: 0, channel: 1 };
        assert!(matches!(planes.get(&slot), Err(CoefficientError::OutOfBounds(_))));
    }

    #[test]
    fn non_finite_rejected() {
        let mut planes = CoefficientPlanes::from_shapes(1, &BandShape::pyramid(8, 8, 1), |_, _, _, _| 1.0);
        let slot = Slot { band: BandTag::Horizontal(1), row: 0, col: 0, channel: 0 };
        assert!(matches!(planes.set(&slot, f64::NAN), Err(CoefficientError::Rejected { .. })));
        assert_eq!(planes.get(&slot).unwrap(), 1.0);
    }
}
