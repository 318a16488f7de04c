// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Slot selection and ordering.
//!
//! The default order walks the detail bands in a fixed priority list (finest
//! level first, diagonal before horizontal before vertical), skipping the
//! approximation band entirely. Inside a band it goes row by row, column by
//! column, with channels as the innermost loop so consecutive bits land on
//! different color planes. The first `border` rows and columns of every band
//! are skipped.
//!
//! The order is a pure function of band shapes, so encoder and decoder
//! produce identical sequences without sharing anything but the carrier.
//!
//! # Seeded reordering
//!
//! [`SlotOrder::SeededReorder`] applies Fisher-Yates passes driven by a
//! ChaCha20 PRNG. The seed and pass count travel in the frame's ordering
//! extension. The shuffle draws `u64` ranges (not `usize`) so that 32-bit and
//! 64-bit targets consume the PRNG identically.

use std::collections::HashSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::coeff::{BandShape, BandTag, CoefficientProvider, Slot};

/// Rows and columns skipped at the top-left of every band by default.
pub const DEFAULT_BORDER: u8 = 8;

/// How body slots are ordered after the Fixed walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotOrder {
    /// The Fixed walk as-is.
    Fixed,
    /// The Fixed walk shuffled `passes` times with a seeded ChaCha20 stream.
    SeededReorder { seed: u64, passes: u8 },
}

/// Everything needed to reproduce the body slot sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLayout {
    pub border: u8,
    pub order: SlotOrder,
}

impl Default for BodyLayout {
    fn default() -> Self {
        Self { border: DEFAULT_BORDER, order: SlotOrder::Fixed }
    }
}

impl BodyLayout {
    /// True when the layout can be reproduced without an ordering extension.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// One band in priority order, with its per-channel dimensions.
#[derive(Debug, Clone)]
struct BandPlan {
    tag: BandTag,
    /// `(rows, cols)` per channel; `None` if the channel lacks this band.
    dims: Vec<Option<(usize, usize)>>,
    rows: usize,
    cols: usize,
}

/// Deterministic enumerator of embeddable slots over immutable band shapes.
#[derive(Debug, Clone)]
pub struct PositionSelector {
    plans: Vec<BandPlan>,
}

impl PositionSelector {
    /// Build a selector from the band shapes of each channel.
    pub fn new(channel_bands: &[Vec<BandShape>]) -> Self {
        let mut tags: Vec<BandTag> = channel_bands
            .iter()
            .flatten()
            .map(|s| s.tag)
            .filter(|t| t.priority().is_some())
            .collect();
        tags.sort_by_key(BandTag::priority);
        tags.dedup();

        let plans = tags
            .into_iter()
            .map(|tag| {
                let dims: Vec<Option<(usize, usize)>> = channel_bands
                    .iter()
                    .map(|bands| bands.iter().find(|s| s.tag == tag).map(|s| (s.rows, s.cols)))
                    .collect();
                let rows = dims.iter().flatten().map(|d| d.0).max().unwrap_or(0);
                let cols = dims.iter().flatten().map(|d| d.1).max().unwrap_or(0);
                BandPlan { tag, dims, rows, cols }
            })
            .collect();

        Self { plans }
    }

    /// Build a selector from whatever bands a provider reports.
    pub fn from_provider<P: CoefficientProvider + ?Sized>(provider: &P) -> Self {
        let bands: Vec<Vec<BandShape>> = (0..provider.channels()).map(|ch| provider.bands(ch)).collect();
        Self::new(&bands)
    }

    /// Lazy Fixed-order walk with the given border.
    pub fn fixed(&self, border: u8) -> FixedSlots<'_> {
        FixedSlots {
            plans: &self.plans,
            border: border as usize,
            band: 0,
            row: 0,
            col: 0,
            channel: 0,
        }
    }

    /// Number of slots the Fixed walk yields, without walking it.
    pub fn count(&self, border: u8) -> usize {
        let b = border as usize;
        self.plans
            .iter()
            .flat_map(|p| p.dims.iter().flatten())
            .map(|&(r, c)| r.saturating_sub(b) * c.saturating_sub(b))
            .sum()
    }

    /// The first `bits` slots of the default Fixed walk.
    ///
    /// Header and ordering extension live here. Returns fewer slots if the
    /// carrier is too small.
    pub fn bootstrap(&self, bits: usize) -> Vec<Slot> {
        self.fixed(DEFAULT_BORDER).take(bits).collect()
    }

    /// Body slots for `layout`, excluding `reserved` (the bootstrap slots).
    pub fn body(&self, layout: &BodyLayout, reserved: &[Slot]) -> Slots<'_> {
        layout.order.select(self, layout.border, reserved)
    }

    /// Number of body slots for `layout` once `reserved` are taken out.
    pub fn body_count(&self, layout: &BodyLayout, reserved: &[Slot]) -> usize {
        let b = layout.border as usize;
        let overlap = reserved.iter().filter(|s| s.row >= b && s.col >= b).count();
        self.count(layout.border) - overlap
    }
}

impl SlotOrder {
    /// Produce the ordered slot sequence for the given shapes and parameters.
    ///
    /// Fixed stays lazy. SeededReorder has to materialize the walk to shuffle it.
    pub fn select<'a>(&self, selector: &'a PositionSelector, border: u8, reserved: &[Slot]) -> Slots<'a> {
        let body = BodySlots {
            inner: selector.fixed(border),
            reserved: reserved.iter().copied().collect(),
        };
        match *self {
            Self::Fixed => Slots::Lazy(body),
            Self::SeededReorder { seed, passes } => {
                let mut slots: Vec<Slot> = body.collect();
                shuffle_portable(&mut slots, seed, passes);
                Slots::Shuffled(slots.into_iter())
            }
        }
    }
}

/// Fisher-Yates, `passes` times over one continuous ChaCha20 stream.
fn shuffle_portable(slots: &mut [Slot], seed: u64, passes: u8) {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let n = slots.len();
    for _ in 0..passes {
        for i in (1..n).rev() {
            let j = rng.gen_range(0..=(i as u64)) as usize;
            slots.swap(i, j);
        }
    }
}

/// Lazy Fixed-order walk. Cloning restarts from the clone point.
#[derive(Debug, Clone)]
pub struct FixedSlots<'a> {
    plans: &'a [BandPlan],
    border: usize,
    band: usize,
    row: usize,
    col: usize,
    channel: usize,
}

impl Iterator for FixedSlots<'_> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        let plans = self.plans;
        while let Some(plan) = plans.get(self.band) {
            self.row = self.row.max(self.border);
            self.col = self.col.max(self.border);

            if self.row >= plan.rows {
                self.band += 1;
                self.row = 0;
                self.col = 0;
                self.channel = 0;
                continue;
            }
            if self.col >= plan.cols {
                self.row += 1;
                self.col = 0;
                self.channel = 0;
                continue;
            }
            if self.channel >= plan.dims.len() {
                self.col += 1;
                self.channel = 0;
                continue;
            }

            let ch = self.channel;
            self.channel += 1;
            if let Some((rows, cols)) = plan.dims[ch] {
                if self.row < rows && self.col < cols {
                    return Some(Slot { band: plan.tag, row: self.row, col: self.col, channel: ch });
                }
            }
        }
        None
    }
}

/// Fixed walk with reserved slots filtered out.
#[derive(Debug, Clone)]
pub struct BodySlots<'a> {
    inner: FixedSlots<'a>,
    reserved: HashSet<Slot>,
}

impl Iterator for BodySlots<'_> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        let reserved = &self.reserved;
        self.inner.by_ref().find(|s| !reserved.contains(s))
    }
}

/// Ordered body slot sequence.
#[derive(Debug, Clone)]
pub enum Slots<'a> {
    Lazy(BodySlots<'a>),
    Shuffled(std::vec::IntoIter<Slot>),
}

impl Iterator for Slots<'_> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        match self {
            Self::Lazy(it) => it.next(),
            Self::Shuffled(it) => it.next(),
        }
    }
}
