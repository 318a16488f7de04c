// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! QIM embedding codec.
//!
//! Payload bits go one per coefficient, as the parity of the coefficient's
//! quantization index. Every frame starts with a self-describing header
//! written at a fixed step ([`qim::HEADER_STEP`]), so the extractor learns the
//! body step, error-correction strength, lengths and slot order from the
//! carrier itself. The metadata blob is Reed-Solomon protected and recovered
//! with a descending strength ladder; the payload is opaque and unprotected
//! (it is expected to carry its own integrity check).

pub mod error;
pub mod config;
pub mod qim;
pub mod selection;
pub mod capacity;
pub mod frame;
pub mod ecc;
mod pipeline;

pub use error::{HeaderFault, StegoError};
pub use config::{CodecConfig, OrderingConfig, QualityTarget};
pub use capacity::{max_payload_len, select_q_factor, FrameDemand, QSelection};
pub use pipeline::{embed, extract, EmbedReport, EmbedStage, ExtractReport, ExtractStage, Extracted};
pub use selection::{BodyLayout, PositionSelector, SlotOrder};
