// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! # phasm-qim
//!
//! Coefficient-domain steganography codec. Hides an opaque (already encrypted
//! and compressed) payload plus a small metadata blob in the frequency-domain
//! coefficients of an image, and recovers both exactly.
//!
//! The transform itself is not part of this crate. Callers expose their
//! coefficient bands through [`CoefficientProvider`]; [`CoefficientPlanes`]
//! is an in-memory implementation.
//!
//! # Quick start
//!
//! ```rust
//! use phasm_qim::{embed, extract, BandShape, CodecConfig, CoefficientPlanes};
//!
//! let shapes = BandShape::pyramid(256, 256, 3);
//! let mut planes = CoefficientPlanes::from_shapes(1, &shapes, |_, _, r, c| ((r ^ c) % 50) as f64);
//!
//! embed(&mut planes, b"ciphertext", b"code table", &CodecConfig::default()).unwrap();
//! let out = extract(&planes).unwrap();
//! assert_eq!(out.payload, b"ciphertext");
//! assert_eq!(out.metadata, b"code table");
//! ```

pub mod coeff;
pub mod stego;

pub use coeff::{Band, BandShape, BandTag, CoefficientError, CoefficientPlanes, CoefficientProvider, Slot};
pub use stego::{embed, extract, max_payload_len, EmbedReport, ExtractReport, Extracted};
pub use stego::{CodecConfig, OrderingConfig, QualityTarget};
pub use stego::{HeaderFault, StegoError};
pub use stego::error::Result;
