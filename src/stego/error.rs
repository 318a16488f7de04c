// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Error types for the embedding and extraction pipelines.
//!
//! Every variant is terminal for the operation that raised it. The only
//! failure the codec recovers from internally is a failed error-correction
//! strength candidate during metadata recovery.

use thiserror::Error;

use crate::coeff::CoefficientError;

/// Why a frame header could not be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeaderFault {
    /// The version byte names a frame layout this codec does not know.
    #[error("unknown frame version {0}")]
    UnknownVersion(u8),
    /// The payload bit length does not describe whole bytes.
    #[error("payload bit length {0} is not a multiple of 8")]
    PartialByte(u32),
    /// Q-factor code 0 is reserved and never written.
    #[error("q-factor code 0 is reserved")]
    ZeroStep,
    /// The ordering extension asks for a reorder with zero passes.
    #[error("ordering extension declares zero reorder passes")]
    ZeroPasses,
    /// The ordering extension names an ordering kind this codec does not know.
    #[error("unknown slot ordering kind {0}")]
    UnknownOrdering(u8),
}

/// Errors that can occur during embedding or extraction.
#[derive(Debug, Error)]
pub enum StegoError {
    /// Payload, metadata and header do not fit into the available slots.
    /// Raised before any coefficient is modified.
    #[error("frame needs {required} slots but only {available} are available")]
    CapacityExceeded { required: usize, available: usize },
    /// The frame header is not one this codec can parse.
    #[error("unsupported frame: {0}")]
    UnsupportedFrame(HeaderFault),
    /// Metadata recovery failed at every error-correction strength.
    #[error("frame corrupt: metadata unrecoverable at every correction strength")]
    FrameCorrupt,
    /// A slot ordering strategy cannot be reproduced from frame data.
    #[error("unsupported ordering strategy: {0}")]
    UnsupportedStrategy(&'static str),
    /// The carrier has fewer slots than the header says the frame occupies.
    #[error("carrier truncated: frame needs {required} slots, carrier has {available}")]
    TruncatedCarrier { required: usize, available: usize },
    /// Codec configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The coefficient provider failed a read or write.
    #[error("coefficient provider: {0}")]
    Provider(#[from] CoefficientError),
}

impl From<HeaderFault> for StegoError {
    fn from(fault: HeaderFault) -> Self {
        Self::UnsupportedFrame(fault)
    }
}

/// Result type for codec operations.
pub type Result<T> = core::result::Result<T, StegoError>;
