// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unexpected end of input")]
    Eof,

    /// A bool or option byte that is neither 0 nor 1.
    #[error("invalid tag byte 0x{0:02x}")]
    InvalidTag(u8),

    #[error("declared length {declared} exceeds the {remaining} remaining bytes")]
    LengthOverflow { declared: u64, remaining: usize },

    #[error("unknown discriminant {discriminant} for {what}")]
    UnknownDiscriminant {
        what: &'static str,
        discriminant: u64,
    },

    #[error("container depth exceeds the decoder bound")]
    DepthExceeded,

    #[error("varint is malformed")]
    MalformedVarint,

    #[error("invalid utf-8 in string: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("zstd: {0}")]
    Zstd(std::io::Error),
}

impl Error {
    /// The error classes the trailing-truncation rule recovers from: a
    /// legitimately truncated historical record manifests as one of these
    /// while reading an optional trailing field.
    pub(crate) fn is_truncation(&self) -> bool {
        matches!(
            self,
            Error::Eof | Error::InvalidTag(_) | Error::LengthOverflow { .. }
        )
    }
}
