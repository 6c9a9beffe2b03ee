// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::Error;

/// Standard zstd frame magic.
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Undo the at-rest compression of a metadata payload.
///
/// Framed zstd is identified by magic; anything else is a historical raw
/// payload and passes through verbatim.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, Error> {
    if bytes.starts_with(&ZSTD_MAGIC) {
        zstd::decode_all(bytes).map_err(Error::Zstd)
    } else {
        Ok(bytes.to_vec())
    }
}

/// Framed zstd compression, the inverse of [`decompress`] for freshly
/// produced payloads.
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>, Error> {
    zstd::encode_all(bytes, 0).map_err(Error::Zstd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framed_payloads_round_trip() {
        let payload = b"some metadata bytes, repeated bytes bytes bytes".to_vec();
        let compressed = compress(&payload).unwrap();
        assert!(compressed.starts_with(&ZSTD_MAGIC));
        assert_eq!(decompress(&compressed).unwrap(), payload);
    }

    #[test]
    fn magicless_payloads_pass_through() {
        let payload = b"raw historical payload".to_vec();
        assert_eq!(decompress(&payload).unwrap(), payload);
    }
}
