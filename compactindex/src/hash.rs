// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Bucket and residue hashing. SHA2-256 keeps the on-disk structure stable
//! across platforms and library versions, which hasher-randomized maps would
//! not.

use sha2::{Digest, Sha256};

/// Which bucket a key lands in.
pub(crate) fn bucket_for(key: &[u8], bucket_count: u32) -> u32 {
    let digest = Sha256::digest(key);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_le_bytes(prefix) % u64::from(bucket_count)) as u32
}

/// The salted residue stored (and compared) per record.
pub(crate) fn residue(salt: u64, key: &[u8], width: u8) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt.to_le_bytes());
    hasher.update(key);
    hasher.finalize()[..width as usize].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_are_stable_and_in_range() {
        for key in [&b"a"[..], &b"abc"[..], &b"0123456789"[..]] {
            let bucket = bucket_for(key, 7);
            assert!(bucket < 7);
            assert_eq!(bucket, bucket_for(key, 7));
        }
    }

    #[test]
    fn salt_perturbs_residues() {
        let a = residue(0, b"key", 3);
        let b = residue(1, b"key", 3);
        assert_eq!(a.len(), 3);
        assert_ne!(a, b);
    }
}
