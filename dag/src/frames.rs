// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Chunked-payload reassembly over a [`DataFrame`] tree.

use async_recursion::async_recursion;
use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::node::{DataFrame, Node};
use crate::Error;

/// Default bound on frame-tree depth. Generous for the largest observed
/// block; anything deeper is treated as hostile input.
pub const MAX_FRAME_DEPTH: usize = 64;

/// Provider of raw node payloads by CID: the index + archive-reader path,
/// optionally fronted by a cache.
#[async_trait]
pub trait NodeSource: Send + Sync {
    async fn raw_node(&self, cid: &Cid, token: &CancellationToken) -> Result<Bytes, Error>;
}

/// Reassemble a chunked payload starting from its first frame.
///
/// Frames concatenate depth-first, left-to-right: the frame's own bytes,
/// then each `next` entry in order, recursively. The order is load-bearing:
/// when the first frame declares a hash, the concatenation must SHA2-256 to
/// exactly that value.
pub async fn reassemble<S: NodeSource + ?Sized>(
    source: &S,
    first: &DataFrame,
    max_depth: usize,
    token: &CancellationToken,
) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(first.data.len());
    collect(source, first, 0, max_depth, &mut out, token).await?;
    if let Some(expected) = &first.hash {
        let digest = Sha256::digest(&out);
        if digest.as_slice() != expected.as_slice() {
            return Err(Error::HashMismatch);
        }
        trace!(bytes = out.len(), "verified reassembled payload");
    }
    Ok(out)
}

#[async_recursion]
async fn collect<S: NodeSource + ?Sized>(
    source: &S,
    frame: &DataFrame,
    depth: usize,
    max_depth: usize,
    out: &mut Vec<u8>,
    token: &CancellationToken,
) -> Result<(), Error> {
    if depth >= max_depth {
        return Err(Error::DepthExceeded);
    }
    out.extend_from_slice(&frame.data);
    let Some(next) = &frame.next else {
        return Ok(());
    };
    for cid in next {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let payload = source.raw_node(cid, token).await?;
        match Node::decode(&payload)? {
            Node::DataFrame(child) => {
                collect(source, &child, depth + 1, max_depth, out, token).await?;
            }
            other => {
                return Err(Error::Decode {
                    variant: "DataFrame",
                    reason: format!("linked frame {cid} is a {}", other.kind()),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use multihash::{Code, MultihashDigest};

    use super::*;

    #[derive(Default)]
    struct MapSource {
        nodes: HashMap<Cid, Bytes>,
    }

    impl MapSource {
        fn add_frame(&mut self, frame: &DataFrame) -> Cid {
            let bytes = Node::DataFrame(frame.clone()).encode().unwrap();
            let cid = Cid::new_v1(0x71, Code::Sha2_256.digest(&bytes));
            self.nodes.insert(cid, Bytes::from(bytes));
            cid
        }
    }

    #[async_trait]
    impl NodeSource for MapSource {
        async fn raw_node(&self, cid: &Cid, _token: &CancellationToken) -> Result<Bytes, Error> {
            self.nodes
                .get(cid)
                .cloned()
                .ok_or(Error::NotFound(*cid))
        }
    }

    fn leaf(data: &[u8]) -> DataFrame {
        DataFrame {
            data: data.to_vec(),
            ..Default::default()
        }
    }

    /// root -> [r1, r2], r2 -> [r3]; depth-first order is root‖r1‖r2‖r3.
    fn fixture() -> (MapSource, DataFrame, Vec<u8>) {
        let mut source = MapSource::default();
        let r3 = source.add_frame(&leaf(b" r3"));
        let r1 = source.add_frame(&leaf(b" r1"));
        let r2 = source.add_frame(&DataFrame {
            data: b" r2".to_vec(),
            next: Some(vec![r3]),
            ..Default::default()
        });

        let expected = b"root r1 r2 r3".to_vec();
        let root = DataFrame {
            hash: Some(Sha256::digest(&expected).to_vec()),
            data: b"root".to_vec(),
            next: Some(vec![r1, r2]),
            ..Default::default()
        };
        (source, root, expected)
    }

    #[tokio::test]
    async fn concatenation_is_depth_first_left_to_right() {
        let (source, root, expected) = fixture();
        let token = CancellationToken::new();
        let bytes = reassemble(&source, &root, MAX_FRAME_DEPTH, &token)
            .await
            .unwrap();
        assert_eq!(bytes, expected);
    }

    #[tokio::test]
    async fn reordered_frames_fail_hash_verification() {
        let (source, mut root, _) = fixture();
        let next = root.next.as_mut().unwrap();
        next.swap(0, 1);
        let token = CancellationToken::new();
        let err = reassemble(&source, &root, MAX_FRAME_DEPTH, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HashMismatch));
    }

    #[tokio::test]
    async fn undeclared_hash_skips_verification() {
        let (source, mut root, expected) = fixture();
        root.hash = None;
        let token = CancellationToken::new();
        let bytes = reassemble(&source, &root, MAX_FRAME_DEPTH, &token)
            .await
            .unwrap();
        assert_eq!(bytes, expected);
    }

    #[tokio::test]
    async fn depth_bound_rejects_deep_chains() {
        let mut source = MapSource::default();
        let mut next = source.add_frame(&leaf(b"tail"));
        for i in 0..8u32 {
            next = source.add_frame(&DataFrame {
                data: i.to_le_bytes().to_vec(),
                next: Some(vec![next]),
                ..Default::default()
            });
        }
        let root = DataFrame {
            data: b"root".to_vec(),
            next: Some(vec![next]),
            ..Default::default()
        };
        let token = CancellationToken::new();

        assert!(reassemble(&source, &root, 16, &token).await.is_ok());
        let err = reassemble(&source, &root, 4, &token).await.unwrap_err();
        assert!(matches!(err, Error::DepthExceeded));
    }

    #[tokio::test]
    async fn dangling_links_are_not_found() {
        let mut source = MapSource::default();
        let missing = Cid::new_v1(0x71, Code::Sha2_256.digest(b"never stored"));
        let root = DataFrame {
            data: b"root".to_vec(),
            next: Some(vec![missing]),
            ..Default::default()
        };
        source.add_frame(&root);
        let token = CancellationToken::new();

        let err = reassemble(&source, &root, MAX_FRAME_DEPTH, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(cid) if cid == missing));
    }

    #[tokio::test]
    async fn cancellation_stops_the_walk() {
        let (source, root, _) = fixture();
        let token = CancellationToken::new();
        token.cancel();
        let err = reassemble(&source, &root, MAX_FRAME_DEPTH, &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
