// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! One epoch, served. An [`EpochHandle`] owns an archive source, the three
//! compact indexes and an optional node cache, and answers the lookup and
//! reconstruction queries external surfaces are built on:
//!
//! - [`cid_for_slot`](EpochHandle::cid_for_slot) /
//!   [`cid_for_signature`](EpochHandle::cid_for_signature): index-only.
//! - [`get_node`](EpochHandle::get_node): one verified section.
//! - [`get_block`](EpochHandle::get_block): decoded block plus reassembled
//!   rewards.
//! - [`get_transaction`](EpochHandle::get_transaction): decoded transaction,
//!   reassembled transaction bytes and decoded status metadata.
//!
//! The archive and the CID→offset index reference each other; the opener
//! resolves the cycle by requiring the archive's root CID to be present in
//! the index before serving anything. Handles are read-only, shareable
//! across threads, and release their resources on drop.

mod error;

use std::sync::Arc;

use amber_archive::{read_header, read_section_at, ArchiveHeader, RangeSource};
use amber_codec::TransactionStatusMeta;
use amber_compactindex::{CidToOffsetAndSize, SigToCid, SlotToCid};
use amber_dag::{peek_kind, reassemble, Kind, Node, NodeCache, NodeSource};
use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::normalized;
pub use error::Error;

#[derive(Debug, Clone)]
pub struct EpochConfig {
    /// Safety cap on a single section's declared length.
    pub max_section_size: u64,
    /// Bound on data-frame tree depth during reassembly.
    pub max_frame_depth: usize,
    /// Byte budget for the node cache; `None` disables caching.
    pub node_cache_bytes: Option<usize>,
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            max_section_size: amber_archive::MAX_SECTION_SIZE,
            max_frame_depth: amber_dag::MAX_FRAME_DEPTH,
            node_cache_bytes: Some(64 << 20),
        }
    }
}

/// A decoded block and its reassembled reward records.
#[derive(Debug, Clone)]
pub struct BlockContents {
    pub cid: Cid,
    pub block: amber_dag::Block,
    /// Reassembled (still compressed) reward bytes, when the block has any.
    pub rewards: Option<Vec<u8>>,
}

/// A decoded transaction with its reassembled payloads.
#[derive(Debug, Clone)]
pub struct TransactionContents {
    pub cid: Cid,
    pub transaction: amber_dag::Transaction,
    pub tx_bytes: Vec<u8>,
    pub meta: TransactionStatusMeta,
}

#[derive(Debug)]
pub struct EpochHandle {
    archive: Arc<dyn RangeSource>,
    header: ArchiveHeader,
    root: Cid,
    cid_index: CidToOffsetAndSize<Arc<dyn RangeSource>>,
    slot_index: SlotToCid<Arc<dyn RangeSource>>,
    sig_index: SigToCid<Arc<dyn RangeSource>>,
    cache: Option<NodeCache>,
    config: EpochConfig,
}

impl EpochHandle {
    /// Open the four artifacts together and cross-validate them: the archive
    /// must be version 1 with exactly one root, and that root must resolve
    /// through the CID→offset index.
    pub async fn open(
        archive: Arc<dyn RangeSource>,
        cid_index: Arc<dyn RangeSource>,
        slot_index: Arc<dyn RangeSource>,
        sig_index: Arc<dyn RangeSource>,
        config: EpochConfig,
        token: &CancellationToken,
    ) -> Result<Self, Error> {
        let (header, _) = read_header(archive.as_ref(), token).await?;
        let root = match header.roots.as_slice() {
            [root] => *root,
            other => {
                return Err(Error::Open(format!(
                    "expected exactly one root, archive has {}",
                    other.len()
                )))
            }
        };

        let cid_index = CidToOffsetAndSize::open(cid_index, token).await?;
        let slot_index = SlotToCid::open(slot_index, token).await?;
        let sig_index = SigToCid::open(sig_index, token).await?;

        match cid_index.lookup(&root, token).await {
            Ok(_) => {}
            Err(amber_compactindex::Error::NotFound) => {
                return Err(Error::Open(format!(
                    "root {root} is not present in the cid-to-offset index"
                )))
            }
            Err(other) => return Err(other.into()),
        }

        debug!(%root, sections = cid_index.entry_count(), "opened epoch");
        Ok(Self {
            archive,
            header,
            root,
            cid_index,
            slot_index,
            sig_index,
            cache: config.node_cache_bytes.map(NodeCache::new),
            config,
        })
    }

    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    pub fn root(&self) -> &Cid {
        &self.root
    }

    /// Index-only: the CID of the block at `slot`.
    pub async fn cid_for_slot(
        &self,
        slot: u64,
        token: &CancellationToken,
    ) -> Result<Cid, Error> {
        normalized(self.slot_index.lookup(slot, token).await.map_err(Error::Index))
    }

    /// Index-only: the CID of the transaction carrying `signature`.
    pub async fn cid_for_signature(
        &self,
        signature: &[u8; 64],
        token: &CancellationToken,
    ) -> Result<Cid, Error> {
        normalized(
            self.sig_index
                .lookup(signature, token)
                .await
                .map_err(Error::Index),
        )
    }

    /// Fetch and verify one node, returning its kind and raw payload.
    pub async fn get_node(
        &self,
        cid: &Cid,
        token: &CancellationToken,
    ) -> Result<(Kind, Bytes), Error> {
        let result = async {
            let payload = self.raw(cid, token).await?;
            let kind = peek_kind(&payload)?;
            Ok::<_, amber_dag::Error>((kind, payload))
        }
        .await;
        normalized(result.map_err(Error::Dag))
    }

    /// Reconstruct the block at `slot`: the decoded node plus reassembled
    /// reward bytes when present.
    pub async fn get_block(
        &self,
        slot: u64,
        token: &CancellationToken,
    ) -> Result<BlockContents, Error> {
        let result = async {
            let cid = self.cid_for_slot(slot, token).await?;
            let payload = self.raw(&cid, token).await.map_err(Error::Dag)?;
            let block = match Node::decode(&payload).map_err(Error::Dag)? {
                Node::Block(block) => block,
                other => {
                    return Err(Error::Dag(amber_dag::Error::Decode {
                        variant: "Block",
                        reason: format!("slot {slot} resolves to a {} node", other.kind()),
                    }))
                }
            };

            let rewards = match &block.rewards {
                None => None,
                Some(rewards_cid) => {
                    let payload = self.raw(rewards_cid, token).await.map_err(Error::Dag)?;
                    match Node::decode(&payload).map_err(Error::Dag)? {
                        Node::Rewards(rewards) => Some(
                            reassemble(self, &rewards.data, self.config.max_frame_depth, token)
                                .await
                                .map_err(Error::Dag)?,
                        ),
                        other => {
                            return Err(Error::Dag(amber_dag::Error::Decode {
                                variant: "Rewards",
                                reason: format!(
                                    "block {slot} rewards link resolves to a {} node",
                                    other.kind()
                                ),
                            }))
                        }
                    }
                }
            };

            Ok(BlockContents {
                cid,
                block,
                rewards,
            })
        }
        .await;
        normalized(result)
    }

    /// Reconstruct the transaction carrying `signature`: the decoded node,
    /// its reassembled transaction bytes and its decoded status metadata.
    pub async fn get_transaction(
        &self,
        signature: &[u8; 64],
        token: &CancellationToken,
    ) -> Result<TransactionContents, Error> {
        let result = async {
            let cid = self.cid_for_signature(signature, token).await?;
            let payload = self.raw(&cid, token).await.map_err(Error::Dag)?;
            let transaction = match Node::decode(&payload).map_err(Error::Dag)? {
                Node::Transaction(transaction) => transaction,
                other => {
                    return Err(Error::Dag(amber_dag::Error::Decode {
                        variant: "Transaction",
                        reason: format!("signature resolves to a {} node", other.kind()),
                    }))
                }
            };

            let tx_bytes =
                reassemble(self, &transaction.data, self.config.max_frame_depth, token)
                    .await
                    .map_err(Error::Dag)?;
            let meta_bytes =
                reassemble(self, &transaction.metadata, self.config.max_frame_depth, token)
                    .await
                    .map_err(Error::Dag)?;
            let meta = TransactionStatusMeta::from_compressed_bytes(&meta_bytes)?;

            Ok(TransactionContents {
                cid,
                transaction,
                tx_bytes,
                meta,
            })
        }
        .await;
        normalized(result)
    }

    /// Raw node payload via cache → CID index → archive section read. Only
    /// fully verified payloads enter the cache, so a cancelled walk leaves
    /// nothing partial behind.
    async fn raw(&self, cid: &Cid, token: &CancellationToken) -> Result<Bytes, amber_dag::Error> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(cid) {
                return Ok(hit);
            }
        }
        let (offset, _size) = self.cid_index.lookup(cid, token).await.map_err(|e| match e {
            amber_compactindex::Error::NotFound => amber_dag::Error::NotFound(*cid),
            other => amber_dag::Error::Index(other),
        })?;
        let payload = read_section_at(
            self.archive.as_ref(),
            offset,
            cid,
            self.config.max_section_size,
            token,
        )
        .await?;
        if let Some(cache) = &self.cache {
            cache.put(*cid, payload.clone());
        }
        Ok(payload)
    }
}

#[async_trait]
impl NodeSource for EpochHandle {
    async fn raw_node(
        &self,
        cid: &Cid,
        token: &CancellationToken,
    ) -> Result<Bytes, amber_dag::Error> {
        self.raw(cid, token).await
    }
}
