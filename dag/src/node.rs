// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Node variants and their DAG-CBOR encodings.
//!
//! Every payload is a definite-length CBOR array `[kind, …]`. The serde
//! impls are written by hand so field order, arity and the kind tag stay
//! exactly as the archive format defines them; derived map encodings would
//! not.

use std::fmt;

use cid::Cid;
use cs_serde_bytes::ByteBuf;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

/// Node kind tags, the first element of every payload array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Transaction = 0,
    Entry = 1,
    Block = 2,
    Subset = 3,
    Epoch = 4,
    Rewards = 5,
    DataFrame = 6,
}

impl Kind {
    pub fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            0 => Some(Kind::Transaction),
            1 => Some(Kind::Entry),
            2 => Some(Kind::Block),
            3 => Some(Kind::Subset),
            4 => Some(Kind::Epoch),
            5 => Some(Kind::Rewards),
            6 => Some(Kind::DataFrame),
            _ => None,
        }
    }

    pub fn tag(self) -> u64 {
        self as u64
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::Transaction => "Transaction",
            Kind::Entry => "Entry",
            Kind::Block => "Block",
            Kind::Subset => "Subset",
            Kind::Epoch => "Epoch",
            Kind::Rewards => "Rewards",
            Kind::DataFrame => "DataFrame",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sniff a payload's kind from its first non-prefix byte, without decoding
/// the node.
pub fn peek_kind(payload: &[u8]) -> Result<Kind, Error> {
    let Some(&prefix) = payload.first() else {
        return Err(Error::Decode {
            variant: "node",
            reason: "empty payload".into(),
        });
    };
    // Definite-length array, major type 4. Every variant has at most seven
    // elements, so the length always fits the prefix byte.
    if !(0x80..=0x97).contains(&prefix) {
        return Err(Error::Decode {
            variant: "node",
            reason: format!("payload does not start with a cbor array (0x{prefix:02x})"),
        });
    }
    let Some(&tag) = payload.get(1) else {
        return Err(Error::Decode {
            variant: "node",
            reason: "payload ends before the kind tag".into(),
        });
    };
    if tag > 0x17 {
        return Err(Error::UnknownKind(u64::from(tag)));
    }
    Kind::from_tag(u64::from(tag)).ok_or(Error::UnknownKind(u64::from(tag)))
}

/// A contiguous chunk of a larger payload. The first frame of a tree may
/// declare the SHA2-256 hash of the fully reassembled payload; follow-on
/// chunks are linked through `next`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataFrame {
    pub hash: Option<Vec<u8>>,
    pub index: Option<u64>,
    pub total: Option<u64>,
    pub data: Vec<u8>,
    pub next: Option<Vec<Cid>>,
}

/// A signature-bearing record carrying two chunked payloads: the raw
/// transaction bytes and the status metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub data: DataFrame,
    pub metadata: DataFrame,
    pub slot: u64,
    pub index: Option<u64>,
}

/// Ordered container of transactions within a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub num_hashes: u64,
    pub hash: Vec<u8>,
    pub transactions: Vec<Cid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotMeta {
    pub parent_slot: u64,
    pub blocktime: i64,
    /// Not derivable from the archive; absent when the producer did not
    /// record it.
    pub block_height: Option<u64>,
}

/// One slot: entry links, slot metadata and an optional rewards link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub slot: u64,
    pub entries: Vec<Cid>,
    pub meta: SlotMeta,
    pub rewards: Option<Cid>,
}

/// A contiguous group of blocks within the epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subset {
    pub first: u64,
    pub last: u64,
    pub blocks: Vec<Cid>,
}

/// The archive root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Epoch {
    pub epoch: u64,
    pub subsets: Vec<Cid>,
}

/// Reward records for a block, chunked like any large payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewards {
    pub slot: u64,
    pub data: DataFrame,
}

fn expect_kind<E: serde::de::Error>(expected: Kind, tag: u64) -> Result<(), E> {
    if tag == expected.tag() {
        Ok(())
    } else {
        Err(E::custom(format!(
            "expected {} (tag {}), found tag {tag}",
            expected.name(),
            expected.tag()
        )))
    }
}

impl Serialize for DataFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (
            Kind::DataFrame.tag(),
            self.hash.as_deref().map(cs_serde_bytes::Bytes::new),
            self.index,
            self.total,
            cs_serde_bytes::Bytes::new(&self.data),
            &self.next,
        )
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DataFrame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (tag, hash, index, total, data, next): (
            u64,
            Option<ByteBuf>,
            Option<u64>,
            Option<u64>,
            ByteBuf,
            Option<Vec<Cid>>,
        ) = Deserialize::deserialize(deserializer)?;
        expect_kind(Kind::DataFrame, tag)?;
        Ok(Self {
            hash: hash.map(ByteBuf::into_vec),
            index,
            total,
            data: data.into_vec(),
            next,
        })
    }
}

impl Serialize for Transaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (
            Kind::Transaction.tag(),
            &self.data,
            &self.metadata,
            self.slot,
            self.index,
        )
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Transaction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (tag, data, metadata, slot, index): (u64, DataFrame, DataFrame, u64, Option<u64>) =
            Deserialize::deserialize(deserializer)?;
        expect_kind(Kind::Transaction, tag)?;
        Ok(Self {
            data,
            metadata,
            slot,
            index,
        })
    }
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (
            Kind::Entry.tag(),
            self.num_hashes,
            cs_serde_bytes::Bytes::new(&self.hash),
            &self.transactions,
        )
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Entry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (tag, num_hashes, hash, transactions): (u64, u64, ByteBuf, Vec<Cid>) =
            Deserialize::deserialize(deserializer)?;
        expect_kind(Kind::Entry, tag)?;
        Ok(Self {
            num_hashes,
            hash: hash.into_vec(),
            transactions,
        })
    }
}

impl Serialize for SlotMeta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.parent_slot, self.blocktime, self.block_height).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SlotMeta {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (parent_slot, blocktime, block_height): (u64, i64, Option<u64>) =
            Deserialize::deserialize(deserializer)?;
        Ok(Self {
            parent_slot,
            blocktime,
            block_height,
        })
    }
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (
            Kind::Block.tag(),
            self.slot,
            &self.entries,
            &self.meta,
            &self.rewards,
        )
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Block {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (tag, slot, entries, meta, rewards): (u64, u64, Vec<Cid>, SlotMeta, Option<Cid>) =
            Deserialize::deserialize(deserializer)?;
        expect_kind(Kind::Block, tag)?;
        Ok(Self {
            slot,
            entries,
            meta,
            rewards,
        })
    }
}

impl Serialize for Subset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (Kind::Subset.tag(), self.first, self.last, &self.blocks).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Subset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (tag, first, last, blocks): (u64, u64, u64, Vec<Cid>) =
            Deserialize::deserialize(deserializer)?;
        expect_kind(Kind::Subset, tag)?;
        Ok(Self {
            first,
            last,
            blocks,
        })
    }
}

impl Serialize for Epoch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (Kind::Epoch.tag(), self.epoch, &self.subsets).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Epoch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (tag, epoch, subsets): (u64, u64, Vec<Cid>) =
            Deserialize::deserialize(deserializer)?;
        expect_kind(Kind::Epoch, tag)?;
        Ok(Self { epoch, subsets })
    }
}

impl Serialize for Rewards {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (Kind::Rewards.tag(), self.slot, &self.data).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Rewards {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (tag, slot, data): (u64, u64, DataFrame) = Deserialize::deserialize(deserializer)?;
        expect_kind(Kind::Rewards, tag)?;
        Ok(Self { slot, data })
    }
}

/// A decoded node of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Transaction(Transaction),
    Entry(Entry),
    Block(Block),
    Subset(Subset),
    Epoch(Epoch),
    Rewards(Rewards),
    DataFrame(DataFrame),
}

impl Node {
    pub fn kind(&self) -> Kind {
        match self {
            Node::Transaction(_) => Kind::Transaction,
            Node::Entry(_) => Kind::Entry,
            Node::Block(_) => Kind::Block,
            Node::Subset(_) => Kind::Subset,
            Node::Epoch(_) => Kind::Epoch,
            Node::Rewards(_) => Kind::Rewards,
            Node::DataFrame(_) => Kind::DataFrame,
        }
    }

    /// Tag-dispatched decode of a raw payload.
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let kind = peek_kind(payload)?;
        let node = match kind {
            Kind::Transaction => Node::Transaction(decode_as(payload, kind)?),
            Kind::Entry => Node::Entry(decode_as(payload, kind)?),
            Kind::Block => Node::Block(decode_as(payload, kind)?),
            Kind::Subset => Node::Subset(decode_as(payload, kind)?),
            Kind::Epoch => Node::Epoch(decode_as(payload, kind)?),
            Kind::Rewards => Node::Rewards(decode_as(payload, kind)?),
            Kind::DataFrame => Node::DataFrame(decode_as(payload, kind)?),
        };
        Ok(node)
    }

    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let bytes = match self {
            Node::Transaction(n) => serde_ipld_dagcbor::to_vec(n),
            Node::Entry(n) => serde_ipld_dagcbor::to_vec(n),
            Node::Block(n) => serde_ipld_dagcbor::to_vec(n),
            Node::Subset(n) => serde_ipld_dagcbor::to_vec(n),
            Node::Epoch(n) => serde_ipld_dagcbor::to_vec(n),
            Node::Rewards(n) => serde_ipld_dagcbor::to_vec(n),
            Node::DataFrame(n) => serde_ipld_dagcbor::to_vec(n),
        };
        bytes.map_err(|e| Error::Encode(e.to_string()))
    }
}

fn decode_as<'a, T: Deserialize<'a>>(payload: &'a [u8], kind: Kind) -> Result<T, Error> {
    serde_ipld_dagcbor::from_slice(payload).map_err(|e| Error::Decode {
        variant: kind.name(),
        reason: e.to_string(),
    })
}
