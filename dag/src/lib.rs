// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The epoch DAG: node variants, tag-dispatched decoding, chunked-payload
//! reassembly and an optional byte-bounded node cache.
//!
//! Every archive section is one DAG-CBOR array whose first element is a kind
//! tag (see [`Kind`]). Nodes reference each other only by CID. Large payloads
//! (transaction bytes, metadata, rewards) are chunked into [`DataFrame`]
//! trees that [`reassemble`] walks depth-first, left-to-right, verifying the
//! first frame's declared hash over the concatenation.

pub mod cache;
mod error;
pub mod frames;
pub mod node;

pub use cache::NodeCache;
pub use error::Error;
pub use frames::{reassemble, NodeSource, MAX_FRAME_DEPTH};
pub use node::{
    peek_kind, Block, DataFrame, Entry, Epoch, Kind, Node, Rewards, SlotMeta, Subset,
    Transaction,
};
