// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Decoder for the legacy transaction-status metadata record.
//!
//! The encoding is bincode-style: little-endian scalars, single-byte bools
//! and option tags, uvarint lengths and enum discriminants. The outer
//! [`TransactionStatusMeta`] record has accreted optional trailing fields
//! across schema generations, and historical archives legitimately end
//! part-way through the field list; the decoder treats truncation past
//! `post_balances` as field absence, never as an error. Exact discriminant
//! numbering of the [`TransactionError`] and [`InstructionError`] families
//! is normative; without it, historical data is unreadable.
//!
//! Metadata payloads are zstd-compressed at rest. The full pipeline is
//! reassemble → [`decompress`] → [`TransactionStatusMeta::decode`].

mod compress;
mod error;
mod instruction_error;
mod meta;
mod transaction_error;
pub mod wire;

pub use compress::{compress, decompress};
pub use error::Error;
pub use instruction_error::InstructionError;
pub use meta::{
    CompiledInstruction, InnerInstructions, LoadedAddresses, Pubkey, ReturnData, Reward,
    RewardType, TokenAmount, TokenBalance, TransactionStatusMeta,
};
pub use transaction_error::TransactionError;
