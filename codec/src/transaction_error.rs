// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The transaction-level error family. Discriminant numbering is normative,
//! matching the archived records exactly.

use crate::wire::{Reader, Writer};
use crate::{Error, InstructionError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    AccountInUse,
    AccountLoadedTwice,
    AccountNotFound,
    ProgramAccountNotFound,
    InsufficientFundsForFee,
    InvalidAccountForFee,
    AlreadyProcessed,
    BlockhashNotFound,
    /// Instruction index and the error it failed with.
    InstructionError(u8, InstructionError),
    CallChainTooDeep,
    MissingSignatureForFee,
    InvalidAccountIndex,
    SignatureFailure,
    InvalidProgramForExecution,
    SanitizeFailure,
    ClusterMaintenance,
    AccountBorrowOutstanding,
    WouldExceedMaxBlockCostLimit,
    UnsupportedVersion,
    InvalidWritableAccount,
    WouldExceedMaxAccountCostLimit,
    WouldExceedAccountDataBlockLimit,
    TooManyAccountLocks,
    AddressLookupTableNotFound,
    InvalidAddressLookupTableOwner,
    InvalidAddressLookupTableData,
    InvalidAddressLookupTableIndex,
    InvalidRentPayingAccount,
    WouldExceedMaxVoteCostLimit,
    WouldExceedAccountDataTotalLimit,
    DuplicateInstruction(u8),
    InsufficientFundsForRent { account_index: u8 },
    MaxLoadedAccountsDataSizeExceeded,
    InvalidLoadedAccountsDataSizeLimit,
    ResanitizationNeeded,
    ProgramExecutionTemporarilyRestricted { account_index: u8 },
    UnbalancedTransaction,
    ProgramCacheHitMaxLimit,
    CommitCancelled,
}

impl TransactionError {
    pub fn decode(reader: &mut Reader<'_>) -> Result<Self, Error> {
        reader.enter()?;
        let discriminant = reader.read_uvarint()?;
        let value = match discriminant {
            0 => Self::AccountInUse,
            1 => Self::AccountLoadedTwice,
            2 => Self::AccountNotFound,
            3 => Self::ProgramAccountNotFound,
            4 => Self::InsufficientFundsForFee,
            5 => Self::InvalidAccountForFee,
            6 => Self::AlreadyProcessed,
            7 => Self::BlockhashNotFound,
            8 => {
                let index = reader.read_u8()?;
                let inner = InstructionError::decode(reader)?;
                Self::InstructionError(index, inner)
            }
            9 => Self::CallChainTooDeep,
            10 => Self::MissingSignatureForFee,
            11 => Self::InvalidAccountIndex,
            12 => Self::SignatureFailure,
            13 => Self::InvalidProgramForExecution,
            14 => Self::SanitizeFailure,
            15 => Self::ClusterMaintenance,
            16 => Self::AccountBorrowOutstanding,
            17 => Self::WouldExceedMaxBlockCostLimit,
            18 => Self::UnsupportedVersion,
            19 => Self::InvalidWritableAccount,
            20 => Self::WouldExceedMaxAccountCostLimit,
            21 => Self::WouldExceedAccountDataBlockLimit,
            22 => Self::TooManyAccountLocks,
            23 => Self::AddressLookupTableNotFound,
            24 => Self::InvalidAddressLookupTableOwner,
            25 => Self::InvalidAddressLookupTableData,
            26 => Self::InvalidAddressLookupTableIndex,
            27 => Self::InvalidRentPayingAccount,
            28 => Self::WouldExceedMaxVoteCostLimit,
            29 => Self::WouldExceedAccountDataTotalLimit,
            30 => Self::DuplicateInstruction(reader.read_u8()?),
            31 => Self::InsufficientFundsForRent {
                account_index: reader.read_u8()?,
            },
            32 => Self::MaxLoadedAccountsDataSizeExceeded,
            33 => Self::InvalidLoadedAccountsDataSizeLimit,
            34 => Self::ResanitizationNeeded,
            35 => Self::ProgramExecutionTemporarilyRestricted {
                account_index: reader.read_u8()?,
            },
            36 => Self::UnbalancedTransaction,
            37 => Self::ProgramCacheHitMaxLimit,
            38 => Self::CommitCancelled,
            other => {
                return Err(Error::UnknownDiscriminant {
                    what: "TransactionError",
                    discriminant: other,
                })
            }
        };
        reader.exit();
        Ok(value)
    }

    pub fn encode(&self, writer: &mut Writer) {
        match self {
            Self::AccountInUse => writer.write_uvarint(0),
            Self::AccountLoadedTwice => writer.write_uvarint(1),
            Self::AccountNotFound => writer.write_uvarint(2),
            Self::ProgramAccountNotFound => writer.write_uvarint(3),
            Self::InsufficientFundsForFee => writer.write_uvarint(4),
            Self::InvalidAccountForFee => writer.write_uvarint(5),
            Self::AlreadyProcessed => writer.write_uvarint(6),
            Self::BlockhashNotFound => writer.write_uvarint(7),
            Self::InstructionError(index, inner) => {
                writer.write_uvarint(8);
                writer.write_u8(*index);
                inner.encode(writer);
            }
            Self::CallChainTooDeep => writer.write_uvarint(9),
            Self::MissingSignatureForFee => writer.write_uvarint(10),
            Self::InvalidAccountIndex => writer.write_uvarint(11),
            Self::SignatureFailure => writer.write_uvarint(12),
            Self::InvalidProgramForExecution => writer.write_uvarint(13),
            Self::SanitizeFailure => writer.write_uvarint(14),
            Self::ClusterMaintenance => writer.write_uvarint(15),
            Self::AccountBorrowOutstanding => writer.write_uvarint(16),
            Self::WouldExceedMaxBlockCostLimit => writer.write_uvarint(17),
            Self::UnsupportedVersion => writer.write_uvarint(18),
            Self::InvalidWritableAccount => writer.write_uvarint(19),
            Self::WouldExceedMaxAccountCostLimit => writer.write_uvarint(20),
            Self::WouldExceedAccountDataBlockLimit => writer.write_uvarint(21),
            Self::TooManyAccountLocks => writer.write_uvarint(22),
            Self::AddressLookupTableNotFound => writer.write_uvarint(23),
            Self::InvalidAddressLookupTableOwner => writer.write_uvarint(24),
            Self::InvalidAddressLookupTableData => writer.write_uvarint(25),
            Self::InvalidAddressLookupTableIndex => writer.write_uvarint(26),
            Self::InvalidRentPayingAccount => writer.write_uvarint(27),
            Self::WouldExceedMaxVoteCostLimit => writer.write_uvarint(28),
            Self::WouldExceedAccountDataTotalLimit => writer.write_uvarint(29),
            Self::DuplicateInstruction(index) => {
                writer.write_uvarint(30);
                writer.write_u8(*index);
            }
            Self::InsufficientFundsForRent { account_index } => {
                writer.write_uvarint(31);
                writer.write_u8(*account_index);
            }
            Self::MaxLoadedAccountsDataSizeExceeded => writer.write_uvarint(32),
            Self::InvalidLoadedAccountsDataSizeLimit => writer.write_uvarint(33),
            Self::ResanitizationNeeded => writer.write_uvarint(34),
            Self::ProgramExecutionTemporarilyRestricted { account_index } => {
                writer.write_uvarint(35);
                writer.write_u8(*account_index);
            }
            Self::UnbalancedTransaction => writer.write_uvarint(36),
            Self::ProgramCacheHitMaxLimit => writer.write_uvarint(37),
            Self::CommitCancelled => writer.write_uvarint(38),
        }
    }
}
