// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The per-instruction error family. Discriminant numbering is normative;
//! renumbering makes historical records unreadable.

use crate::wire::{Reader, Writer};
use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionError {
    GenericError,
    InvalidArgument,
    InvalidInstructionData,
    InvalidAccountData,
    AccountDataTooSmall,
    InsufficientFunds,
    IncorrectProgramId,
    MissingRequiredSignature,
    AccountAlreadyInitialized,
    UninitializedAccount,
    UnbalancedInstruction,
    ModifiedProgramId,
    ExternalAccountLamportSpend,
    ExternalAccountDataModified,
    ReadonlyLamportChange,
    ReadonlyDataModified,
    DuplicateAccountIndex,
    ExecutableModified,
    RentEpochModified,
    NotEnoughAccountKeys,
    AccountDataSizeChanged,
    AccountNotExecutable,
    AccountBorrowFailed,
    AccountBorrowOutstanding,
    DuplicateAccountOutOfSync,
    Custom(u32),
    InvalidError,
    ExecutableDataModified,
    ExecutableLamportChange,
    ExecutableAccountNotRentExempt,
    UnsupportedProgramId,
    CallDepth,
    MissingAccount,
    ReentrancyNotAllowed,
    MaxSeedLengthExceeded,
    InvalidSeeds,
    InvalidRealloc,
    ComputeBudgetExceeded,
    PrivilegeEscalation,
    ProgramEnvironmentSetupFailure,
    ProgramFailedToComplete,
    ProgramFailedToCompile,
    Immutable,
    IncorrectAuthority,
    BorshIoError(String),
    AccountNotRentExempt,
    InvalidAccountOwner,
    ArithmeticOverflow,
    UnsupportedSysvar,
    IllegalOwner,
    MaxAccountsDataAllocationsExceeded,
    MaxAccountsExceeded,
    MaxInstructionTraceLengthExceeded,
    BuiltinProgramsMustConsumeComputeUnits,
}

impl InstructionError {
    pub fn decode(reader: &mut Reader<'_>) -> Result<Self, Error> {
        reader.enter()?;
        let discriminant = reader.read_uvarint()?;
        let value = match discriminant {
            0 => Self::GenericError,
            1 => Self::InvalidArgument,
            2 => Self::InvalidInstructionData,
            3 => Self::InvalidAccountData,
            4 => Self::AccountDataTooSmall,
            5 => Self::InsufficientFunds,
            6 => Self::IncorrectProgramId,
            7 => Self::MissingRequiredSignature,
            8 => Self::AccountAlreadyInitialized,
            9 => Self::UninitializedAccount,
            10 => Self::UnbalancedInstruction,
            11 => Self::ModifiedProgramId,
            12 => Self::ExternalAccountLamportSpend,
            13 => Self::ExternalAccountDataModified,
            14 => Self::ReadonlyLamportChange,
            15 => Self::ReadonlyDataModified,
            16 => Self::DuplicateAccountIndex,
            17 => Self::ExecutableModified,
            18 => Self::RentEpochModified,
            19 => Self::NotEnoughAccountKeys,
            20 => Self::AccountDataSizeChanged,
            21 => Self::AccountNotExecutable,
            22 => Self::AccountBorrowFailed,
            23 => Self::AccountBorrowOutstanding,
            24 => Self::DuplicateAccountOutOfSync,
            25 => Self::Custom(reader.read_u32()?),
            26 => Self::InvalidError,
            27 => Self::ExecutableDataModified,
            28 => Self::ExecutableLamportChange,
            29 => Self::ExecutableAccountNotRentExempt,
            30 => Self::UnsupportedProgramId,
            31 => Self::CallDepth,
            32 => Self::MissingAccount,
            33 => Self::ReentrancyNotAllowed,
            34 => Self::MaxSeedLengthExceeded,
            35 => Self::InvalidSeeds,
            36 => Self::InvalidRealloc,
            37 => Self::ComputeBudgetExceeded,
            38 => Self::PrivilegeEscalation,
            39 => Self::ProgramEnvironmentSetupFailure,
            40 => Self::ProgramFailedToComplete,
            41 => Self::ProgramFailedToCompile,
            42 => Self::Immutable,
            43 => Self::IncorrectAuthority,
            44 => Self::BorshIoError(reader.read_string()?),
            45 => Self::AccountNotRentExempt,
            46 => Self::InvalidAccountOwner,
            47 => Self::ArithmeticOverflow,
            48 => Self::UnsupportedSysvar,
            49 => Self::IllegalOwner,
            50 => Self::MaxAccountsDataAllocationsExceeded,
            51 => Self::MaxAccountsExceeded,
            52 => Self::MaxInstructionTraceLengthExceeded,
            53 => Self::BuiltinProgramsMustConsumeComputeUnits,
            other => {
                return Err(Error::UnknownDiscriminant {
                    what: "InstructionError",
                    discriminant: other,
                })
            }
        };
        reader.exit();
        Ok(value)
    }

    pub fn encode(&self, writer: &mut Writer) {
        match self {
            Self::GenericError => writer.write_uvarint(0),
            Self::InvalidArgument => writer.write_uvarint(1),
            Self::InvalidInstructionData => writer.write_uvarint(2),
            Self::InvalidAccountData => writer.write_uvarint(3),
            Self::AccountDataTooSmall => writer.write_uvarint(4),
            Self::InsufficientFunds => writer.write_uvarint(5),
            Self::IncorrectProgramId => writer.write_uvarint(6),
            Self::MissingRequiredSignature => writer.write_uvarint(7),
            Self::AccountAlreadyInitialized => writer.write_uvarint(8),
            Self::UninitializedAccount => writer.write_uvarint(9),
            Self::UnbalancedInstruction => writer.write_uvarint(10),
            Self::ModifiedProgramId => writer.write_uvarint(11),
            Self::ExternalAccountLamportSpend => writer.write_uvarint(12),
            Self::ExternalAccountDataModified => writer.write_uvarint(13),
            Self::ReadonlyLamportChange => writer.write_uvarint(14),
            Self::ReadonlyDataModified => writer.write_uvarint(15),
            Self::DuplicateAccountIndex => writer.write_uvarint(16),
            Self::ExecutableModified => writer.write_uvarint(17),
            Self::RentEpochModified => writer.write_uvarint(18),
            Self::NotEnoughAccountKeys => writer.write_uvarint(19),
            Self::AccountDataSizeChanged => writer.write_uvarint(20),
            Self::AccountNotExecutable => writer.write_uvarint(21),
            Self::AccountBorrowFailed => writer.write_uvarint(22),
            Self::AccountBorrowOutstanding => writer.write_uvarint(23),
            Self::DuplicateAccountOutOfSync => writer.write_uvarint(24),
            Self::Custom(code) => {
                writer.write_uvarint(25);
                writer.write_u32(*code);
            }
            Self::InvalidError => writer.write_uvarint(26),
            Self::ExecutableDataModified => writer.write_uvarint(27),
            Self::ExecutableLamportChange => writer.write_uvarint(28),
            Self::ExecutableAccountNotRentExempt => writer.write_uvarint(29),
            Self::UnsupportedProgramId => writer.write_uvarint(30),
            Self::CallDepth => writer.write_uvarint(31),
            Self::MissingAccount => writer.write_uvarint(32),
            Self::ReentrancyNotAllowed => writer.write_uvarint(33),
            Self::MaxSeedLengthExceeded => writer.write_uvarint(34),
            Self::InvalidSeeds => writer.write_uvarint(35),
            Self::InvalidRealloc => writer.write_uvarint(36),
            Self::ComputeBudgetExceeded => writer.write_uvarint(37),
            Self::PrivilegeEscalation => writer.write_uvarint(38),
            Self::ProgramEnvironmentSetupFailure => writer.write_uvarint(39),
            Self::ProgramFailedToComplete => writer.write_uvarint(40),
            Self::ProgramFailedToCompile => writer.write_uvarint(41),
            Self::Immutable => writer.write_uvarint(42),
            Self::IncorrectAuthority => writer.write_uvarint(43),
            Self::BorshIoError(message) => {
                writer.write_uvarint(44);
                writer.write_string(message);
            }
            Self::AccountNotRentExempt => writer.write_uvarint(45),
            Self::InvalidAccountOwner => writer.write_uvarint(46),
            Self::ArithmeticOverflow => writer.write_uvarint(47),
            Self::UnsupportedSysvar => writer.write_uvarint(48),
            Self::IllegalOwner => writer.write_uvarint(49),
            Self::MaxAccountsDataAllocationsExceeded => writer.write_uvarint(50),
            Self::MaxAccountsExceeded => writer.write_uvarint(51),
            Self::MaxInstructionTraceLengthExceeded => writer.write_uvarint(52),
            Self::BuiltinProgramsMustConsumeComputeUnits => writer.write_uvarint(53),
        }
    }
}
