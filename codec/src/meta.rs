// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The multi-version `TransactionStatusMeta` record.
//!
//! Fields through `post_balances` are required. Everything after is
//! trailing-optional: schema generations appended fields over time, so a
//! historical record may end at any field boundary past `post_balances` and
//! must decode with the remaining fields absent. Writers emit fields in
//! order up to the last present one, which is what produces those
//! truncated encodings in the first place.

use crate::compress::decompress;
use crate::wire::{Reader, Writer};
use crate::{Error, TransactionError};

pub type Pubkey = [u8; 32];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

impl CompiledInstruction {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            program_id_index: reader.read_u8()?,
            accounts: reader.read_bytes()?,
            data: reader.read_bytes()?,
        })
    }

    fn encode(&self, writer: &mut Writer) {
        writer.write_u8(self.program_id_index);
        writer.write_bytes(&self.accounts);
        writer.write_bytes(&self.data);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerInstructions {
    /// Index of the outer instruction these were invoked under.
    pub index: u8,
    pub instructions: Vec<CompiledInstruction>,
}

impl InnerInstructions {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            index: reader.read_u8()?,
            instructions: reader.read_seq(CompiledInstruction::decode)?,
        })
    }

    fn encode(&self, writer: &mut Writer) {
        writer.write_u8(self.index);
        writer.write_seq(&self.instructions, |w, v| CompiledInstruction::encode(v, w));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenAmount {
    pub ui_amount: f64,
    pub decimals: u8,
    pub amount: String,
    pub ui_amount_string: String,
}

impl TokenAmount {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            ui_amount: reader.read_f64()?,
            decimals: reader.read_u8()?,
            amount: reader.read_string()?,
            ui_amount_string: reader.read_string()?,
        })
    }

    fn encode(&self, writer: &mut Writer) {
        writer.write_f64(self.ui_amount);
        writer.write_u8(self.decimals);
        writer.write_string(&self.amount);
        writer.write_string(&self.ui_amount_string);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenBalance {
    pub account_index: u8,
    pub mint: String,
    pub ui_token_amount: TokenAmount,
    pub owner: String,
    pub program_id: String,
}

impl TokenBalance {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, Error> {
        reader.enter()?;
        let value = Self {
            account_index: reader.read_u8()?,
            mint: reader.read_string()?,
            ui_token_amount: TokenAmount::decode(reader)?,
            owner: reader.read_string()?,
            program_id: reader.read_string()?,
        };
        reader.exit();
        Ok(value)
    }

    fn encode(&self, writer: &mut Writer) {
        writer.write_u8(self.account_index);
        writer.write_string(&self.mint);
        self.ui_token_amount.encode(writer);
        writer.write_string(&self.owner);
        writer.write_string(&self.program_id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardType {
    Fee,
    Rent,
    Staking,
    Voting,
}

impl RewardType {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, Error> {
        match reader.read_uvarint()? {
            0 => Ok(Self::Fee),
            1 => Ok(Self::Rent),
            2 => Ok(Self::Staking),
            3 => Ok(Self::Voting),
            other => Err(Error::UnknownDiscriminant {
                what: "RewardType",
                discriminant: other,
            }),
        }
    }

    fn encode(&self, writer: &mut Writer) {
        writer.write_uvarint(match self {
            Self::Fee => 0,
            Self::Rent => 1,
            Self::Staking => 2,
            Self::Voting => 3,
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reward {
    pub pubkey: String,
    pub lamports: i64,
    pub post_balance: u64,
    pub reward_type: Option<RewardType>,
    pub commission: Option<u8>,
}

impl Reward {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, Error> {
        reader.enter()?;
        let value = Self {
            pubkey: reader.read_string()?,
            lamports: reader.read_i64()?,
            post_balance: reader.read_u64()?,
            reward_type: reader.read_option(RewardType::decode)?,
            commission: reader.read_option(|r| r.read_u8())?,
        };
        reader.exit();
        Ok(value)
    }

    fn encode(&self, writer: &mut Writer) {
        writer.write_string(&self.pubkey);
        writer.write_i64(self.lamports);
        writer.write_u64(self.post_balance);
        writer.write_option(self.reward_type.as_ref(), |w, t| t.encode(w));
        writer.write_option(self.commission.as_ref(), |w, c| w.write_u8(*c));
    }
}

/// Addresses loaded from on-chain lookup tables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadedAddresses {
    pub writable: Vec<Pubkey>,
    pub readonly: Vec<Pubkey>,
}

impl LoadedAddresses {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, Error> {
        reader.enter()?;
        let value = Self {
            writable: reader.read_seq(|r| r.read_fixed::<32>())?,
            readonly: reader.read_seq(|r| r.read_fixed::<32>())?,
        };
        reader.exit();
        Ok(value)
    }

    fn encode(&self, writer: &mut Writer) {
        writer.write_seq(&self.writable, |w, key| w.write_fixed(key));
        writer.write_seq(&self.readonly, |w, key| w.write_fixed(key));
    }

    pub fn is_empty(&self) -> bool {
        self.writable.is_empty() && self.readonly.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnData {
    pub program_id: Pubkey,
    pub data: Vec<u8>,
}

impl ReturnData {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            program_id: reader.read_fixed::<32>()?,
            data: reader.read_bytes()?,
        })
    }

    fn encode(&self, writer: &mut Writer) {
        writer.write_fixed(&self.program_id);
        writer.write_bytes(&self.data);
    }
}

/// Per-transaction status metadata. Decoding order is the field order here;
/// `status` through `post_balances` are required, the rest are trailing.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionStatusMeta {
    pub status: Result<(), TransactionError>,
    pub fee: u64,
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
    pub inner_instructions: Option<Vec<InnerInstructions>>,
    pub log_messages: Option<Vec<String>>,
    pub pre_token_balances: Option<Vec<TokenBalance>>,
    pub post_token_balances: Option<Vec<TokenBalance>>,
    pub rewards: Option<Vec<Reward>>,
    pub loaded_addresses: LoadedAddresses,
    pub return_data: Option<ReturnData>,
    pub compute_units_consumed: Option<u64>,
}

impl Default for TransactionStatusMeta {
    fn default() -> Self {
        Self {
            status: Ok(()),
            fee: 0,
            pre_balances: Vec::new(),
            post_balances: Vec::new(),
            inner_instructions: None,
            log_messages: None,
            pre_token_balances: None,
            post_token_balances: None,
            rewards: None,
            loaded_addresses: LoadedAddresses::default(),
            return_data: None,
            compute_units_consumed: None,
        }
    }
}

/// Read a trailing field; a truncation-class failure means the record ends
/// here and every remaining field is absent.
fn trailing<T>(
    reader: &mut Reader<'_>,
    read: impl FnOnce(&mut Reader<'_>) -> Result<T, Error>,
) -> Result<Option<T>, Error> {
    match read(reader) {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_truncation() => Ok(None),
        Err(hard) => Err(hard),
    }
}

impl TransactionStatusMeta {
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = Reader::new(bytes);

        let status = match reader.read_uvarint()? {
            0 => Ok(()),
            1 => Err(TransactionError::decode(&mut reader)?),
            other => {
                return Err(Error::UnknownDiscriminant {
                    what: "Result",
                    discriminant: other,
                })
            }
        };
        let fee = reader.read_u64()?;
        let pre_balances = reader.read_seq(|r| r.read_u64())?;
        let post_balances = reader.read_seq(|r| r.read_u64())?;

        let mut meta = Self {
            status,
            fee,
            pre_balances,
            post_balances,
            ..Default::default()
        };

        meta.inner_instructions = match trailing(&mut reader, |r| {
            r.read_option(|r| r.read_seq(InnerInstructions::decode))
        })? {
            Some(value) => value,
            None => return Ok(meta),
        };
        meta.log_messages = match trailing(&mut reader, |r| {
            r.read_option(|r| r.read_seq(|r| r.read_string()))
        })? {
            Some(value) => value,
            None => return Ok(meta),
        };
        meta.pre_token_balances = match trailing(&mut reader, |r| {
            r.read_option(|r| r.read_seq(TokenBalance::decode))
        })? {
            Some(value) => value,
            None => return Ok(meta),
        };
        meta.post_token_balances = match trailing(&mut reader, |r| {
            r.read_option(|r| r.read_seq(TokenBalance::decode))
        })? {
            Some(value) => value,
            None => return Ok(meta),
        };
        meta.rewards = match trailing(&mut reader, |r| {
            r.read_option(|r| r.read_seq(Reward::decode))
        })? {
            Some(value) => value,
            None => return Ok(meta),
        };
        meta.loaded_addresses = match trailing(&mut reader, LoadedAddresses::decode)? {
            Some(value) => value,
            None => return Ok(meta),
        };
        meta.return_data = match trailing(&mut reader, |r| r.read_option(ReturnData::decode))? {
            Some(value) => value,
            None => return Ok(meta),
        };
        meta.compute_units_consumed =
            match trailing(&mut reader, |r| r.read_option(|r| r.read_u64()))? {
                Some(value) => value,
                None => return Ok(meta),
            };

        Ok(meta)
    }

    /// Decode a payload as it sits in the archive: zstd-compressed (or raw
    /// for the oldest generations) wire bytes.
    pub fn from_compressed_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let raw = decompress(bytes)?;
        Self::decode(&raw)
    }

    /// Encode fields in order through the last present trailing field; a
    /// record with an absent tail reproduces the historical short form.
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::new();

        match &self.status {
            Ok(()) => writer.write_uvarint(0),
            Err(e) => {
                writer.write_uvarint(1);
                e.encode(&mut writer);
            }
        }
        writer.write_u64(self.fee);
        writer.write_seq(&self.pre_balances, |w, v| w.write_u64(*v));
        writer.write_seq(&self.post_balances, |w, v| w.write_u64(*v));

        let Some(last) = self.last_present_trailing() else {
            return writer.into_bytes();
        };
        for field in 0..=last {
            match field {
                0 => writer.write_option(self.inner_instructions.as_ref(), |w, v| {
                    w.write_seq(v, |w, x| InnerInstructions::encode(x, w))
                }),
                1 => writer.write_option(self.log_messages.as_ref(), |w, v| {
                    w.write_seq(v, |w, s| w.write_string(s))
                }),
                2 => writer.write_option(self.pre_token_balances.as_ref(), |w, v| {
                    w.write_seq(v, |w, x| TokenBalance::encode(x, w))
                }),
                3 => writer.write_option(self.post_token_balances.as_ref(), |w, v| {
                    w.write_seq(v, |w, x| TokenBalance::encode(x, w))
                }),
                4 => writer.write_option(self.rewards.as_ref(), |w, v| {
                    w.write_seq(v, |w, x| Reward::encode(x, w))
                }),
                5 => self.loaded_addresses.encode(&mut writer),
                6 => writer.write_option(self.return_data.as_ref(), |w, v| v.encode(w)),
                7 => writer
                    .write_option(self.compute_units_consumed.as_ref(), |w, v| w.write_u64(*v)),
                _ => unreachable!("trailing fields are indexed 0..=7"),
            }
        }
        writer.into_bytes()
    }

    fn last_present_trailing(&self) -> Option<usize> {
        let present = [
            self.inner_instructions.is_some(),
            self.log_messages.is_some(),
            self.pre_token_balances.is_some(),
            self.post_token_balances.is_some(),
            self.rewards.is_some(),
            !self.loaded_addresses.is_empty(),
            self.return_data.is_some(),
            self.compute_units_consumed.is_some(),
        ];
        present.iter().rposition(|&p| p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::compress;
    use crate::InstructionError;

    fn full_meta() -> TransactionStatusMeta {
        TransactionStatusMeta {
            status: Ok(()),
            fee: 5_000,
            pre_balances: vec![1_000_000, 2_000_000, 1],
            post_balances: vec![995_000, 2_000_000, 1],
            inner_instructions: Some(vec![InnerInstructions {
                index: 0,
                instructions: vec![CompiledInstruction {
                    program_id_index: 2,
                    accounts: vec![0, 1],
                    data: vec![0xDE, 0xAD],
                }],
            }]),
            log_messages: Some(vec![
                "Program 11111111111111111111111111111111 invoke [1]".into(),
                "Program 11111111111111111111111111111111 success".into(),
            ]),
            pre_token_balances: Some(vec![TokenBalance {
                account_index: 1,
                mint: "So11111111111111111111111111111111111111112".into(),
                ui_token_amount: TokenAmount {
                    ui_amount: 1.5,
                    decimals: 9,
                    amount: "1500000000".into(),
                    ui_amount_string: "1.5".into(),
                },
                owner: "owner1111111111111111111111111111111111111".into(),
                program_id: "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA".into(),
            }]),
            post_token_balances: Some(vec![]),
            rewards: Some(vec![Reward {
                pubkey: "validator111111111111111111111111111111111".into(),
                lamports: -42,
                post_balance: 1_234_567,
                reward_type: Some(RewardType::Fee),
                commission: Some(5),
            }]),
            loaded_addresses: LoadedAddresses {
                writable: vec![[7; 32]],
                readonly: vec![[8; 32], [9; 32]],
            },
            return_data: Some(ReturnData {
                program_id: [3; 32],
                data: vec![1, 2, 3, 4],
            }),
            compute_units_consumed: Some(21_000),
        }
    }

    /// Absent-ify the trailing fields from index `k` on.
    fn truncated_copy(meta: &TransactionStatusMeta, k: usize) -> TransactionStatusMeta {
        let mut copy = meta.clone();
        if k < 1 {
            copy.inner_instructions = None;
        }
        if k < 2 {
            copy.log_messages = None;
        }
        if k < 3 {
            copy.pre_token_balances = None;
        }
        if k < 4 {
            copy.post_token_balances = None;
        }
        if k < 5 {
            copy.rewards = None;
        }
        if k < 6 {
            copy.loaded_addresses = LoadedAddresses::default();
        }
        if k < 7 {
            copy.return_data = None;
        }
        if k < 8 {
            copy.compute_units_consumed = None;
        }
        copy
    }

    #[test]
    fn fully_populated_record_round_trips() {
        let meta = full_meta();
        assert_eq!(TransactionStatusMeta::decode(&meta.encode()).unwrap(), meta);
    }

    #[test]
    fn failed_status_round_trips() {
        let meta = TransactionStatusMeta {
            status: Err(TransactionError::InstructionError(
                3,
                InstructionError::Custom(42),
            )),
            fee: 5_000,
            pre_balances: vec![10],
            post_balances: vec![5],
            ..Default::default()
        };
        assert_eq!(TransactionStatusMeta::decode(&meta.encode()).unwrap(), meta);
    }

    #[test]
    fn status_error_bytes_match_the_wire_format() {
        // Err(InstructionError(index 3, Custom(42)))
        let status = [0x01, 0x08, 0x03, 0x19, 0x2A, 0x00, 0x00, 0x00];
        let mut bytes = status.to_vec();
        bytes.extend_from_slice(&5000u64.to_le_bytes());
        bytes.push(0); // empty pre_balances
        bytes.push(0); // empty post_balances

        let meta = TransactionStatusMeta::decode(&bytes).unwrap();
        assert_eq!(
            meta.status,
            Err(TransactionError::InstructionError(
                3,
                InstructionError::Custom(42)
            ))
        );
        assert_eq!(meta.fee, 5000);
        assert_eq!(meta.encode(), bytes);
    }

    #[test]
    fn every_legal_truncation_point_decodes() {
        let meta = full_meta();
        let full = meta.encode();

        // k = 0: the record ends right after post_balances (the oldest
        // generation); k = 8: nothing truncated.
        for k in 0..=8 {
            let expected = truncated_copy(&meta, k);
            let prefix = expected.encode();
            assert!(full.starts_with(&prefix), "field order must be prefix-stable");

            let decoded = TransactionStatusMeta::decode(&prefix).unwrap();
            assert_eq!(decoded, expected, "truncation at field {k}");
        }
    }

    #[test]
    fn oldest_generation_decodes_with_absent_tail() {
        let meta = full_meta();
        let prefix = truncated_copy(&meta, 0).encode();
        let decoded = TransactionStatusMeta::decode(&prefix).unwrap();

        assert_eq!(decoded.status, Ok(()));
        assert_eq!(decoded.fee, meta.fee);
        assert_eq!(decoded.pre_balances, meta.pre_balances);
        assert_eq!(decoded.post_balances, meta.post_balances);
        assert_eq!(decoded.inner_instructions, None);
        assert_eq!(decoded.log_messages, None);
        assert_eq!(decoded.pre_token_balances, None);
        assert_eq!(decoded.post_token_balances, None);
        assert_eq!(decoded.rewards, None);
        assert!(decoded.loaded_addresses.is_empty());
        assert_eq!(decoded.return_data, None);
        assert_eq!(decoded.compute_units_consumed, None);
    }

    #[test]
    fn arbitrary_cuts_past_post_balances_never_error() {
        let meta = full_meta();
        let full = meta.encode();
        let required_len = truncated_copy(&meta, 0).encode().len();

        for cut in required_len..full.len() {
            let decoded = TransactionStatusMeta::decode(&full[..cut])
                .unwrap_or_else(|e| panic!("cut at {cut}: {e}"));
            assert_eq!(decoded.status, meta.status);
            assert_eq!(decoded.fee, meta.fee);
            assert_eq!(decoded.pre_balances, meta.pre_balances);
            assert_eq!(decoded.post_balances, meta.post_balances);
        }
    }

    #[test]
    fn truncation_inside_required_fields_is_an_error() {
        let meta = full_meta();
        let required = truncated_copy(&meta, 0).encode();

        for cut in 0..required.len() {
            assert!(
                TransactionStatusMeta::decode(&required[..cut]).is_err(),
                "cut at {cut} inside the required prefix must fail"
            );
        }
    }

    #[test]
    fn compressed_pipeline_round_trips() {
        let meta = full_meta();
        let compressed = compress(&meta.encode()).unwrap();
        assert_eq!(
            TransactionStatusMeta::from_compressed_bytes(&compressed).unwrap(),
            meta
        );
        // Raw wire bytes pass through the same entry point.
        assert_eq!(
            TransactionStatusMeta::from_compressed_bytes(&meta.encode()).unwrap(),
            meta
        );
    }

    #[test]
    fn invalid_option_tag_in_required_prefix_is_hard() {
        // status Ok, fee, balances, then a bad option tag where a later
        // generation would have written inner_instructions. The tag is
        // trailing, so it reads as truncation, but a bad *bool* inside a
        // required field does not.
        let mut bytes = vec![0x00];
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.push(0);
        bytes.push(0);
        bytes.push(0x7F); // garbage where the option tag would be
        let decoded = TransactionStatusMeta::decode(&bytes).unwrap();
        assert_eq!(decoded.inner_instructions, None);

        // A status discriminant that is neither 0 nor 1 is required-field
        // corruption and must fail.
        let bytes = [0x02];
        assert!(TransactionStatusMeta::decode(&bytes).is_err());
    }
}
