// Ledger records, their on-ledger codec and the derived keys they live at.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{pubkey::Pubkey, rent::Rent};

use crate::error::StakingError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const GLOBAL_SEED: &[u8] = b"global-state";
pub const FEE_VAULT_SEED: &[u8] = b"fee-vault";
pub const STAKER_SEED: &[u8] = b"staker";

/// Fee rates are expressed out of this denominator (100_000 = 100%, 1_000 = 1%).
pub const FEE_DENOMINATOR: u32 = 100_000;

/// Fee rate applied when Initialize is called without one: 1%.
pub const DEFAULT_FEE_RATE_UNITS: u32 = 1_000;

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

pub fn global_address() -> (Pubkey, u8) {
    Pubkey::find_program_address(&[GLOBAL_SEED], &crate::ID)
}

pub fn vault_address() -> (Pubkey, u8) {
    Pubkey::find_program_address(&[FEE_VAULT_SEED], &crate::ID)
}

pub fn staker_address(owner: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[STAKER_SEED, owner.as_ref()], &crate::ID)
}

// ---------------------------------------------------------------------------
// Record codec
// ---------------------------------------------------------------------------

/// Leading byte of every persisted record.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Global = 1,
    Vault = 2,
    Staker = 3,
}

impl TryFrom<u8> for RecordKind {
    type Error = StakingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(RecordKind::Global),
            2 => Ok(RecordKind::Vault),
            3 => Ok(RecordKind::Staker),
            _ => Err(StakingError::InvalidAccountData),
        }
    }
}

pub trait Record: BorshSerialize + BorshDeserialize {
    const KIND: RecordKind;
    /// Encoded length including the kind byte.
    const SIZE: usize;

    fn encode(&self) -> Result<Vec<u8>, StakingError> {
        let mut data = Vec::with_capacity(Self::SIZE);
        data.push(Self::KIND as u8);
        self.serialize(&mut data)
            .map_err(|_| StakingError::InvalidAccountData)?;
        Ok(data)
    }

    fn decode(data: &[u8]) -> Result<Self, StakingError> {
        let (tag, body) = data.split_first().ok_or(StakingError::NotFound)?;
        if RecordKind::try_from(*tag)? != Self::KIND {
            return Err(StakingError::InvalidAccountData);
        }
        Self::try_from_slice(body).map_err(|_| StakingError::InvalidAccountData)
    }

    fn rent_exempt_minimum() -> u64 {
        Rent::default().minimum_balance(Self::SIZE)
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct GlobalState {
    pub admin: Pubkey,
    pub vault: Pubkey,
    /// Sum of `amount` over every live staker record.
    pub total_staked: u64,
    /// Accumulated reward per staked lamport, scaled by `accumulator::SCALE`.
    pub reward_per_share: u128,
    pub fee_rate_units: u32,
    pub bump: u8,
}

impl GlobalState {
    pub fn new(admin: Pubkey, vault: Pubkey, fee_rate_units: u32, bump: u8) -> Self {
        Self {
            admin,
            vault,
            total_staked: 0,
            reward_per_share: 0,
            fee_rate_units,
            bump,
        }
    }

    pub fn increase_total_staked(&mut self, amount: u64) -> Result<(), StakingError> {
        self.total_staked = self
            .total_staked
            .checked_add(amount)
            .ok_or(StakingError::MathError)?;
        Ok(())
    }

    pub fn decrease_total_staked(&mut self, amount: u64) -> Result<(), StakingError> {
        self.total_staked = self
            .total_staked
            .checked_sub(amount)
            .ok_or(StakingError::MathError)?;
        Ok(())
    }

    pub fn set_fee_rate_units(&mut self, fee_rate_units: u32) -> Result<(), StakingError> {
        validate_fee_rate(fee_rate_units)?;
        self.fee_rate_units = fee_rate_units;
        Ok(())
    }
}

impl Record for GlobalState {
    const KIND: RecordKind = RecordKind::Global;
    // 1 + 32 + 32 + 8 + 16 + 4 + 1 = 94
    const SIZE: usize = 94;
}

/// The fee vault record. Its balance is the lamports held at the vault key.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct FeeVault {
    pub bump: u8,
}

impl Record for FeeVault {
    const KIND: RecordKind = RecordKind::Vault;
    // 1 + 1 = 2
    const SIZE: usize = 2;
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Staker {
    pub owner: Pubkey,
    pub amount: u64,
    /// Snapshot of `reward_per_share` at last settlement.
    pub reward_debt: u128,
    pub bump: u8,
}

impl Staker {
    /// New stakers only earn from fees accrued after they join.
    pub fn new(owner: Pubkey, global: &GlobalState, bump: u8) -> Self {
        Self {
            owner,
            amount: 0,
            reward_debt: global.reward_per_share,
            bump,
        }
    }

    pub fn increase_amount(&mut self, amount: u64) -> Result<(), StakingError> {
        self.amount = self
            .amount
            .checked_add(amount)
            .ok_or(StakingError::MathError)?;
        Ok(())
    }

    pub fn decrease_amount(&mut self, amount: u64) -> Result<(), StakingError> {
        if self.amount < amount {
            return Err(StakingError::InsufficientFunds);
        }
        self.amount -= amount;
        Ok(())
    }
}

impl Record for Staker {
    const KIND: RecordKind = RecordKind::Staker;
    // 1 + 32 + 8 + 16 + 1 = 58
    const SIZE: usize = 58;
}

pub fn validate_fee_rate(fee_rate_units: u32) -> Result<(), StakingError> {
    if fee_rate_units > FEE_DENOMINATOR {
        return Err(StakingError::MathError);
    }
    Ok(())
}
