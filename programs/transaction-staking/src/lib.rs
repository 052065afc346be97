// Transaction Staking: pooled staking ledger with fee-reward distribution.
//
// Users stake lamports into a shared pool. Every fee-charged transfer routes
// part of its amount into a fee vault and raises a reward-per-share
// accumulator, so each staker claims their proportional share in O(1).

pub mod accumulator;
pub mod auth;
pub mod engine;
pub mod error;
pub mod instruction;
pub mod ledger;
pub mod processor;
pub mod state;

pub use crate::{
    engine::{StakePosition, StakingEngine},
    error::StakingError,
    instruction::StakingInstruction,
    ledger::{LedgerAccount, LedgerStore, LedgerTransaction, MemoryLedger, WriteSet},
    processor::{execute, process_instruction},
    state::{
        global_address, staker_address, vault_address, FeeVault, GlobalState, Record, Staker,
    },
};

// ---------------------------------------------------------------------------
// Program ID
// ---------------------------------------------------------------------------

solana_program::declare_id!("9eXsPTK6DZ38uFnTuVaWNkmNgmCnWrZb9k64jwJdEzsv");
