// Serialized front door to a ledger.
//
// Global is read by every instruction, so the engine runs instructions one at
// a time behind a single mutex. Share it across threads with `Arc`.

use std::sync::{Mutex, MutexGuard};

use solana_program::pubkey::Pubkey;

use crate::{
    accumulator::pending,
    auth,
    error::StakingError,
    instruction::{
        AmountArgs, FeeTransferArgs, InitializeArgs, StakingInstruction, UpdateAdminArgs,
        UpdateFeeRateArgs,
    },
    ledger::{load_record, LedgerStore},
    processor::{self, spendable},
    state::{global_address, staker_address, vault_address, GlobalState, Staker},
};

/// A staker's position as seen by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakePosition {
    pub owner: Pubkey,
    pub amount: u64,
    pub pending_rewards: u64,
    pub total_staked: u64,
}

fn read_global<S: LedgerStore + ?Sized>(ledger: &S) -> Result<GlobalState, StakingError> {
    match load_record::<GlobalState, _>(ledger, &global_address().0) {
        Err(StakingError::NotFound) => Err(StakingError::NotInitialized),
        other => other,
    }
}

pub struct StakingEngine<S: LedgerStore> {
    ledger: Mutex<S>,
}

impl<S: LedgerStore> StakingEngine<S> {
    pub fn new(ledger: S) -> Self {
        Self {
            ledger: Mutex::new(ledger),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, S>, StakingError> {
        self.ledger
            .lock()
            .map_err(|_| StakingError::LedgerUnavailable)
    }

    pub fn into_inner(self) -> Result<S, StakingError> {
        self.ledger
            .into_inner()
            .map_err(|_| StakingError::LedgerUnavailable)
    }

    /// Run `f` against the ledger while holding the lock.
    pub fn with_ledger<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R, StakingError> {
        let mut ledger = self.lock()?;
        Ok(f(&mut ledger))
    }

    pub fn execute(
        &self,
        caller: &Pubkey,
        instruction: &StakingInstruction,
    ) -> Result<(), StakingError> {
        let mut ledger = self.lock()?;
        processor::execute(&mut *ledger, caller, instruction)
    }

    pub fn process_instruction(
        &self,
        caller: &Pubkey,
        instruction_data: &[u8],
    ) -> Result<(), StakingError> {
        let mut ledger = self.lock()?;
        processor::process_instruction(&mut *ledger, caller, instruction_data)
    }

    // -----------------------------------------------------------------------
    // Instructions
    // -----------------------------------------------------------------------

    pub fn initialize(
        &self,
        admin: &Pubkey,
        fee_rate_units: Option<u32>,
    ) -> Result<(), StakingError> {
        self.execute(
            admin,
            &StakingInstruction::Initialize(InitializeArgs { fee_rate_units }),
        )
    }

    pub fn create_stake(&self, user: &Pubkey, amount: u64) -> Result<(), StakingError> {
        self.execute(user, &StakingInstruction::CreateStake(AmountArgs { amount }))
    }

    pub fn add_stake(&self, user: &Pubkey, amount: u64) -> Result<(), StakingError> {
        self.execute(user, &StakingInstruction::AddStake(AmountArgs { amount }))
    }

    pub fn decrease_stake(&self, user: &Pubkey, amount: u64) -> Result<(), StakingError> {
        self.execute(user, &StakingInstruction::DecreaseStake(AmountArgs { amount }))
    }

    pub fn close_stake(&self, user: &Pubkey) -> Result<(), StakingError> {
        self.execute(user, &StakingInstruction::CloseStake)
    }

    pub fn claim_rewards(&self, user: &Pubkey) -> Result<(), StakingError> {
        self.execute(user, &StakingInstruction::ClaimRewards)
    }

    pub fn fee_transfer(
        &self,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<(), StakingError> {
        self.execute(
            from,
            &StakingInstruction::FeeTransfer(FeeTransferArgs { to: *to, amount }),
        )
    }

    pub fn update_admin(&self, caller: &Pubkey, new_admin: &Pubkey) -> Result<(), StakingError> {
        self.execute(
            caller,
            &StakingInstruction::UpdateAdmin(UpdateAdminArgs {
                new_admin: *new_admin,
            }),
        )
    }

    pub fn update_fee_rate(
        &self,
        caller: &Pubkey,
        fee_rate_units: u32,
    ) -> Result<(), StakingError> {
        self.execute(
            caller,
            &StakingInstruction::UpdateFeeRate(UpdateFeeRateArgs { fee_rate_units }),
        )
    }

    pub fn emergency_withdraw(&self, caller: &Pubkey, amount: u64) -> Result<(), StakingError> {
        self.execute(
            caller,
            &StakingInstruction::EmergencyWithdraw(AmountArgs { amount }),
        )
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn global_state(&self) -> Result<GlobalState, StakingError> {
        read_global(&*self.lock()?)
    }

    pub fn staker(&self, owner: &Pubkey) -> Result<Staker, StakingError> {
        let ledger = self.lock()?;
        load_record(&*ledger, &staker_address(owner).0)
    }

    pub fn lamports(&self, key: &Pubkey) -> Result<u64, StakingError> {
        Ok(self.lock()?.lamports(key))
    }

    pub fn vault_balance(&self) -> Result<u64, StakingError> {
        self.lamports(&vault_address().0)
    }

    /// Vault lamports available for rewards and emergency withdrawals.
    pub fn spendable_vault_balance(&self) -> Result<u64, StakingError> {
        Ok(spendable(self.vault_balance()?))
    }

    /// `None` when `owner` has no open stake.
    pub fn stake_position(&self, owner: &Pubkey) -> Result<Option<StakePosition>, StakingError> {
        let ledger = self.lock()?;
        let global = read_global(&*ledger)?;
        let staker = match load_record::<Staker, _>(&*ledger, &staker_address(owner).0) {
            Ok(staker) => staker,
            Err(StakingError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(Some(StakePosition {
            owner: staker.owner,
            amount: staker.amount,
            pending_rewards: pending(&global, &staker)?,
            total_staked: global.total_staked,
        }))
    }

    pub fn is_admin(&self, identity: &Pubkey) -> Result<bool, StakingError> {
        Ok(auth::is_admin(&self.global_state()?, identity))
    }
}
