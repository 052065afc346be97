// Instruction handlers.
//
// Each handler runs against a `LedgerTransaction` that only sees the keys its
// instruction declares. Handlers validate everything before the transaction
// is committed; any error drops the staged writes.

use solana_program::{msg, pubkey::Pubkey};

use crate::{
    accumulator::{accrue_fee, fee_for, is_settled, pending, settle},
    auth::assert_admin,
    error::StakingError,
    instruction::StakingInstruction,
    ledger::{LedgerStore, LedgerTransaction},
    state::{
        global_address, staker_address, validate_fee_rate, vault_address, FeeVault, GlobalState,
        Record, Staker, DEFAULT_FEE_RATE_UNITS,
    },
};

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

/// Decode and execute one instruction signed by `caller`, applying its writes
/// to `store` only if it succeeds.
pub fn process_instruction<S: LedgerStore + ?Sized>(
    store: &mut S,
    caller: &Pubkey,
    instruction_data: &[u8],
) -> Result<(), StakingError> {
    let instruction = StakingInstruction::unpack(instruction_data)?;
    execute(store, caller, &instruction)
}

pub fn execute<S: LedgerStore + ?Sized>(
    store: &mut S,
    caller: &Pubkey,
    instruction: &StakingInstruction,
) -> Result<(), StakingError> {
    let declared = instruction.accounts(caller);
    let mut tx = LedgerTransaction::begin(&*store, &declared);

    let outcome = match instruction {
        StakingInstruction::Initialize(args) => {
            process_initialize(&mut tx, caller, args.fee_rate_units)
        }
        StakingInstruction::CreateStake(args) => {
            process_create_stake(&mut tx, caller, args.amount)
        }
        StakingInstruction::AddStake(args) => process_add_stake(&mut tx, caller, args.amount),
        StakingInstruction::DecreaseStake(args) => {
            process_decrease_stake(&mut tx, caller, args.amount)
        }
        StakingInstruction::CloseStake => process_close_stake(&mut tx, caller),
        StakingInstruction::ClaimRewards => process_claim_rewards(&mut tx, caller),
        StakingInstruction::FeeTransfer(args) => {
            process_fee_transfer(&mut tx, caller, &args.to, args.amount)
        }
        StakingInstruction::UpdateAdmin(args) => {
            process_update_admin(&mut tx, caller, &args.new_admin)
        }
        StakingInstruction::UpdateFeeRate(args) => {
            process_update_fee_rate(&mut tx, caller, args.fee_rate_units)
        }
        StakingInstruction::EmergencyWithdraw(args) => {
            process_emergency_withdraw(&mut tx, caller, args.amount)
        }
    };
    outcome?;

    let writes = tx.commit();
    store.apply(writes);
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_global<S: LedgerStore + ?Sized>(
    tx: &LedgerTransaction<'_, S>,
) -> Result<(Pubkey, GlobalState), StakingError> {
    let key = global_address().0;
    match tx.get::<GlobalState>(&key) {
        Ok(global) => Ok((key, global)),
        Err(StakingError::NotFound) => Err(StakingError::NotInitialized),
        Err(e) => Err(e),
    }
}

fn load_staker<S: LedgerStore + ?Sized>(
    tx: &LedgerTransaction<'_, S>,
    user: &Pubkey,
) -> Result<(Pubkey, Staker), StakingError> {
    let key = staker_address(user).0;
    let staker = tx.get::<Staker>(&key)?;
    if staker.owner != *user {
        return Err(StakingError::Unauthorized);
    }
    Ok((key, staker))
}

fn require_amount(amount: u64) -> Result<(), StakingError> {
    if amount == 0 {
        return Err(StakingError::InvalidAmount);
    }
    Ok(())
}

fn require_settled(global: &GlobalState, staker: &Staker) -> Result<(), StakingError> {
    if !is_settled(global, staker) {
        return Err(StakingError::RewardDebtNotZero);
    }
    Ok(())
}

/// Top `key` up to the rent-exempt minimum of a record of type `R`.
fn fund_rent<R: Record, S: LedgerStore + ?Sized>(
    tx: &mut LedgerTransaction<'_, S>,
    payer: &Pubkey,
    key: &Pubkey,
) -> Result<(), StakingError> {
    let shortfall = R::rent_exempt_minimum().saturating_sub(tx.lamports(key)?);
    if shortfall > 0 {
        tx.transfer(payer, key, shortfall)?;
    }
    Ok(())
}

/// Vault lamports above its rent reserve.
pub(crate) fn spendable(vault_lamports: u64) -> u64 {
    vault_lamports.saturating_sub(FeeVault::rent_exempt_minimum())
}

fn pay_from_vault<S: LedgerStore + ?Sized>(
    tx: &mut LedgerTransaction<'_, S>,
    vault: &Pubkey,
    to: &Pubkey,
    amount: u64,
) -> Result<(), StakingError> {
    if spendable(tx.lamports(vault)?) < amount {
        return Err(StakingError::InsufficientFunds);
    }
    tx.transfer(vault, to, amount)
}

/// Pay out pending rewards and settle. Shared by ClaimRewards and CloseStake.
fn claim<S: LedgerStore + ?Sized>(
    tx: &mut LedgerTransaction<'_, S>,
    global: &GlobalState,
    staker: &mut Staker,
    user: &Pubkey,
) -> Result<u64, StakingError> {
    let reward = pending(global, staker)?;
    if reward > 0 {
        pay_from_vault(tx, &global.vault, user, reward)?;
    }
    settle(global, staker);
    Ok(reward)
}

// ---------------------------------------------------------------------------
// Instruction: Initialize
// ---------------------------------------------------------------------------

pub fn process_initialize<S: LedgerStore + ?Sized>(
    tx: &mut LedgerTransaction<'_, S>,
    admin: &Pubkey,
    fee_rate_units: Option<u32>,
) -> Result<(), StakingError> {
    let (global_key, global_bump) = global_address();
    let (vault_key, vault_bump) = vault_address();

    if tx.has_record(&global_key)? || tx.has_record(&vault_key)? {
        return Err(StakingError::AlreadyInitialized);
    }

    let fee_rate_units = fee_rate_units.unwrap_or(DEFAULT_FEE_RATE_UNITS);
    validate_fee_rate(fee_rate_units)?;

    fund_rent::<GlobalState, _>(tx, admin, &global_key)?;
    fund_rent::<FeeVault, _>(tx, admin, &vault_key)?;

    let global = GlobalState::new(*admin, vault_key, fee_rate_units, global_bump);
    tx.create(&global_key, &global)?;
    tx.create(&vault_key, &FeeVault { bump: vault_bump })?;

    msg!(
        "EVENT:StakingInitialized:{{\"admin\":\"{}\",\"vault\":\"{}\",\"fee_rate_units\":{}}}",
        admin,
        vault_key,
        fee_rate_units,
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// Instruction: CreateStake
// ---------------------------------------------------------------------------

pub fn process_create_stake<S: LedgerStore + ?Sized>(
    tx: &mut LedgerTransaction<'_, S>,
    user: &Pubkey,
    amount: u64,
) -> Result<(), StakingError> {
    require_amount(amount)?;

    let (global_key, mut global) = load_global(tx)?;
    let (staker_key, staker_bump) = staker_address(user);
    if tx.has_record(&staker_key)? {
        return Err(StakingError::AlreadyInitialized);
    }

    fund_rent::<Staker, _>(tx, user, &staker_key)?;
    tx.transfer(user, &staker_key, amount)?;

    let mut staker = Staker::new(*user, &global, staker_bump);
    staker.increase_amount(amount)?;
    global.increase_total_staked(amount)?;

    tx.create(&staker_key, &staker)?;
    tx.put(&global_key, &global)?;

    msg!(
        "EVENT:StakeCreated:{{\"user\":\"{}\",\"amount\":{},\"total_staked\":{}}}",
        user,
        amount,
        global.total_staked,
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// Instruction: AddStake
// ---------------------------------------------------------------------------

pub fn process_add_stake<S: LedgerStore + ?Sized>(
    tx: &mut LedgerTransaction<'_, S>,
    user: &Pubkey,
    amount: u64,
) -> Result<(), StakingError> {
    require_amount(amount)?;

    let (global_key, mut global) = load_global(tx)?;
    let (staker_key, mut staker) = load_staker(tx, user)?;
    require_settled(&global, &staker)?;

    tx.transfer(user, &staker_key, amount)?;
    staker.increase_amount(amount)?;
    global.increase_total_staked(amount)?;

    tx.put(&staker_key, &staker)?;
    tx.put(&global_key, &global)?;

    msg!(
        "EVENT:StakeAdded:{{\"user\":\"{}\",\"amount\":{},\"staked\":{},\"total_staked\":{}}}",
        user,
        amount,
        staker.amount,
        global.total_staked,
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// Instruction: DecreaseStake
// ---------------------------------------------------------------------------

pub fn process_decrease_stake<S: LedgerStore + ?Sized>(
    tx: &mut LedgerTransaction<'_, S>,
    user: &Pubkey,
    amount: u64,
) -> Result<(), StakingError> {
    require_amount(amount)?;

    let (global_key, mut global) = load_global(tx)?;
    let (staker_key, mut staker) = load_staker(tx, user)?;
    require_settled(&global, &staker)?;

    staker.decrease_amount(amount)?;
    global.decrease_total_staked(amount)?;
    tx.transfer(&staker_key, user, amount)?;

    tx.put(&staker_key, &staker)?;
    tx.put(&global_key, &global)?;

    msg!(
        "EVENT:StakeDecreased:{{\"user\":\"{}\",\"amount\":{},\"staked\":{},\"total_staked\":{}}}",
        user,
        amount,
        staker.amount,
        global.total_staked,
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// Instruction: ClaimRewards
// ---------------------------------------------------------------------------

pub fn process_claim_rewards<S: LedgerStore + ?Sized>(
    tx: &mut LedgerTransaction<'_, S>,
    user: &Pubkey,
) -> Result<(), StakingError> {
    let (_, global) = load_global(tx)?;
    let (staker_key, mut staker) = load_staker(tx, user)?;

    let reward = claim(tx, &global, &mut staker, user)?;
    tx.put(&staker_key, &staker)?;

    msg!(
        "EVENT:RewardsClaimed:{{\"user\":\"{}\",\"amount\":{}}}",
        user,
        reward,
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// Instruction: CloseStake
// ---------------------------------------------------------------------------

pub fn process_close_stake<S: LedgerStore + ?Sized>(
    tx: &mut LedgerTransaction<'_, S>,
    user: &Pubkey,
) -> Result<(), StakingError> {
    let (global_key, mut global) = load_global(tx)?;
    let (staker_key, mut staker) = load_staker(tx, user)?;

    let reward = claim(tx, &global, &mut staker, user)?;
    global.decrease_total_staked(staker.amount)?;

    // Stake and rent both go back to the owner.
    let refund = tx.lamports(&staker_key)?;
    tx.transfer(&staker_key, user, refund)?;
    tx.delete::<Staker>(&staker_key)?;
    tx.put(&global_key, &global)?;

    msg!(
        "EVENT:StakeClosed:{{\"user\":\"{}\",\"unstaked\":{},\"rewards\":{},\"refund\":{},\"total_staked\":{}}}",
        user,
        staker.amount,
        reward,
        refund,
        global.total_staked,
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// Instruction: FeeTransfer
// ---------------------------------------------------------------------------

pub fn process_fee_transfer<S: LedgerStore + ?Sized>(
    tx: &mut LedgerTransaction<'_, S>,
    from: &Pubkey,
    to: &Pubkey,
    amount: u64,
) -> Result<(), StakingError> {
    let (global_key, mut global) = load_global(tx)?;

    if tx.has_record(from)? || tx.has_record(to)? {
        return Err(StakingError::InvalidAccount);
    }

    let fee = fee_for(amount, global.fee_rate_units)?;
    let total = amount.checked_add(fee).ok_or(StakingError::MathError)?;
    if tx.lamports(from)? < total {
        return Err(StakingError::InsufficientFunds);
    }

    tx.transfer(from, to, amount)?;
    tx.transfer(from, &global.vault, fee)?;
    accrue_fee(&mut global, fee)?;
    tx.put(&global_key, &global)?;

    msg!(
        "EVENT:FeeTransfer:{{\"from\":\"{}\",\"to\":\"{}\",\"amount\":{},\"fee\":{},\"reward_per_share\":{}}}",
        from,
        to,
        amount,
        fee,
        global.reward_per_share,
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// Instruction: UpdateAdmin
// ---------------------------------------------------------------------------

pub fn process_update_admin<S: LedgerStore + ?Sized>(
    tx: &mut LedgerTransaction<'_, S>,
    caller: &Pubkey,
    new_admin: &Pubkey,
) -> Result<(), StakingError> {
    let (global_key, mut global) = load_global(tx)?;
    assert_admin(&global, caller)?;

    global.admin = *new_admin;
    tx.put(&global_key, &global)?;

    msg!(
        "EVENT:AdminUpdated:{{\"old_admin\":\"{}\",\"new_admin\":\"{}\"}}",
        caller,
        new_admin,
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// Instruction: UpdateFeeRate
// ---------------------------------------------------------------------------

pub fn process_update_fee_rate<S: LedgerStore + ?Sized>(
    tx: &mut LedgerTransaction<'_, S>,
    caller: &Pubkey,
    fee_rate_units: u32,
) -> Result<(), StakingError> {
    let (global_key, mut global) = load_global(tx)?;
    assert_admin(&global, caller)?;

    let previous = global.fee_rate_units;
    global.set_fee_rate_units(fee_rate_units)?;
    tx.put(&global_key, &global)?;

    msg!(
        "EVENT:FeeRateUpdated:{{\"admin\":\"{}\",\"from\":{},\"to\":{}}}",
        caller,
        previous,
        fee_rate_units,
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// Instruction: EmergencyWithdraw
// ---------------------------------------------------------------------------

pub fn process_emergency_withdraw<S: LedgerStore + ?Sized>(
    tx: &mut LedgerTransaction<'_, S>,
    caller: &Pubkey,
    amount: u64,
) -> Result<(), StakingError> {
    let (_, global) = load_global(tx)?;
    assert_admin(&global, caller)?;

    pay_from_vault(tx, &global.vault, caller, amount)?;

    msg!(
        "EVENT:EmergencyWithdraw:{{\"admin\":\"{}\",\"amount\":{},\"vault_remaining\":{}}}",
        caller,
        amount,
        tx.lamports(&global.vault)?,
    );

    Ok(())
}
