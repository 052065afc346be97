// Reward-per-share accumulator.
//
// Every fee routed to the vault raises `reward_per_share` by
// `fee * SCALE / total_staked`; a staker's claim is the growth of the
// accumulator since their `reward_debt` snapshot times their stake. Claims
// are O(1) and never iterate other stakers.

use crate::{
    error::StakingError,
    state::{GlobalState, Staker, FEE_DENOMINATOR},
};

/// Fixed-point scale of `reward_per_share` and `reward_debt` (1e12).
pub const SCALE: u128 = 1_000_000_000_000;

/// Fee charged on a transfer of `amount` at `fee_rate_units / FEE_DENOMINATOR`.
pub fn fee_for(amount: u64, fee_rate_units: u32) -> Result<u64, StakingError> {
    let fee = (amount as u128)
        .checked_mul(fee_rate_units as u128)
        .ok_or(StakingError::MathError)?
        / FEE_DENOMINATOR as u128;

    u64::try_from(fee).map_err(|_| StakingError::MathError)
}

/// Distribute `fee` over the current stake. With nothing staked the fee stays
/// in the vault and the accumulator is left untouched.
pub fn accrue_fee(global: &mut GlobalState, fee: u64) -> Result<(), StakingError> {
    if global.total_staked == 0 {
        return Ok(());
    }

    let additional = (fee as u128)
        .checked_mul(SCALE)
        .ok_or(StakingError::MathError)?
        / global.total_staked as u128;

    global.reward_per_share = global
        .reward_per_share
        .checked_add(additional)
        .ok_or(StakingError::MathError)?;

    Ok(())
}

/// Rewards owed to `staker` since their last settlement.
pub fn pending(global: &GlobalState, staker: &Staker) -> Result<u64, StakingError> {
    let delta = global
        .reward_per_share
        .checked_sub(staker.reward_debt)
        .ok_or(StakingError::MathError)?;

    let owed = delta
        .checked_mul(staker.amount as u128)
        .ok_or(StakingError::MathError)?
        / SCALE;

    u64::try_from(owed).map_err(|_| StakingError::MathError)
}

pub fn settle(global: &GlobalState, staker: &mut Staker) {
    staker.reward_debt = global.reward_per_share;
}

pub fn is_settled(global: &GlobalState, staker: &Staker) -> bool {
    staker.reward_debt == global.reward_per_share
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_program::pubkey::Pubkey;

    fn global(total_staked: u64, reward_per_share: u128) -> GlobalState {
        GlobalState {
            admin: Pubkey::new_unique(),
            vault: Pubkey::new_unique(),
            total_staked,
            reward_per_share,
            fee_rate_units: 10_000,
            bump: 255,
        }
    }

    fn staker(amount: u64, reward_debt: u128) -> Staker {
        Staker {
            owner: Pubkey::new_unique(),
            amount,
            reward_debt,
            bump: 255,
        }
    }

    #[test]
    fn test_fee_for_rounds_down() {
        assert_eq!(fee_for(100_000_000, 10_000).unwrap(), 10_000_000);
        assert_eq!(fee_for(9, 10_000).unwrap(), 0);
        assert_eq!(fee_for(19, 10_000).unwrap(), 1);
        assert_eq!(fee_for(u64::MAX, FEE_DENOMINATOR).unwrap(), u64::MAX);
        assert_eq!(fee_for(12_345, 0).unwrap(), 0);
    }

    #[test]
    fn test_fee_above_amount_is_rejected() {
        assert_eq!(
            fee_for(u64::MAX, FEE_DENOMINATOR + 1),
            Err(StakingError::MathError)
        );
    }

    #[test]
    fn test_accrue_fee_scales_by_total_stake() {
        let mut g = global(3_000_000_000, 0);
        accrue_fee(&mut g, 10_000_000).unwrap();
        assert_eq!(g.reward_per_share, 3_333_333_333);
    }

    #[test]
    fn test_accrue_fee_with_no_stake_is_stranded() {
        let mut g = global(0, 17);
        accrue_fee(&mut g, 10_000_000).unwrap();
        assert_eq!(g.reward_per_share, 17);
    }

    #[test]
    fn test_accrue_fee_overflow_is_reported() {
        let mut g = global(1, u128::MAX - 1);
        assert_eq!(accrue_fee(&mut g, 1), Err(StakingError::MathError));
        assert_eq!(g.reward_per_share, u128::MAX - 1);
    }

    #[test]
    fn test_pending_and_settle() {
        let g = global(3_000_000_000, 3_333_333_333);
        let mut s = staker(1_000_000_000, 0);
        assert_eq!(pending(&g, &s).unwrap(), 3_333_333);
        assert!(!is_settled(&g, &s));

        settle(&g, &mut s);
        assert_eq!(s.reward_debt, 3_333_333_333);
        assert_eq!(pending(&g, &s).unwrap(), 0);
        assert!(is_settled(&g, &s));

        settle(&g, &mut s);
        assert_eq!(s.reward_debt, 3_333_333_333);
    }

    #[test]
    fn test_pending_zero_stake() {
        let g = global(10, 1_000 * SCALE);
        assert_eq!(pending(&g, &staker(0, 0)).unwrap(), 0);
    }

    #[test]
    fn test_pending_debt_ahead_of_accumulator_is_an_error() {
        let g = global(10, 5);
        assert_eq!(pending(&g, &staker(10, 6)), Err(StakingError::MathError));
    }

    #[test]
    fn test_proportional_split_never_exceeds_fee() {
        let mut g = global(0, 0);
        let stakes = [1_000_000_007u64, 2_000_000_011, 333_333_333];
        g.total_staked = stakes.iter().sum();
        let fee = 9_999_999;
        accrue_fee(&mut g, fee).unwrap();

        let paid: u64 = stakes
            .iter()
            .map(|a| pending(&g, &staker(*a, 0)).unwrap())
            .sum();
        assert!(paid <= fee);
        assert!(fee - paid < stakes.len() as u64 + 1);
    }
}
