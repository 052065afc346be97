// Admin guard consulted by UpdateAdmin, UpdateFeeRate and EmergencyWithdraw.

use solana_program::pubkey::Pubkey;

use crate::{error::StakingError, state::GlobalState};

pub fn is_admin(global: &GlobalState, caller: &Pubkey) -> bool {
    global.admin == *caller
}

/// Must run before the handler mutates anything.
pub fn assert_admin(global: &GlobalState, caller: &Pubkey) -> Result<(), StakingError> {
    if !is_admin(global, caller) {
        return Err(StakingError::Unauthorized);
    }
    Ok(())
}
