// Instruction wire format: one discriminator byte followed by borsh args.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;

use crate::{
    error::StakingError,
    state::{global_address, staker_address, vault_address},
};

pub const IX_INITIALIZE: u8 = 0;
pub const IX_CREATE_STAKE: u8 = 1;
pub const IX_ADD_STAKE: u8 = 2;
pub const IX_DECREASE_STAKE: u8 = 3;
pub const IX_CLOSE_STAKE: u8 = 4;
pub const IX_CLAIM_REWARDS: u8 = 5;
pub const IX_FEE_TRANSFER: u8 = 6;
pub const IX_UPDATE_ADMIN: u8 = 7;
pub const IX_UPDATE_FEE_RATE: u8 = 8;
pub const IX_EMERGENCY_WITHDRAW: u8 = 9;

// ---------------------------------------------------------------------------
// Instruction data structs
// ---------------------------------------------------------------------------

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct InitializeArgs {
    /// Falls back to `DEFAULT_FEE_RATE_UNITS` when absent.
    pub fee_rate_units: Option<u32>,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct AmountArgs {
    pub amount: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct FeeTransferArgs {
    pub to: Pubkey,
    pub amount: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct UpdateAdminArgs {
    pub new_admin: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct UpdateFeeRateArgs {
    pub fee_rate_units: u32,
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// One instruction as submitted by `caller`, the signing identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakingInstruction {
    Initialize(InitializeArgs),
    CreateStake(AmountArgs),
    AddStake(AmountArgs),
    DecreaseStake(AmountArgs),
    CloseStake,
    ClaimRewards,
    FeeTransfer(FeeTransferArgs),
    UpdateAdmin(UpdateAdminArgs),
    UpdateFeeRate(UpdateFeeRateArgs),
    EmergencyWithdraw(AmountArgs),
}

fn parse<T: BorshDeserialize>(data: &[u8]) -> Result<T, StakingError> {
    T::try_from_slice(data).map_err(|_| StakingError::InvalidInstruction)
}

fn with_args<T: BorshSerialize>(discriminator: u8, args: &T) -> Result<Vec<u8>, StakingError> {
    let mut data = vec![discriminator];
    args.serialize(&mut data)
        .map_err(|_| StakingError::InvalidInstruction)?;
    Ok(data)
}

impl StakingInstruction {
    pub fn unpack(instruction_data: &[u8]) -> Result<Self, StakingError> {
        let (discriminator, data) = instruction_data
            .split_first()
            .ok_or(StakingError::InvalidInstruction)?;

        Ok(match *discriminator {
            IX_INITIALIZE => Self::Initialize(parse(data)?),
            IX_CREATE_STAKE => Self::CreateStake(parse(data)?),
            IX_ADD_STAKE => Self::AddStake(parse(data)?),
            IX_DECREASE_STAKE => Self::DecreaseStake(parse(data)?),
            IX_CLOSE_STAKE if data.is_empty() => Self::CloseStake,
            IX_CLAIM_REWARDS if data.is_empty() => Self::ClaimRewards,
            IX_FEE_TRANSFER => Self::FeeTransfer(parse(data)?),
            IX_UPDATE_ADMIN => Self::UpdateAdmin(parse(data)?),
            IX_UPDATE_FEE_RATE => Self::UpdateFeeRate(parse(data)?),
            IX_EMERGENCY_WITHDRAW => Self::EmergencyWithdraw(parse(data)?),
            _ => return Err(StakingError::InvalidInstruction),
        })
    }

    pub fn pack(&self) -> Result<Vec<u8>, StakingError> {
        match self {
            Self::Initialize(args) => with_args(IX_INITIALIZE, args),
            Self::CreateStake(args) => with_args(IX_CREATE_STAKE, args),
            Self::AddStake(args) => with_args(IX_ADD_STAKE, args),
            Self::DecreaseStake(args) => with_args(IX_DECREASE_STAKE, args),
            Self::CloseStake => Ok(vec![IX_CLOSE_STAKE]),
            Self::ClaimRewards => Ok(vec![IX_CLAIM_REWARDS]),
            Self::FeeTransfer(args) => with_args(IX_FEE_TRANSFER, args),
            Self::UpdateAdmin(args) => with_args(IX_UPDATE_ADMIN, args),
            Self::UpdateFeeRate(args) => with_args(IX_UPDATE_FEE_RATE, args),
            Self::EmergencyWithdraw(args) => with_args(IX_EMERGENCY_WITHDRAW, args),
        }
    }

    /// Every ledger key the instruction may read or write when signed by
    /// `caller`. The processor refuses any other key.
    pub fn accounts(&self, caller: &Pubkey) -> Vec<Pubkey> {
        let global = global_address().0;
        match self {
            Self::Initialize(_) | Self::EmergencyWithdraw(_) => {
                vec![*caller, global, vault_address().0]
            }
            Self::CreateStake(_) | Self::AddStake(_) | Self::DecreaseStake(_) => {
                vec![*caller, global, staker_address(caller).0]
            }
            Self::CloseStake | Self::ClaimRewards => vec![
                *caller,
                global,
                vault_address().0,
                staker_address(caller).0,
            ],
            Self::FeeTransfer(args) => vec![*caller, args.to, global, vault_address().0],
            Self::UpdateAdmin(_) | Self::UpdateFeeRate(_) => vec![*caller, global],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_instruction_layout() {
        let data = StakingInstruction::AddStake(AmountArgs { amount: 500 })
            .pack()
            .unwrap();
        assert_eq!(data[0], IX_ADD_STAKE);
        assert_eq!(&data[1..], &500u64.to_le_bytes());
    }

    #[test]
    fn test_initialize_optional_rate() {
        let none = StakingInstruction::Initialize(InitializeArgs {
            fee_rate_units: None,
        });
        assert_eq!(none.pack().unwrap(), vec![IX_INITIALIZE, 0]);

        let some = StakingInstruction::Initialize(InitializeArgs {
            fee_rate_units: Some(10_000),
        });
        assert_eq!(StakingInstruction::unpack(&some.pack().unwrap()).unwrap(), some);
    }

    #[test]
    fn test_pack_argumentless_instructions() {
        assert_eq!(
            StakingInstruction::CloseStake.pack(),
            Ok(vec![IX_CLOSE_STAKE])
        );
        let data = StakingInstruction::ClaimRewards.pack().unwrap();
        assert_eq!(
            StakingInstruction::unpack(&data),
            Ok(StakingInstruction::ClaimRewards)
        );
    }

    #[test]
    fn test_unpack_fee_transfer() {
        let to = Pubkey::new_unique();
        let mut data = vec![IX_FEE_TRANSFER];
        data.extend_from_slice(&borsh::to_vec(&FeeTransferArgs { to, amount: 7 }).unwrap());
        assert_eq!(
            StakingInstruction::unpack(&data).unwrap(),
            StakingInstruction::FeeTransfer(FeeTransferArgs { to, amount: 7 })
        );
    }

    #[test]
    fn test_unpack_rejects_malformed_data() {
        assert_eq!(
            StakingInstruction::unpack(&[]),
            Err(StakingError::InvalidInstruction)
        );
        assert_eq!(
            StakingInstruction::unpack(&[42]),
            Err(StakingError::InvalidInstruction)
        );
        // Truncated amount.
        assert_eq!(
            StakingInstruction::unpack(&[IX_CREATE_STAKE, 1, 2]),
            Err(StakingError::InvalidInstruction)
        );
        // Argument-less instructions take no payload.
        assert_eq!(
            StakingInstruction::unpack(&[IX_CLAIM_REWARDS, 0]),
            Err(StakingError::InvalidInstruction)
        );
    }

    #[test]
    fn test_declared_accounts() {
        let user = Pubkey::new_unique();
        let claim = StakingInstruction::ClaimRewards.accounts(&user);
        assert_eq!(
            claim,
            vec![
                user,
                global_address().0,
                vault_address().0,
                staker_address(&user).0
            ]
        );

        let update = StakingInstruction::UpdateFeeRate(UpdateFeeRateArgs { fee_rate_units: 1 })
            .accounts(&user);
        assert!(!update.contains(&vault_address().0));
    }
}
