use solana_program::program_error::ProgramError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StakingError {
    #[error("Invalid instruction discriminator")]
    InvalidInstruction,
    #[error("Account already initialized")]
    AlreadyInitialized,
    #[error("Staking program not initialized")]
    NotInitialized,
    #[error("Staker account not found")]
    NotFound,
    #[error("Unauthorized action")]
    Unauthorized,
    #[error("Math overflow, underflow or value out of range")]
    MathError,
    #[error("Insufficient funds")]
    InsufficientFunds,
    #[error("Reward debt must be settled before changing the stake")]
    RewardDebtNotZero,
    #[error("Amount must be greater than zero")]
    InvalidAmount,
    #[error("Account holds a ledger record and cannot take part in a transfer")]
    InvalidAccount,
    #[error("Account data does not decode as the expected record")]
    InvalidAccountData,
    #[error("Instruction touched an account it did not declare")]
    UndeclaredAccount,
    #[error("Ledger lock poisoned")]
    LedgerUnavailable,
}

impl From<StakingError> for ProgramError {
    fn from(e: StakingError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
