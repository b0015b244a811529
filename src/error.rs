use solana_program::{program_error::ProgramError, pubkey::Pubkey};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[repr(u32)]
pub enum StakeError {
    /// Initialization payload failed a bounds check
    #[error("invalid initialization config")]
    InvalidConfig = 0,
    /// No bump in 255..=0 produced an off-curve address
    #[error("program address derivation exhausted")]
    DerivationExhausted = 1,
    /// Pool (or one of its derived accounts) already exists
    #[error("account already initialized")]
    AccountAlreadyInitialized = 2,
    /// Payer cannot fund the accounts being created
    #[error("insufficient funding")]
    InsufficientFunding = 3,
    /// Ledger rejected or dropped the unit of work
    #[error("external ledger failure")]
    ExternalLedgerFailure = 4,
    /// Account funded below the rent-exempt minimum
    #[error("account not rent exempt")]
    NotRentExempt = 5,
    /// Mint or token account initialized twice
    #[error("token account already initialized")]
    TokenAlreadyInitialized = 6,
    /// Account key does not match its PDA derivation
    #[error("invalid program derived address")]
    InvalidPda = 7,
    /// Authority or owner is an on-curve (externally held) key
    #[error("authority is not a derived address")]
    AuthorityNotDerived = 8,
    /// Account owned by an unexpected program
    #[error("invalid account owner")]
    InvalidAccountOwner = 9,
    /// Account data has the wrong size or layout
    #[error("invalid account data")]
    InvalidAccountData = 10,
    /// Token program is not SPL Token
    #[error("invalid token program")]
    InvalidTokenProgram = 11,
    /// System program is not the system program
    #[error("invalid system program")]
    InvalidSystemProgram = 12,
}

impl From<StakeError> for ProgramError {
    fn from(e: StakeError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

/// Initialization step an [`InitError`] was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    Derive,
    Provision,
    Bootstrap,
    Commit,
}

impl core::fmt::Display for InitStep {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            InitStep::Derive => "derive",
            InitStep::Provision => "provision",
            InitStep::Bootstrap => "bootstrap",
            InitStep::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// Host-side initialization failure: which step, which address, what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{step} failed{}: {kind}", .address.map(|a| format!(" at {a}")).unwrap_or_default())]
pub struct InitError {
    pub step: InitStep,
    pub address: Option<Pubkey>,
    pub kind: StakeError,
}

impl InitError {
    pub fn new(step: InitStep, kind: StakeError) -> Self {
        Self { step, address: None, kind }
    }

    pub fn at(step: InitStep, address: Pubkey, kind: StakeError) -> Self {
        Self { step, address: Some(address), kind }
    }
}
