//! External ledger interface and the operations an initialization is made of.
//!
//! The pool initializer never mutates accounts itself. It builds an ordered
//! list of [`Operation`]s and hands them to a [`Ledger`] as a [`UnitOfWork`],
//! which the ledger must apply all-or-nothing. The on-chain processor executes
//! the very same operations through system and token program CPIs.
//!
//! [`MemoryLedger`] is a self-contained ledger with SPL Token semantics for
//! the two token instructions initialization needs. Host builds only.

#[cfg(not(target_os = "solana"))]
use std::collections::HashMap;

use solana_program::{
    program_option::COption,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_program,
};
use spl_token::state::{Account as TokenAccount, AccountState, Mint};
use thiserror::Error;

use crate::error::StakeError;
use crate::pda::Slot;
use crate::state::{PoolConfig, RegistryHeader, POOL_CONFIG_SIZE, REGISTRY_HEADER_SIZE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountData {
    pub lamports: u64,
    pub data: Vec<u8>,
    pub owner: Pubkey,
}

impl AccountData {
    pub fn system(lamports: u64) -> Self {
        Self { lamports, data: Vec::new(), owner: system_program::id() }
    }

    /// System-owned and data-less. Lamports sent ahead of creation do not
    /// make an address taken.
    fn is_unallocated(&self) -> bool {
        self.data.is_empty() && self.owner == system_program::id()
    }
}

/// Read side of the ledger. Enough for the invariant validator.
pub trait AccountReader {
    fn account(&self, address: &Pubkey) -> Option<AccountData>;
}

pub trait Ledger: AccountReader {
    fn rent(&self) -> Rent;

    /// Largest unit of work the ledger executes atomically. `None` = unbounded.
    fn max_operations(&self) -> Option<usize> {
        None
    }

    /// Apply every operation of `unit` or none of them.
    fn submit(&mut self, unit: &UnitOfWork) -> Result<TransactionId, LedgerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOfWork {
    pub program_id: Pubkey,
    pub payer: Pubkey,
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Allocate `space` bytes at a PDA, owned by `owner`, funded by the payer.
    CreateAccount {
        slot: Slot,
        address: Pubkey,
        space: u64,
        lamports: u64,
        owner: Pubkey,
    },
    /// Top a system account up to `lamports` (no-op when already there).
    Fund { address: Pubkey, lamports: u64 },
    InitializeMint {
        mint: Pubkey,
        decimals: u8,
        mint_authority: Pubkey,
        freeze_authority: Option<Pubkey>,
    },
    InitializeTokenAccount {
        account: Pubkey,
        mint: Pubkey,
        owner: Pubkey,
    },
    WriteRegistry { address: Pubkey, header: RegistryHeader },
    WriteConfig { address: Pubkey, config: Box<PoolConfig> },
}

/// Where an operation stands against the ledger's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpStatus {
    /// Not applied yet; safe to submit.
    Pending,
    /// Effect already present; submitting again would fail or duplicate.
    Applied,
    /// Something else occupies the target.
    Conflict,
}

impl Operation {
    pub fn address(&self) -> Pubkey {
        match self {
            Operation::CreateAccount { address, .. }
            | Operation::Fund { address, .. }
            | Operation::WriteRegistry { address, .. }
            | Operation::WriteConfig { address, .. } => *address,
            Operation::InitializeMint { mint, .. } => *mint,
            Operation::InitializeTokenAccount { account, .. } => *account,
        }
    }

    /// Lamports the payer has to put up for this operation right now.
    pub fn funding_needed<R: AccountReader + ?Sized>(&self, reader: &R) -> u64 {
        match self {
            Operation::CreateAccount { address, lamports, .. }
            | Operation::Fund { address, lamports } => {
                let current = reader.account(address).map_or(0, |a| a.lamports);
                lamports.saturating_sub(current)
            }
            _ => 0,
        }
    }

    pub fn status<R: AccountReader + ?Sized>(&self, reader: &R, program_id: &Pubkey) -> OpStatus {
        let existing = match reader.account(&self.address()) {
            Some(account) => account,
            None => return OpStatus::Pending,
        };
        if existing.is_unallocated() {
            // Not created yet, possibly pre-funded. An earlier create in the plan allocates it.
            return match self {
                Operation::Fund { lamports, .. } if existing.lamports >= *lamports => {
                    OpStatus::Applied
                }
                _ => OpStatus::Pending,
            };
        }

        match self {
            Operation::CreateAccount { space, owner, .. } => {
                if existing.owner == *owner && existing.data.len() as u64 == *space {
                    OpStatus::Applied
                } else {
                    OpStatus::Conflict
                }
            }
            Operation::Fund { .. } => OpStatus::Conflict,
            Operation::InitializeMint { decimals, mint_authority, freeze_authority, .. } => {
                if existing.owner != spl_token::id() {
                    return OpStatus::Conflict;
                }
                match Mint::unpack_unchecked(&existing.data) {
                    Ok(mint) if !mint.is_initialized => OpStatus::Pending,
                    Ok(mint)
                        if mint.decimals == *decimals
                            && mint.mint_authority == COption::Some(*mint_authority)
                            && mint.freeze_authority == to_coption(*freeze_authority)
                            && mint.supply == 0 =>
                    {
                        OpStatus::Applied
                    }
                    _ => OpStatus::Conflict,
                }
            }
            Operation::InitializeTokenAccount { mint, owner, .. } => {
                if existing.owner != spl_token::id() {
                    return OpStatus::Conflict;
                }
                match TokenAccount::unpack_unchecked(&existing.data) {
                    Ok(token) if token.state == AccountState::Uninitialized => OpStatus::Pending,
                    Ok(token) if token.mint == *mint && token.owner == *owner => OpStatus::Applied,
                    _ => OpStatus::Conflict,
                }
            }
            Operation::WriteRegistry { header, .. } => {
                if existing.owner != *program_id || existing.data.len() < REGISTRY_HEADER_SIZE {
                    return OpStatus::Conflict;
                }
                let written = &existing.data[..REGISTRY_HEADER_SIZE];
                if written.iter().all(|b| *b == 0) {
                    OpStatus::Pending
                } else if written == bytemuck::bytes_of(header) {
                    OpStatus::Applied
                } else {
                    OpStatus::Conflict
                }
            }
            Operation::WriteConfig { .. } => {
                // A written config means the pool exists; never overwrite it.
                if existing.owner == *program_id
                    && existing.data.len() == POOL_CONFIG_SIZE
                    && existing.data.iter().all(|b| *b == 0)
                {
                    OpStatus::Pending
                } else {
                    OpStatus::Conflict
                }
            }
        }
    }
}

fn to_coption(key: Option<Pubkey>) -> COption<Pubkey> {
    match key {
        Some(key) => COption::Some(key),
        None => COption::None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("account {0} already in use")]
    AccountInUse(Pubkey),
    #[error("payer {payer} has {available} lamports, needs {needed}")]
    InsufficientFunds { payer: Pubkey, needed: u64, available: u64 },
    #[error("account {0} is not rent exempt")]
    NotRentExempt(Pubkey),
    #[error("token account {0} already initialized")]
    TokenAlreadyInitialized(Pubkey),
    #[error("account {0} has an unexpected owner")]
    InvalidAccountOwner(Pubkey),
    #[error("account {0} has unexpected data")]
    InvalidAccountData(Pubkey),
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    pub fn kind(&self) -> StakeError {
        match self {
            LedgerError::AccountInUse(_) => StakeError::AccountAlreadyInitialized,
            LedgerError::InsufficientFunds { .. } => StakeError::InsufficientFunding,
            LedgerError::NotRentExempt(_) => StakeError::NotRentExempt,
            LedgerError::TokenAlreadyInitialized(_) => StakeError::TokenAlreadyInitialized,
            LedgerError::InvalidAccountOwner(_) => StakeError::InvalidAccountOwner,
            LedgerError::InvalidAccountData(_) => StakeError::InvalidAccountData,
            LedgerError::Unavailable(_) => StakeError::ExternalLedgerFailure,
        }
    }

    pub fn address(&self) -> Option<Pubkey> {
        match self {
            LedgerError::AccountInUse(a)
            | LedgerError::NotRentExempt(a)
            | LedgerError::TokenAlreadyInitialized(a)
            | LedgerError::InvalidAccountOwner(a)
            | LedgerError::InvalidAccountData(a) => Some(*a),
            LedgerError::InsufficientFunds { payer, .. } => Some(*payer),
            LedgerError::Unavailable(_) => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// In-memory ledger
// ═══════════════════════════════════════════════════════════════

/// Account store that executes units of work atomically.
///
/// Each submit applies its operations to a staged copy of the accounts and
/// swaps it in only if every operation succeeded.
#[cfg(not(target_os = "solana"))]
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    accounts: HashMap<Pubkey, AccountData>,
    rent: Rent,
    max_operations: Option<usize>,
    /// Number of submits left before an injected `Unavailable` failure
    fail_countdown: Option<usize>,
    submitted: u64,
}

#[cfg(not(target_os = "solana"))]
impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept at most `max` operations per unit of work.
    pub fn with_max_operations(mut self, max: usize) -> Self {
        self.max_operations = Some(max.max(1));
        self
    }

    pub fn airdrop(&mut self, address: &Pubkey, lamports: u64) {
        let account = self
            .accounts
            .entry(*address)
            .or_insert_with(|| AccountData::system(0));
        account.lamports = account.lamports.saturating_add(lamports);
    }

    pub fn set_account(&mut self, address: Pubkey, account: AccountData) {
        self.accounts.insert(address, account);
    }

    /// Make the submit after `skipped` successful ones fail without applying anything.
    pub fn fail_submit_after(&mut self, skipped: usize) {
        self.fail_countdown = Some(skipped);
    }

    pub fn snapshot(&self) -> HashMap<Pubkey, AccountData> {
        self.accounts.clone()
    }

    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    fn apply(
        &self,
        staged: &mut HashMap<Pubkey, AccountData>,
        program_id: &Pubkey,
        payer: &Pubkey,
        op: &Operation,
    ) -> Result<(), LedgerError> {
        match op {
            Operation::CreateAccount { address, space, lamports, owner, .. } => {
                let current = staged.get(address).cloned().unwrap_or_else(|| AccountData::system(0));
                if !current.is_unallocated() {
                    return Err(LedgerError::AccountInUse(*address));
                }
                // Pre-funded: top up, then allocate and assign.
                let space = *space as usize;
                let balance = current.lamports.max(*lamports);
                if !self.rent.is_exempt(balance, space) {
                    return Err(LedgerError::NotRentExempt(*address));
                }
                let top_up = balance - current.lamports;
                if top_up > 0 {
                    debit(staged, payer, top_up)?;
                }
                staged.insert(
                    *address,
                    AccountData { lamports: balance, data: vec![0; space], owner: *owner },
                );
            }
            Operation::Fund { address, lamports } => {
                let current = staged.get(address).cloned().unwrap_or_else(|| AccountData::system(0));
                if !current.is_unallocated() {
                    return Err(LedgerError::AccountInUse(*address));
                }
                let top_up = lamports.saturating_sub(current.lamports);
                if top_up > 0 {
                    debit(staged, payer, top_up)?;
                    staged.insert(*address, AccountData::system(current.lamports + top_up));
                }
            }
            Operation::InitializeMint { mint, decimals, mint_authority, freeze_authority } => {
                let account = token_program_account(staged, mint, Mint::LEN)?;
                if !self.rent.is_exempt(account.lamports, account.data.len()) {
                    return Err(LedgerError::NotRentExempt(*mint));
                }
                let state = Mint::unpack_unchecked(&account.data)
                    .map_err(|_| LedgerError::InvalidAccountData(*mint))?;
                if state.is_initialized {
                    return Err(LedgerError::TokenAlreadyInitialized(*mint));
                }
                let state = Mint {
                    mint_authority: COption::Some(*mint_authority),
                    supply: 0,
                    decimals: *decimals,
                    is_initialized: true,
                    freeze_authority: to_coption(*freeze_authority),
                };
                Mint::pack(state, &mut account.data)
                    .map_err(|_| LedgerError::InvalidAccountData(*mint))?;
            }
            Operation::InitializeTokenAccount { account: address, mint, owner } => {
                let mint_ready = staged
                    .get(mint)
                    .filter(|m| m.owner == spl_token::id())
                    .and_then(|m| Mint::unpack(&m.data).ok())
                    .is_some();
                if !mint_ready {
                    return Err(LedgerError::InvalidAccountData(*mint));
                }
                let account = token_program_account(staged, address, TokenAccount::LEN)?;
                if !self.rent.is_exempt(account.lamports, account.data.len()) {
                    return Err(LedgerError::NotRentExempt(*address));
                }
                let state = TokenAccount::unpack_unchecked(&account.data)
                    .map_err(|_| LedgerError::InvalidAccountData(*address))?;
                if state.state != AccountState::Uninitialized {
                    return Err(LedgerError::TokenAlreadyInitialized(*address));
                }
                let state = TokenAccount {
                    mint: *mint,
                    owner: *owner,
                    amount: 0,
                    delegate: COption::None,
                    state: AccountState::Initialized,
                    is_native: COption::None,
                    delegated_amount: 0,
                    close_authority: COption::None,
                };
                TokenAccount::pack(state, &mut account.data)
                    .map_err(|_| LedgerError::InvalidAccountData(*address))?;
            }
            Operation::WriteRegistry { address, header } => {
                let account = program_account(staged, program_id, address)?;
                if account.data.len() < REGISTRY_HEADER_SIZE {
                    return Err(LedgerError::InvalidAccountData(*address));
                }
                if account.data[..REGISTRY_HEADER_SIZE].iter().any(|b| *b != 0) {
                    return Err(LedgerError::AccountInUse(*address));
                }
                account.data[..REGISTRY_HEADER_SIZE].copy_from_slice(bytemuck::bytes_of(header));
            }
            Operation::WriteConfig { address, config } => {
                let account = program_account(staged, program_id, address)?;
                if account.data.len() != POOL_CONFIG_SIZE {
                    return Err(LedgerError::InvalidAccountData(*address));
                }
                if account.data.iter().any(|b| *b != 0) {
                    return Err(LedgerError::AccountInUse(*address));
                }
                account.data.copy_from_slice(bytemuck::bytes_of(config.as_ref()));
            }
        }
        Ok(())
    }
}

#[cfg(not(target_os = "solana"))]
fn debit(
    staged: &mut HashMap<Pubkey, AccountData>,
    payer: &Pubkey,
    lamports: u64,
) -> Result<(), LedgerError> {
    let available = staged.get(payer).map_or(0, |a| a.lamports);
    let remaining = available.checked_sub(lamports).ok_or(LedgerError::InsufficientFunds {
        payer: *payer,
        needed: lamports,
        available,
    })?;
    staged
        .entry(*payer)
        .or_insert_with(|| AccountData::system(0))
        .lamports = remaining;
    Ok(())
}

#[cfg(not(target_os = "solana"))]
fn token_program_account<'a>(
    staged: &'a mut HashMap<Pubkey, AccountData>,
    address: &Pubkey,
    len: usize,
) -> Result<&'a mut AccountData, LedgerError> {
    let account = staged
        .get_mut(address)
        .ok_or(LedgerError::InvalidAccountData(*address))?;
    if account.owner != spl_token::id() {
        return Err(LedgerError::InvalidAccountOwner(*address));
    }
    if account.data.len() != len {
        return Err(LedgerError::InvalidAccountData(*address));
    }
    Ok(account)
}

#[cfg(not(target_os = "solana"))]
fn program_account<'a>(
    staged: &'a mut HashMap<Pubkey, AccountData>,
    program_id: &Pubkey,
    address: &Pubkey,
) -> Result<&'a mut AccountData, LedgerError> {
    let account = staged
        .get_mut(address)
        .ok_or(LedgerError::InvalidAccountData(*address))?;
    if account.owner != *program_id {
        return Err(LedgerError::InvalidAccountOwner(*address));
    }
    Ok(account)
}

#[cfg(not(target_os = "solana"))]
impl AccountReader for MemoryLedger {
    fn account(&self, address: &Pubkey) -> Option<AccountData> {
        self.accounts.get(address).cloned()
    }
}

#[cfg(not(target_os = "solana"))]
impl Ledger for MemoryLedger {
    fn rent(&self) -> Rent {
        self.rent.clone()
    }

    fn max_operations(&self) -> Option<usize> {
        self.max_operations
    }

    fn submit(&mut self, unit: &UnitOfWork) -> Result<TransactionId, LedgerError> {
        if let Some(left) = self.fail_countdown {
            if left == 0 {
                self.fail_countdown = None;
                return Err(LedgerError::Unavailable("injected failure".to_string()));
            }
            self.fail_countdown = Some(left - 1);
        }
        if let Some(max) = self.max_operations {
            if unit.operations.len() > max {
                return Err(LedgerError::Unavailable(format!(
                    "unit of {} operations exceeds limit {}",
                    unit.operations.len(),
                    max
                )));
            }
        }

        let mut staged = self.accounts.clone();
        for op in &unit.operations {
            self.apply(&mut staged, &unit.program_id, &unit.payer, op)?;
        }

        self.accounts = staged;
        self.submitted += 1;
        Ok(TransactionId(self.submitted))
    }
}
