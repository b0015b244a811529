//! Pool initialization as an explicit state machine.
//!
//! ```text
//! Unstarted -> AddressesDerived -> AccountsProvisioned -> TokensBootstrapped -> ConfigWritten
//!      \______________\___________________\______________________\________-> Aborted
//! ```
//!
//! Every transition before the last only reads the ledger and extends the
//! plan. The final transition submits the plan, either as one unit of work
//! or as ordered stages when the ledger caps unit size. Operations whose
//! effect is already on the ledger are skipped, so re-running after a failed
//! stage picks up where the previous attempt stopped.

use solana_program::{msg, program_pack::Pack, pubkey::Pubkey, rent::Rent};
use spl_token::state::Account as TokenAccount;

use crate::bootstrap::bootstrap;
use crate::config::InitializeData;
use crate::error::{InitError, InitStep, StakeError};
use crate::ledger::{Ledger, OpStatus, Operation, TransactionId, UnitOfWork};
use crate::pda::PoolAddresses;
use crate::provision::provision;
use crate::state::PoolConfig;

/// Operations accumulated so far, for the addresses they target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub addresses: PoolAddresses,
    pub ops: Vec<Operation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitState {
    Unstarted,
    AddressesDerived(Plan),
    AccountsProvisioned(Plan),
    TokensBootstrapped(Plan),
    ConfigWritten {
        pool: Pubkey,
        transactions: Vec<TransactionId>,
    },
    Aborted(InitError),
}

impl InitState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InitState::ConfigWritten { .. } | InitState::Aborted(_))
    }
}

/// Drives one initialization for `root` against a ledger.
#[derive(Debug, Clone)]
pub struct PoolInitializer {
    program_id: Pubkey,
    payer: Pubkey,
    root: Pubkey,
    data: InitializeData,
    state: InitState,
}

impl PoolInitializer {
    pub fn new(program_id: Pubkey, payer: Pubkey, root: Pubkey, data: InitializeData) -> Self {
        Self { program_id, payer, root, data, state: InitState::Unstarted }
    }

    pub fn state(&self) -> &InitState {
        &self.state
    }

    /// Advance one transition. Terminal states are sticky.
    pub fn step<L: Ledger + ?Sized>(&mut self, ledger: &mut L) -> Result<&InitState, InitError> {
        let current = core::mem::replace(&mut self.state, InitState::Unstarted);
        let next = match current {
            InitState::Unstarted => self.derive(&*ledger),
            InitState::AddressesDerived(plan) => self.provision(&*ledger, plan),
            InitState::AccountsProvisioned(plan) => self.bootstrap(&*ledger, plan),
            InitState::TokensBootstrapped(plan) => self.commit(ledger, plan),
            done @ InitState::ConfigWritten { .. } => Ok(done),
            InitState::Aborted(err) => {
                self.state = InitState::Aborted(err.clone());
                return Err(err);
            }
        };

        match next {
            Ok(state) => {
                self.state = state;
                Ok(&self.state)
            }
            Err(err) => {
                msg!("Initialization aborted: {}", err);
                self.state = InitState::Aborted(err.clone());
                Err(err)
            }
        }
    }

    /// Step until a terminal state. Returns the pool config address.
    pub fn run<L: Ledger + ?Sized>(&mut self, ledger: &mut L) -> Result<Pubkey, InitError> {
        loop {
            if let InitState::ConfigWritten { pool, .. } = self.step(ledger)? {
                return Ok(*pool);
            }
        }
    }

    fn derive<L: Ledger + ?Sized>(&self, ledger: &L) -> Result<InitState, InitError> {
        if let Err(violation) = self.data.validate() {
            msg!("Error: invalid config: {}", violation);
            return Err(InitError::new(InitStep::Derive, violation.into()));
        }

        let addresses = PoolAddresses::derive(&self.program_id, &self.root)
            .map_err(|kind| InitError::new(InitStep::Derive, kind))?;
        let pool = addresses.pool.address;

        let written = ledger
            .account(&pool)
            .filter(|account| account.owner == self.program_id)
            .and_then(|account| PoolConfig::from_account_data(&account.data))
            .is_some();
        if written {
            msg!("Error: pool {} already initialized", pool);
            return Err(InitError::at(
                InitStep::Derive,
                pool,
                StakeError::AccountAlreadyInitialized,
            ));
        }

        msg!("Derived pool {} for root {}", pool, self.root);
        Ok(InitState::AddressesDerived(Plan { addresses, ops: Vec::new() }))
    }

    fn provision<L: Ledger + ?Sized>(&self, ledger: &L, mut plan: Plan) -> Result<InitState, InitError> {
        let ops = provision(&plan.addresses, &self.data, &ledger.rent())
            .map_err(|kind| InitError::new(InitStep::Provision, kind))?;
        plan.ops.extend(self.pending(ledger, ops, InitStep::Provision)?);
        Ok(InitState::AccountsProvisioned(plan))
    }

    fn bootstrap<L: Ledger + ?Sized>(&self, ledger: &L, mut plan: Plan) -> Result<InitState, InitError> {
        let ops = bootstrap(&plan.addresses)
            .map_err(|kind| InitError::new(InitStep::Bootstrap, kind))?;
        plan.ops.extend(self.pending(ledger, ops, InitStep::Bootstrap)?);
        Ok(InitState::TokensBootstrapped(plan))
    }

    fn commit<L: Ledger + ?Sized>(&self, ledger: &mut L, mut plan: Plan) -> Result<InitState, InitError> {
        let write = config_write(&plan.addresses, &self.data, &ledger.rent());
        plan.ops.extend(self.pending(&*ledger, vec![write], InitStep::Commit)?);

        let needed = plan
            .ops
            .iter()
            .fold(0u64, |sum, op| sum.saturating_add(op.funding_needed(&*ledger)));
        let available = ledger.account(&self.payer).map_or(0, |a| a.lamports);
        if available < needed {
            msg!(
                "Error: payer {} has {} lamports, initialization needs {}",
                self.payer,
                available,
                needed
            );
            return Err(InitError::at(
                InitStep::Commit,
                self.payer,
                StakeError::InsufficientFunding,
            ));
        }

        let stage = ledger.max_operations().unwrap_or(plan.ops.len()).max(1);
        let mut transactions = Vec::new();
        for chunk in plan.ops.chunks(stage) {
            let unit = UnitOfWork {
                program_id: self.program_id,
                payer: self.payer,
                operations: chunk.to_vec(),
            };
            let id = ledger.submit(&unit).map_err(|err| {
                msg!("Error: ledger rejected stage {}: {}", transactions.len(), err);
                InitError {
                    step: InitStep::Commit,
                    address: err.address(),
                    kind: err.kind(),
                }
            })?;
            msg!("Submitted stage {} ({} operations)", transactions.len(), chunk.len());
            transactions.push(id);
        }

        msg!("Pool {} initialized", plan.addresses.pool.address);
        Ok(InitState::ConfigWritten { pool: plan.addresses.pool.address, transactions })
    }

    /// Drop operations already applied; abort on anything occupying a target.
    fn pending<L: Ledger + ?Sized>(
        &self,
        ledger: &L,
        ops: Vec<Operation>,
        step: InitStep,
    ) -> Result<Vec<Operation>, InitError> {
        let mut pending = Vec::with_capacity(ops.len());
        for op in ops {
            match op.status(ledger, &self.program_id) {
                OpStatus::Pending => pending.push(op),
                OpStatus::Applied => {}
                OpStatus::Conflict => {
                    let address = op.address();
                    msg!("Error: account {} already in use", address);
                    return Err(InitError::at(step, address, StakeError::AccountAlreadyInitialized));
                }
            }
        }
        Ok(pending)
    }
}

fn config_write(addresses: &PoolAddresses, data: &InitializeData, rent: &Rent) -> Operation {
    let rent_exempt_for_token_acc = rent.minimum_balance(TokenAccount::LEN);
    Operation::WriteConfig {
        address: addresses.pool.address,
        config: Box::new(PoolConfig::new(addresses, data, rent_exempt_for_token_acc)),
    }
}

/// The complete, unfiltered operation list for a new pool: provisioning,
/// token bootstrap, then the pool config write.
pub fn plan(
    addresses: &PoolAddresses,
    data: &InitializeData,
    rent: &Rent,
) -> Result<Vec<Operation>, StakeError> {
    let mut ops = provision(addresses, data, rent)?;
    ops.extend(bootstrap(addresses)?);
    ops.push(config_write(addresses, data, rent));
    Ok(ops)
}

/// Initialize the pool for `root` and return its config address.
pub fn initialize<L: Ledger + ?Sized>(
    ledger: &mut L,
    program_id: &Pubkey,
    payer: &Pubkey,
    root: &Pubkey,
    data: &InitializeData,
) -> Result<Pubkey, InitError> {
    PoolInitializer::new(*program_id, *payer, *root, *data).run(ledger)
}
