//! Processor rejection paths, driven with hand-built `AccountInfo`s.
//!
//! Every case here fails before the first CPI, so no runtime is needed.
//! The CPI executor itself (account creation, mint and token account
//! initialization, registry and config writes) needs `solana-program-test`,
//! which is disabled in Cargo.toml; see the commented-out test at the end.
//! The operation plan it executes is covered end to end in `initialize.rs`.

use liquid_stake_pool::config::InitializeData;
use liquid_stake_pool::error::StakeError;
use liquid_stake_pool::instruction::StakeInstruction;
use liquid_stake_pool::pda::{PoolAddresses, Role};
use liquid_stake_pool::processor::process;
use liquid_stake_pool::state::{Fee, POOL_CONFIG_SIZE};
use solana_program::{account_info::AccountInfo, program_error::ProgramError, pubkey::Pubkey};

// --- Harness ---

struct TestAccount {
    key: Pubkey,
    owner: Pubkey,
    lamports: u64,
    data: Vec<u8>,
    is_signer: bool,
    is_writable: bool,
    executable: bool,
}

impl TestAccount {
    fn new(key: Pubkey, owner: Pubkey, lamports: u64, data: Vec<u8>) -> Self {
        Self {
            key,
            owner,
            lamports,
            data,
            is_signer: false,
            is_writable: true,
            executable: false,
        }
    }

    fn signer(mut self) -> Self {
        self.is_signer = true;
        self
    }

    fn program(mut self) -> Self {
        self.is_writable = false;
        self.executable = true;
        self
    }

    fn to_info<'a>(&'a mut self) -> AccountInfo<'a> {
        AccountInfo::new(
            &self.key,
            self.is_signer,
            self.is_writable,
            &mut self.lamports,
            &mut self.data,
            &self.owner,
            self.executable,
            0,
        )
    }
}

fn reference_data() -> InitializeData {
    let mut data = InitializeData {
        admin_authority: Pubkey::new_unique(),
        validator_manager_authority: Pubkey::new_unique(),
        pause_authority: Pubkey::new_unique(),
        min_stake: 1_000_000_000,
        reward_fee: Fee::from_basis_points(500),
        slots_for_stake_delta: 3_000,
        ..Default::default()
    };
    data.liq_pool.lp_max_fee = Fee::from_basis_points(300);
    data.liq_pool.lp_min_fee = Fee::from_basis_points(50);
    data
}

/// Payer, the nine pool accounts in instruction order, token and system program.
fn initialize_accounts(program_id: &Pubkey, root: &Pubkey) -> Vec<TestAccount> {
    let addresses = PoolAddresses::derive(program_id, root).unwrap();
    let system = solana_program::system_program::id();
    let empty = |key: Pubkey| TestAccount::new(key, system, 0, vec![]);

    vec![
        TestAccount::new(Pubkey::new_unique(), system, 10_000_000_000, vec![]).signer(),
        empty(addresses.pool.address),
        empty(addresses.address(Role::Reserve)),
        empty(addresses.address(Role::SolLeg)),
        empty(addresses.address(Role::StakeList)),
        empty(addresses.address(Role::ValidatorList)),
        empty(addresses.address(Role::StMint)),
        empty(addresses.address(Role::LpMint)),
        empty(addresses.address(Role::StLeg)),
        empty(addresses.address(Role::TreasuryStAccount)),
        TestAccount::new(spl_token::id(), Pubkey::new_unique(), 1, vec![]).program(),
        TestAccount::new(system, Pubkey::new_unique(), 1, vec![]).program(),
    ]
}

fn run(program_id: &Pubkey, accounts: &mut [TestAccount], ix_data: &[u8]) -> Result<(), ProgramError> {
    let infos: Vec<AccountInfo> = accounts.iter_mut().map(|a| a.to_info()).collect();
    process(program_id, &infos, ix_data)
}

fn initialize_data(root: Pubkey, data: InitializeData) -> Vec<u8> {
    StakeInstruction::Initialize { root, data }.pack()
}

// --- Tests ---

#[test]
fn test_rejects_unsigned_payer() {
    let program_id = liquid_stake_pool::id();
    let root = Pubkey::new_unique();
    let mut accounts = initialize_accounts(&program_id, &root);
    accounts[0].is_signer = false;

    let result = run(&program_id, &mut accounts, &initialize_data(root, reference_data()));
    assert_eq!(result, Err(ProgramError::MissingRequiredSignature));
}

#[test]
fn test_rejects_invalid_config() {
    let program_id = liquid_stake_pool::id();
    let root = Pubkey::new_unique();
    let mut accounts = initialize_accounts(&program_id, &root);
    let mut data = reference_data();
    data.reward_fee = Fee::from_basis_points(10_001);

    let result = run(&program_id, &mut accounts, &initialize_data(root, data));
    assert_eq!(result, Err(StakeError::InvalidConfig.into()));
}

#[test]
fn test_rejects_swapped_pool_accounts() {
    let program_id = liquid_stake_pool::id();
    let root = Pubkey::new_unique();
    let mut accounts = initialize_accounts(&program_id, &root);
    accounts.swap(6, 7);

    let result = run(&program_id, &mut accounts, &initialize_data(root, reference_data()));
    assert_eq!(result, Err(StakeError::InvalidPda.into()));
}

#[test]
fn test_rejects_accounts_for_other_root() {
    let program_id = liquid_stake_pool::id();
    let mut accounts = initialize_accounts(&program_id, &Pubkey::new_unique());

    let result = run(&program_id, &mut accounts, &initialize_data(Pubkey::new_unique(), reference_data()));
    assert_eq!(result, Err(StakeError::InvalidPda.into()));
}

#[test]
fn test_rejects_existing_pool() {
    let program_id = liquid_stake_pool::id();
    let root = Pubkey::new_unique();
    let mut accounts = initialize_accounts(&program_id, &root);
    accounts[1].owner = program_id;
    accounts[1].data = vec![0; POOL_CONFIG_SIZE];

    let result = run(&program_id, &mut accounts, &initialize_data(root, reference_data()));
    assert_eq!(result, Err(StakeError::AccountAlreadyInitialized.into()));
}

#[test]
fn test_rejects_fake_token_program() {
    let program_id = liquid_stake_pool::id();
    let root = Pubkey::new_unique();
    let mut accounts = initialize_accounts(&program_id, &root);
    accounts[10].key = Pubkey::new_unique();

    let result = run(&program_id, &mut accounts, &initialize_data(root, reference_data()));
    assert_eq!(result, Err(StakeError::InvalidTokenProgram.into()));
}

#[test]
fn test_rejects_fake_system_program() {
    let program_id = liquid_stake_pool::id();
    let root = Pubkey::new_unique();
    let mut accounts = initialize_accounts(&program_id, &root);
    accounts[11].key = Pubkey::new_unique();

    let result = run(&program_id, &mut accounts, &initialize_data(root, reference_data()));
    assert_eq!(result, Err(StakeError::InvalidSystemProgram.into()));
}

#[test]
fn test_rejects_short_account_list() {
    let program_id = liquid_stake_pool::id();
    let root = Pubkey::new_unique();
    let mut accounts = initialize_accounts(&program_id, &root);
    accounts.truncate(11);

    let result = run(&program_id, &mut accounts, &initialize_data(root, reference_data()));
    assert_eq!(result, Err(ProgramError::NotEnoughAccountKeys));
}

#[test]
fn test_rejects_truncated_instruction() {
    let program_id = liquid_stake_pool::id();
    let root = Pubkey::new_unique();
    let mut accounts = initialize_accounts(&program_id, &root);
    let ix = initialize_data(root, reference_data());

    let result = run(&program_id, &mut accounts, &ix[..ix.len() - 1]);
    assert_eq!(result, Err(ProgramError::InvalidInstructionData));
}

// --- Runtime ---
//
// Needs `solana-program-test` in [dev-dependencies] and `tokio`.
//
// #[tokio::test]
// async fn test_initialize_on_runtime_with_prefunded_mint() {
//     use solana_program_test::{processor, ProgramTest};
//     use solana_sdk::{signature::Signer, system_instruction, transaction::Transaction};
//
//     let program_id = liquid_stake_pool::id();
//     let mut test = ProgramTest::new("liquid_stake_pool", program_id, processor!(process));
//     test.prefer_bpf(false);
//     let (mut banks, payer, blockhash) = test.start().await;
//
//     let root = Pubkey::new_unique();
//     let addresses = PoolAddresses::derive(&program_id, &root).unwrap();
//     let st_mint = addresses.address(Role::StMint);
//     let ix = liquid_stake_pool::instruction::initialize(
//         &program_id,
//         &payer.pubkey(),
//         &root,
//         &reference_data(),
//     )
//     .unwrap();
//     let tx = Transaction::new_signed_with_payer(
//         &[system_instruction::transfer(&payer.pubkey(), &st_mint, 1), ix],
//         Some(&payer.pubkey()),
//         &[&payer],
//         blockhash,
//     );
//     banks.process_transaction(tx).await.unwrap();
//
//     let mint = banks.get_account(st_mint).await.unwrap().unwrap();
//     assert_eq!(mint.owner, spl_token::id());
// }
