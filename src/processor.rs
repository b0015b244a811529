//! On-chain executor for the initialization plan.
//!
//! Only the rejection paths before the first CPI are unit tested
//! (`tests/processor.rs`). The CPI arms run under `solana-program-test`,
//! which is not enabled; the plan itself is exercised on `MemoryLedger`.

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};

use crate::config::InitializeData;
use crate::error::StakeError;
use crate::initializer;
use crate::instruction::StakeInstruction;
use crate::ledger::Operation;
use crate::pda::{PoolAddresses, Role, Slot};
use crate::state::REGISTRY_HEADER_SIZE;

/// Verify the token program is the real SPL Token program.
/// Mint and account initialization go through it, and every pool authority
/// it records is only as good as the program doing the recording.
fn verify_token_program(token_program: &AccountInfo) -> ProgramResult {
    if *token_program.key != spl_token::id() {
        msg!("Error: invalid token program {}", token_program.key);
        return Err(StakeError::InvalidTokenProgram.into());
    }
    Ok(())
}

fn verify_system_program(system_program: &AccountInfo) -> ProgramResult {
    if *system_program.key != solana_program::system_program::id() {
        msg!("Error: invalid system program {}", system_program.key);
        return Err(StakeError::InvalidSystemProgram.into());
    }
    Ok(())
}

/// Create a PDA-owned account at `new_account`.
///
/// `create_account` refuses an address that already holds lamports, and
/// anyone can send lamports to a derived address. A funded, unallocated
/// target is topped up to `lamports`, then allocated and assigned.
fn create_pda_account<'a>(
    payer: &AccountInfo<'a>,
    new_account: &AccountInfo<'a>,
    system_program: &AccountInfo<'a>,
    lamports: u64,
    space: u64,
    owner: &Pubkey,
    seeds: &[&[u8]],
) -> ProgramResult {
    let current = new_account.lamports();
    if current == 0 {
        return invoke_signed(
            &system_instruction::create_account(payer.key, new_account.key, lamports, space, owner),
            &[payer.clone(), new_account.clone(), system_program.clone()],
            &[seeds],
        );
    }

    if !new_account.data_is_empty() || *new_account.owner != solana_program::system_program::id() {
        msg!("Error: {} already in use", new_account.key);
        return Err(StakeError::AccountAlreadyInitialized.into());
    }

    let top_up = lamports.saturating_sub(current);
    if top_up > 0 {
        invoke(
            &system_instruction::transfer(payer.key, new_account.key, top_up),
            &[payer.clone(), new_account.clone(), system_program.clone()],
        )?;
    }
    invoke_signed(
        &system_instruction::allocate(new_account.key, space),
        &[new_account.clone(), system_program.clone()],
        &[seeds],
    )?;
    invoke_signed(
        &system_instruction::assign(new_account.key, owner),
        &[new_account.clone(), system_program.clone()],
        &[seeds],
    )
}

/// Look up one of the verified pool accounts by key.
fn find_account<'a, 'b>(
    accounts: &[(Slot, &'b AccountInfo<'a>)],
    address: &Pubkey,
) -> Result<&'b AccountInfo<'a>, ProgramError> {
    accounts
        .iter()
        .find(|(_, info)| info.key == address)
        .map(|(_, info)| *info)
        .ok_or(ProgramError::NotEnoughAccountKeys)
}

pub fn process(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    let instruction = StakeInstruction::unpack(instruction_data)?;

    match instruction {
        StakeInstruction::Initialize { root, data } => {
            process_initialize(program_id, accounts, &root, &data)
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// 0: Initialize
// ═══════════════════════════════════════════════════════════════

fn process_initialize(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    root: &Pubkey,
    data: &InitializeData,
) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();

    let payer = next_account_info(accounts_iter)?;
    let pool_config = next_account_info(accounts_iter)?;
    let reserve = next_account_info(accounts_iter)?;
    let sol_leg = next_account_info(accounts_iter)?;
    let stake_list = next_account_info(accounts_iter)?;
    let validator_list = next_account_info(accounts_iter)?;
    let st_mint = next_account_info(accounts_iter)?;
    let lp_mint = next_account_info(accounts_iter)?;
    let st_leg = next_account_info(accounts_iter)?;
    let treasury_st_account = next_account_info(accounts_iter)?;
    let token_program = next_account_info(accounts_iter)?;
    let system_program = next_account_info(accounts_iter)?;

    if !payer.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    if let Err(violation) = data.validate() {
        msg!("Error: invalid config: {}", violation);
        return Err(StakeError::from(violation).into());
    }

    // Derive and verify every pool PDA
    let addresses = PoolAddresses::derive(program_id, root)?;
    let pool_accounts = [
        (Slot::PoolConfig, pool_config),
        (Slot::Pool(Role::Reserve), reserve),
        (Slot::Pool(Role::SolLeg), sol_leg),
        (Slot::Pool(Role::StakeList), stake_list),
        (Slot::Pool(Role::ValidatorList), validator_list),
        (Slot::Pool(Role::StMint), st_mint),
        (Slot::Pool(Role::LpMint), lp_mint),
        (Slot::Pool(Role::StLeg), st_leg),
        (Slot::Pool(Role::TreasuryStAccount), treasury_st_account),
    ];
    for (slot, info) in &pool_accounts {
        let expected = addresses.slot(*slot).address;
        if *info.key != expected {
            msg!("Error: {:?} is {}, expected {}", slot, info.key, expected);
            return Err(StakeError::InvalidPda.into());
        }
    }

    if !pool_config.data_is_empty() {
        return Err(StakeError::AccountAlreadyInitialized.into());
    }

    // Validate programs BEFORE any invoke_signed that grants PDA signer authority
    verify_token_program(token_program)?;
    verify_system_program(system_program)?;

    let rent = Rent::get()?;
    let ops = initializer::plan(&addresses, data, &rent)?;

    for op in &ops {
        match op {
            Operation::CreateAccount { slot, address, space, lamports, owner } => {
                let target = find_account(&pool_accounts, address)?;
                let bump = [addresses.slot(*slot).bump];
                let seeds = addresses.signer_seeds(*slot, &bump);
                create_pda_account(payer, target, system_program, *lamports, *space, owner, &seeds)?;
            }
            Operation::Fund { address, lamports } => {
                let target = find_account(&pool_accounts, address)?;
                if !target.data_is_empty() || *target.owner != solana_program::system_program::id() {
                    msg!("Error: {} is not a plain system account", address);
                    return Err(StakeError::AccountAlreadyInitialized.into());
                }
                let top_up = lamports.saturating_sub(target.lamports());
                if top_up > 0 {
                    invoke(
                        &system_instruction::transfer(payer.key, address, top_up),
                        &[payer.clone(), target.clone(), system_program.clone()],
                    )?;
                }
            }
            Operation::InitializeMint { mint, decimals, mint_authority, freeze_authority } => {
                let mint_info = find_account(&pool_accounts, mint)?;
                invoke(
                    &spl_token::instruction::initialize_mint2(
                        token_program.key,
                        mint,
                        mint_authority,
                        freeze_authority.as_ref(),
                        *decimals,
                    )?,
                    &[mint_info.clone(), token_program.clone()],
                )?;
            }
            Operation::InitializeTokenAccount { account, mint, owner } => {
                let account_info = find_account(&pool_accounts, account)?;
                let mint_info = find_account(&pool_accounts, mint)?;
                invoke(
                    &spl_token::instruction::initialize_account3(
                        token_program.key,
                        account,
                        mint,
                        owner,
                    )?,
                    &[account_info.clone(), mint_info.clone(), token_program.clone()],
                )?;
            }
            Operation::WriteRegistry { address, header } => {
                let target = find_account(&pool_accounts, address)?;
                let mut target_data = target.try_borrow_mut_data()?;
                if target_data.len() < REGISTRY_HEADER_SIZE {
                    return Err(StakeError::InvalidAccountData.into());
                }
                target_data[..REGISTRY_HEADER_SIZE].copy_from_slice(bytemuck::bytes_of(header));
            }
            Operation::WriteConfig { address, config } => {
                let target = find_account(&pool_accounts, address)?;
                let mut target_data = target.try_borrow_mut_data()?;
                let bytes = bytemuck::bytes_of(config.as_ref());
                if target_data.len() != bytes.len() {
                    return Err(StakeError::InvalidAccountData.into());
                }
                target_data.copy_from_slice(bytes);
            }
        }
    }

    msg!(
        "Initialized pool {} (root {}, st mint {}, lp mint {})",
        pool_config.key,
        root,
        st_mint.key,
        lp_mint.key
    );
    Ok(())
}
