//! Read-only audit of an initialized pool.
//!
//! Recomputes every derivation from the stored root and checks the ledger
//! state against it. Reports every violation found, not just the first.

use solana_program::{program_option::COption, program_pack::Pack, pubkey::Pubkey, system_program};
use spl_token::state::{Account as TokenAccount, Mint};
use thiserror::Error;

use crate::bootstrap::{LP_DECIMALS, ST_DECIMALS};
use crate::ledger::{AccountData, AccountReader};
use crate::pda::{is_off_curve, PoolAddresses, Role, Slot};
use crate::provision::RegistryLayout;
use crate::state::{PoolConfig, RegistryHeader, POOL_CONFIG_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("{slot:?}: account {address} missing")]
    MissingAccount { slot: Slot, address: Pubkey },
    #[error("{slot:?}: owned by {actual}, expected {expected}")]
    WrongOwner { slot: Slot, expected: Pubkey, actual: Pubkey },
    #[error("{slot:?}: malformed account data")]
    MalformedAccount { slot: Slot },
    #[error("pool config not initialized")]
    NotInitialized,
    #[error("no program address for the stored root")]
    Underivable,
    #[error("{slot:?}: stored address {actual}, derived {expected}")]
    AddressMismatch { slot: Slot, expected: Pubkey, actual: Pubkey },
    #[error("{slot:?}: stored bump {actual}, derived {expected}")]
    BumpMismatch { slot: Slot, expected: u8, actual: u8 },
    #[error("{slot:?}: {address} is on curve")]
    AuthorityOnCurve { slot: Slot, address: Pubkey },
    #[error("{slot:?}: mint authority {actual:?}, expected {expected}")]
    MintAuthority { slot: Slot, expected: Pubkey, actual: Option<Pubkey> },
    #[error("{slot:?}: supply {supply}, expected 0")]
    NonZeroSupply { slot: Slot, supply: u64 },
    #[error("{slot:?}: freeze authority {authority} set")]
    FreezeAuthoritySet { slot: Slot, authority: Pubkey },
    #[error("{slot:?}: {actual} decimals, expected {expected}")]
    WrongDecimals { slot: Slot, expected: u8, actual: u8 },
    #[error("{slot:?}: token owner {actual}, expected {expected}")]
    TokenOwner { slot: Slot, expected: Pubkey, actual: Pubkey },
    #[error("{slot:?}: token mint {actual}, expected {expected}")]
    TokenMint { slot: Slot, expected: Pubkey, actual: Pubkey },
    #[error("{slot:?}: wrong registry discriminator")]
    WrongDiscriminator { slot: Slot },
    #[error("{slot:?}: registry belongs to {actual}")]
    RegistryPool { slot: Slot, actual: Pubkey },
    #[error("{slot:?}: registry holds {count} records, expected none")]
    RegistryNotEmpty { slot: Slot, count: u32 },
    #[error("{slot:?}: item size {item_size}, capacity {capacity} do not fit {space} bytes")]
    RegistryCapacity { slot: Slot, item_size: u32, capacity: u32, space: usize },
    #[error("{slot:?}: system account carries {len} bytes of data")]
    UnexpectedData { slot: Slot, len: usize },
    #[error("{slot:?}: {lamports} lamports below rent-exempt minimum {minimum}")]
    NotRentExempt { slot: Slot, lamports: u64, minimum: u64 },
}

/// Check every pool invariant for the pool config at `pool`.
pub fn validate<R: AccountReader + ?Sized>(
    reader: &R,
    program_id: &Pubkey,
    pool: &Pubkey,
) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();
    let config = match load_config(reader, program_id, pool) {
        Ok(config) => config,
        Err(violation) => return Err(vec![violation]),
    };

    let addresses = match PoolAddresses::derive(program_id, &config.root_pubkey()) {
        Ok(addresses) => addresses,
        Err(_) => return Err(vec![Violation::Underivable]),
    };

    check_addresses(&config, pool, &addresses, &mut violations);
    check_authorities(&addresses, &mut violations);
    check_mints(reader, &addresses, &mut violations);
    check_token_accounts(reader, &addresses, &mut violations);
    check_registries(reader, program_id, &addresses, &mut violations);
    check_lamport_accounts(reader, &addresses, config.rent_exempt_for_token_acc, &mut violations);

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn load_config<R: AccountReader + ?Sized>(
    reader: &R,
    program_id: &Pubkey,
    pool: &Pubkey,
) -> Result<PoolConfig, Violation> {
    let slot = Slot::PoolConfig;
    let account = reader
        .account(pool)
        .ok_or(Violation::MissingAccount { slot, address: *pool })?;
    if account.owner != *program_id {
        return Err(Violation::WrongOwner { slot, expected: *program_id, actual: account.owner });
    }
    if account.data.len() != POOL_CONFIG_SIZE {
        return Err(Violation::MalformedAccount { slot });
    }
    PoolConfig::from_account_data(&account.data).ok_or(Violation::NotInitialized)
}

fn fetch<R: AccountReader + ?Sized>(
    reader: &R,
    addresses: &PoolAddresses,
    role: Role,
    owner: &Pubkey,
    violations: &mut Vec<Violation>,
) -> Option<AccountData> {
    let slot = Slot::Pool(role);
    let address = addresses.address(role);
    let Some(account) = reader.account(&address) else {
        violations.push(Violation::MissingAccount { slot, address });
        return None;
    };
    if account.owner != *owner {
        violations.push(Violation::WrongOwner { slot, expected: *owner, actual: account.owner });
        return None;
    }
    Some(account)
}

fn check_addresses(
    config: &PoolConfig,
    pool: &Pubkey,
    addresses: &PoolAddresses,
    violations: &mut Vec<Violation>,
) {
    let mut expect_address = |slot: Slot, actual: Pubkey| {
        let expected = addresses.slot(slot).address;
        if actual != expected {
            violations.push(Violation::AddressMismatch { slot, expected, actual });
        }
    };
    expect_address(Slot::PoolConfig, *pool);
    expect_address(Slot::Pool(Role::StMint), config.st_mint_pubkey());
    expect_address(Slot::Pool(Role::LpMint), config.lp_mint_pubkey());
    expect_address(Slot::Pool(Role::StLeg), config.st_leg_pubkey());
    expect_address(Slot::Pool(Role::TreasuryStAccount), config.treasury_st_account_pubkey());
    expect_address(Slot::Pool(Role::StakeList), config.stake_list_pubkey());
    expect_address(Slot::Pool(Role::ValidatorList), config.validator_list_pubkey());

    let bumps = [
        (Slot::PoolConfig, config.bump),
        (Slot::Pool(Role::Reserve), config.reserve_bump),
        (Slot::Pool(Role::StMintAuthority), config.st_mint_authority_bump),
        (Slot::Pool(Role::StakeDepositAuthority), config.stake_deposit_bump),
        (Slot::Pool(Role::StakeWithdrawAuthority), config.stake_withdraw_bump),
        (Slot::Pool(Role::LpMintAuthority), config.liq_pool.lp_mint_authority_bump),
        (Slot::Pool(Role::SolLeg), config.liq_pool.sol_leg_bump),
        (Slot::Pool(Role::StLegAuthority), config.liq_pool.st_leg_authority_bump),
    ];
    for (slot, actual) in bumps {
        let expected = addresses.slot(slot).bump;
        if actual != expected {
            violations.push(Violation::BumpMismatch { slot, expected, actual });
        }
    }
}

fn check_authorities(addresses: &PoolAddresses, violations: &mut Vec<Violation>) {
    if !is_off_curve(&addresses.pool.address) {
        violations.push(Violation::AuthorityOnCurve {
            slot: Slot::PoolConfig,
            address: addresses.pool.address,
        });
    }
    for (role, derived) in addresses.iter().filter(|(role, _)| role.is_authority()) {
        if !is_off_curve(&derived.address) {
            violations.push(Violation::AuthorityOnCurve {
                slot: Slot::Pool(role),
                address: derived.address,
            });
        }
    }
}

fn check_mints<R: AccountReader + ?Sized>(
    reader: &R,
    addresses: &PoolAddresses,
    violations: &mut Vec<Violation>,
) {
    let mints = [
        (Role::StMint, Role::StMintAuthority, ST_DECIMALS),
        (Role::LpMint, Role::LpMintAuthority, LP_DECIMALS),
    ];
    for (role, authority, decimals) in mints {
        let slot = Slot::Pool(role);
        let Some(account) = fetch(reader, addresses, role, &spl_token::id(), violations) else {
            continue;
        };
        let Ok(mint) = Mint::unpack(&account.data) else {
            violations.push(Violation::MalformedAccount { slot });
            continue;
        };

        let expected = addresses.address(authority);
        let actual = match mint.mint_authority {
            COption::Some(key) => Some(key),
            COption::None => None,
        };
        if actual != Some(expected) {
            violations.push(Violation::MintAuthority { slot, expected, actual });
        }
        if mint.supply != 0 {
            violations.push(Violation::NonZeroSupply { slot, supply: mint.supply });
        }
        if let COption::Some(authority) = mint.freeze_authority {
            violations.push(Violation::FreezeAuthoritySet { slot, authority });
        }
        if mint.decimals != decimals {
            violations.push(Violation::WrongDecimals { slot, expected: decimals, actual: mint.decimals });
        }
    }
}

fn check_token_accounts<R: AccountReader + ?Sized>(
    reader: &R,
    addresses: &PoolAddresses,
    violations: &mut Vec<Violation>,
) {
    let accounts = [
        (Role::StLeg, addresses.address(Role::StLegAuthority)),
        (Role::TreasuryStAccount, addresses.pool.address),
    ];
    let st_mint = addresses.address(Role::StMint);
    for (role, owner) in accounts {
        let slot = Slot::Pool(role);
        let Some(account) = fetch(reader, addresses, role, &spl_token::id(), violations) else {
            continue;
        };
        let Ok(token) = TokenAccount::unpack(&account.data) else {
            violations.push(Violation::MalformedAccount { slot });
            continue;
        };
        if token.owner != owner {
            violations.push(Violation::TokenOwner { slot, expected: owner, actual: token.owner });
        }
        if token.mint != st_mint {
            violations.push(Violation::TokenMint { slot, expected: st_mint, actual: token.mint });
        }
    }
}

fn check_registries<R: AccountReader + ?Sized>(
    reader: &R,
    program_id: &Pubkey,
    addresses: &PoolAddresses,
    violations: &mut Vec<Violation>,
) {
    let registries: [(Role, fn(u32) -> RegistryLayout); 2] = [
        (Role::StakeList, RegistryLayout::stake_list),
        (Role::ValidatorList, RegistryLayout::validator_list),
    ];
    for (role, layout_for) in registries {
        let slot = Slot::Pool(role);
        let Some(account) = fetch(reader, addresses, role, program_id, violations) else {
            continue;
        };
        let Some(header) = RegistryHeader::from_account_data(&account.data) else {
            violations.push(Violation::MalformedAccount { slot });
            continue;
        };

        let layout = layout_for(header.additional_record_space);
        if header.discriminator != layout.discriminator {
            violations.push(Violation::WrongDiscriminator { slot });
            continue;
        }
        if header.pool_pubkey() != addresses.pool.address {
            violations.push(Violation::RegistryPool { slot, actual: header.pool_pubkey() });
        }
        if header.count != 0 {
            violations.push(Violation::RegistryNotEmpty { slot, count: header.count });
        }
        let space = account.data.len();
        if header.item_size != layout.item_size || header.capacity != layout.capacity_for(space) {
            violations.push(Violation::RegistryCapacity {
                slot,
                item_size: header.item_size,
                capacity: header.capacity,
                space,
            });
        }
    }
}

fn check_lamport_accounts<R: AccountReader + ?Sized>(
    reader: &R,
    addresses: &PoolAddresses,
    minimum: u64,
    violations: &mut Vec<Violation>,
) {
    for role in [Role::Reserve, Role::SolLeg] {
        let slot = Slot::Pool(role);
        let Some(account) = fetch(reader, addresses, role, &system_program::id(), violations) else {
            continue;
        };
        if !account.data.is_empty() {
            violations.push(Violation::UnexpectedData { slot, len: account.data.len() });
        }
        if account.lamports < minimum {
            violations.push(Violation::NotRentExempt { slot, lamports: account.lamports, minimum });
        }
    }
}
