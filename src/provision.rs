//! Account provisioning: allocate, fund and assign every pool-owned account.
//!
//! Produces operations only; nothing here touches a ledger. Each created
//! account is funded to exactly the rent-exempt minimum for its size.

use solana_program::{
    entrypoint::MAX_PERMITTED_DATA_INCREASE, program_pack::Pack, pubkey::Pubkey, rent::Rent,
};
use spl_token::state::{Account as TokenAccount, Mint};

use crate::config::InitializeData;
use crate::error::StakeError;
use crate::ledger::Operation;
use crate::pda::{PoolAddresses, Role, Slot};
use crate::state::{
    RegistryHeader, POOL_CONFIG_SIZE, REGISTRY_HEADER_SIZE, STAKE_LIST_DISCRIMINATOR,
    VALIDATOR_LIST_DISCRIMINATOR,
};

/// Base stake record: stake account, validator index, delegated amount,
/// last update epoch, flags.
pub const STAKE_RECORD_LEN: u32 = 49;

/// Base validator record: vote account, active balance, score, last stake
/// delta epoch, stake count, flags.
pub const VALIDATOR_RECORD_LEN: u32 = 53;

pub const STAKE_LIST_CAPACITY: u32 = 128;
pub const VALIDATOR_LIST_CAPACITY: u32 = 64;

/// Shape of a registry account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryLayout {
    pub discriminator: [u8; 8],
    pub item_size: u32,
    pub capacity: u32,
    pub additional_record_space: u32,
}

impl RegistryLayout {
    pub fn stake_list(additional_record_space: u32) -> Self {
        Self {
            discriminator: STAKE_LIST_DISCRIMINATOR,
            item_size: STAKE_RECORD_LEN.saturating_add(additional_record_space),
            capacity: STAKE_LIST_CAPACITY,
            additional_record_space,
        }
    }

    pub fn validator_list(additional_record_space: u32) -> Self {
        Self {
            discriminator: VALIDATOR_LIST_DISCRIMINATOR,
            item_size: VALIDATOR_RECORD_LEN.saturating_add(additional_record_space),
            capacity: VALIDATOR_LIST_CAPACITY,
            additional_record_space,
        }
    }

    /// Header plus `capacity` records.
    pub fn space(&self) -> u64 {
        REGISTRY_HEADER_SIZE as u64 + self.item_size as u64 * self.capacity as u64
    }

    /// Records an account of `space` bytes can hold with this stride.
    pub fn capacity_for(&self, space: usize) -> u32 {
        if self.item_size == 0 {
            return 0;
        }
        let records = space.saturating_sub(REGISTRY_HEADER_SIZE) / self.item_size as usize;
        records.min(u32::MAX as usize) as u32
    }

    /// Empty header: zero records, owned by `pool`.
    pub fn header(&self, pool: &Pubkey) -> RegistryHeader {
        RegistryHeader {
            discriminator: self.discriminator,
            pool: pool.to_bytes(),
            item_size: self.item_size,
            count: 0,
            capacity: self.capacity,
            additional_record_space: self.additional_record_space,
            _reserved: [0; 32],
        }
    }
}

/// Allocate `space` bytes at a derived address, rent-exempt, assigned to `owner`.
pub fn create_account(
    addresses: &PoolAddresses,
    slot: Slot,
    space: u64,
    owner: &Pubkey,
    rent: &Rent,
) -> Operation {
    Operation::CreateAccount {
        slot,
        address: addresses.slot(slot).address,
        space,
        lamports: rent.minimum_balance(space as usize),
        owner: *owner,
    }
}

/// Lamport-only system account topped up to `lamports`.
pub fn pin_lamports(address: Pubkey, lamports: u64) -> Operation {
    Operation::Fund { address, lamports }
}

/// Every operation that brings the pool's accounts into existence, in order.
///
/// Registry headers are written right after their accounts are created;
/// token accounts are allocated here and initialized by
/// [`crate::bootstrap::bootstrap`].
pub fn provision(
    addresses: &PoolAddresses,
    data: &InitializeData,
    rent: &Rent,
) -> Result<Vec<Operation>, StakeError> {
    let program_id = addresses.program_id;
    let token_program = spl_token::id();
    let stake_list = RegistryLayout::stake_list(data.additional_stake_record_space);
    let validator_list = RegistryLayout::validator_list(data.additional_validator_record_space);

    // Reserve and sol leg stay system-owned; they only hold lamports.
    let pinned = rent.minimum_balance(TokenAccount::LEN);

    let ops = vec![
        create_account(addresses, Slot::PoolConfig, POOL_CONFIG_SIZE as u64, &program_id, rent),
        pin_lamports(addresses.address(Role::Reserve), pinned),
        pin_lamports(addresses.address(Role::SolLeg), pinned),
        create_account(addresses, Slot::Pool(Role::StakeList), stake_list.space(), &program_id, rent),
        create_account(
            addresses,
            Slot::Pool(Role::ValidatorList),
            validator_list.space(),
            &program_id,
            rent,
        ),
        Operation::WriteRegistry {
            address: addresses.address(Role::StakeList),
            header: stake_list.header(&addresses.pool.address),
        },
        Operation::WriteRegistry {
            address: addresses.address(Role::ValidatorList),
            header: validator_list.header(&addresses.pool.address),
        },
        create_account(addresses, Slot::Pool(Role::StMint), Mint::LEN as u64, &token_program, rent),
        create_account(addresses, Slot::Pool(Role::LpMint), Mint::LEN as u64, &token_program, rent),
        create_account(
            addresses,
            Slot::Pool(Role::StLeg),
            TokenAccount::LEN as u64,
            &token_program,
            rent,
        ),
        create_account(
            addresses,
            Slot::Pool(Role::TreasuryStAccount),
            TokenAccount::LEN as u64,
            &token_program,
            rent,
        ),
    ];

    for op in &ops {
        if let Operation::CreateAccount { space, .. } = op {
            if *space > MAX_PERMITTED_DATA_INCREASE as u64 {
                return Err(StakeError::InvalidConfig);
            }
        }
    }

    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_space() {
        assert_eq!(RegistryLayout::stake_list(0).space(), 88 + 49 * 128);
        assert_eq!(RegistryLayout::validator_list(0).space(), 88 + 53 * 64);
        assert_eq!(RegistryLayout::stake_list(8).item_size, 57);
    }

    #[test]
    fn test_capacity_for_round_trips_space() {
        let layout = RegistryLayout::validator_list(11);
        assert_eq!(layout.capacity_for(layout.space() as usize), layout.capacity);
        assert_eq!(layout.capacity_for(REGISTRY_HEADER_SIZE - 1), 0);
    }

    #[test]
    fn test_provision_funds_exactly_rent_exempt() {
        let program_id = Pubkey::new_unique();
        let addresses = PoolAddresses::derive(&program_id, &Pubkey::new_unique()).unwrap();
        let rent = Rent::default();
        let ops = provision(&addresses, &InitializeData::default(), &rent).unwrap();

        assert_eq!(ops.len(), 11);
        for op in &ops {
            match op {
                Operation::CreateAccount { space, lamports, .. } => {
                    assert_eq!(*lamports, rent.minimum_balance(*space as usize));
                }
                Operation::Fund { lamports, .. } => {
                    assert_eq!(*lamports, rent.minimum_balance(TokenAccount::LEN));
                }
                _ => {}
            }
        }
    }
}
