//! Namespace derivation for every account a pool owns.
//!
//! The pool config lives at `[b"stake_pool", root]`; everything else is
//! namespaced under the pool config address: `[pool_config, role_seed]`.
//! Derivation goes through `try_find_program_address`, which walks bumps
//! 255..=0 and only accepts off-curve candidates, so no derived address can
//! ever be a signing key.

use solana_program::pubkey::Pubkey;

use crate::error::StakeError;

/// Top-level seed for the pool config account.
pub const STAKE_POOL_SEED: &[u8] = b"stake_pool";

/// Accounts and authorities namespaced under a pool config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Role {
    /// System account holding unstaked SOL
    Reserve = 0,
    /// System account holding the SOL side of the liquidity pool
    SolLeg = 1,
    /// Owner of the st-token side of the liquidity pool
    StLegAuthority = 2,
    /// Token account holding the st-token side of the liquidity pool
    StLeg = 3,
    /// Staked-SOL token mint
    StMint = 4,
    /// Mint authority of the st-token mint
    StMintAuthority = 5,
    /// Liquidity pool LP token mint
    LpMint = 6,
    /// Mint authority of the LP mint
    LpMintAuthority = 7,
    /// Treasury st-token account, owned by the pool config PDA
    TreasuryStAccount = 8,
    /// Stake account registry
    StakeList = 9,
    /// Validator registry
    ValidatorList = 10,
    /// Stake authority for delegated stake accounts
    StakeDepositAuthority = 11,
    /// Withdraw authority for delegated stake accounts
    StakeWithdrawAuthority = 12,
}

impl Role {
    pub const COUNT: usize = 13;

    pub const ALL: [Role; Role::COUNT] = [
        Role::Reserve,
        Role::SolLeg,
        Role::StLegAuthority,
        Role::StLeg,
        Role::StMint,
        Role::StMintAuthority,
        Role::LpMint,
        Role::LpMintAuthority,
        Role::TreasuryStAccount,
        Role::StakeList,
        Role::ValidatorList,
        Role::StakeDepositAuthority,
        Role::StakeWithdrawAuthority,
    ];

    pub const fn seed(self) -> &'static [u8] {
        match self {
            Role::Reserve => b"reserve",
            Role::SolLeg => b"liq_sol",
            Role::StLegAuthority => b"liq_st_sol_authority",
            Role::StLeg => b"liq_st_sol",
            Role::StMint => b"stake_mint",
            Role::StMintAuthority => b"st_mint",
            Role::LpMint => b"liq_pool_mint",
            Role::LpMintAuthority => b"liq_mint",
            Role::TreasuryStAccount => b"treasury_st_sol",
            Role::StakeList => b"stake_list",
            Role::ValidatorList => b"validator_list",
            Role::StakeDepositAuthority => b"deposit",
            Role::StakeWithdrawAuthority => b"withdraw",
        }
    }

    /// Signing-only addresses: never backed by an account of their own.
    pub const fn is_authority(self) -> bool {
        matches!(
            self,
            Role::StLegAuthority
                | Role::StMintAuthority
                | Role::LpMintAuthority
                | Role::StakeDepositAuthority
                | Role::StakeWithdrawAuthority
        )
    }
}

/// Where a PDA sits in the namespace: the root config or a pool role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    PoolConfig,
    Pool(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedAddress {
    pub address: Pubkey,
    pub bump: u8,
}

/// Derive the pool config PDA for a root seed.
pub fn find_pool_config(program_id: &Pubkey, root: &Pubkey) -> Result<(Pubkey, u8), StakeError> {
    Pubkey::try_find_program_address(&[STAKE_POOL_SEED, root.as_ref()], program_id)
        .ok_or(StakeError::DerivationExhausted)
}

/// Derive a role address under a pool config.
pub fn find_role_address(
    program_id: &Pubkey,
    pool: &Pubkey,
    role: Role,
) -> Result<(Pubkey, u8), StakeError> {
    Pubkey::try_find_program_address(&[pool.as_ref(), role.seed()], program_id)
        .ok_or(StakeError::DerivationExhausted)
}

/// True when no private key can exist for `address`.
pub fn is_off_curve(address: &Pubkey) -> bool {
    !address.is_on_curve()
}

/// The full constellation of addresses for one root identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolAddresses {
    pub program_id: Pubkey,
    pub root: Pubkey,
    pub pool: DerivedAddress,
    roles: [DerivedAddress; Role::COUNT],
}

impl PoolAddresses {
    pub fn derive(program_id: &Pubkey, root: &Pubkey) -> Result<Self, StakeError> {
        let (pool, pool_bump) = find_pool_config(program_id, root)?;

        let mut roles = [DerivedAddress { address: Pubkey::default(), bump: 0 }; Role::COUNT];
        for role in Role::ALL {
            let (address, bump) = find_role_address(program_id, &pool, role)?;
            roles[role as usize] = DerivedAddress { address, bump };
        }

        Ok(Self {
            program_id: *program_id,
            root: *root,
            pool: DerivedAddress { address: pool, bump: pool_bump },
            roles,
        })
    }

    pub fn get(&self, role: Role) -> &DerivedAddress {
        &self.roles[role as usize]
    }

    pub fn address(&self, role: Role) -> Pubkey {
        self.roles[role as usize].address
    }

    pub fn bump(&self, role: Role) -> u8 {
        self.roles[role as usize].bump
    }

    pub fn slot(&self, slot: Slot) -> &DerivedAddress {
        match slot {
            Slot::PoolConfig => &self.pool,
            Slot::Pool(role) => self.get(role),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &DerivedAddress)> + '_ {
        Role::ALL.into_iter().map(move |role| (role, self.get(role)))
    }

    /// Seeds for `invoke_signed` on behalf of `slot`. `bump` must hold the slot's bump.
    pub fn signer_seeds<'a>(&'a self, slot: Slot, bump: &'a [u8; 1]) -> [&'a [u8]; 3] {
        match slot {
            Slot::PoolConfig => [STAKE_POOL_SEED, self.root.as_ref(), bump],
            Slot::Pool(role) => [self.pool.address.as_ref(), role.seed(), bump],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_index_matches_all_order() {
        for (i, role) in Role::ALL.iter().enumerate() {
            assert_eq!(*role as usize, i);
        }
    }

    #[test]
    fn test_role_seeds_unique() {
        let mut seeds: Vec<&[u8]> = Role::ALL.iter().map(|r| r.seed()).collect();
        seeds.sort();
        seeds.dedup();
        assert_eq!(seeds.len(), Role::COUNT);
        assert!(!seeds.contains(&STAKE_POOL_SEED));
    }

    #[test]
    fn test_signer_seeds_recreate_address() {
        let program_id = Pubkey::new_unique();
        let root = Pubkey::new_unique();
        let addresses = PoolAddresses::derive(&program_id, &root).unwrap();

        let bump = [addresses.pool.bump];
        let seeds = addresses.signer_seeds(Slot::PoolConfig, &bump);
        assert_eq!(
            Pubkey::create_program_address(&seeds, &program_id).unwrap(),
            addresses.pool.address
        );

        let bump = [addresses.bump(Role::StMintAuthority)];
        let seeds = addresses.signer_seeds(Slot::Pool(Role::StMintAuthority), &bump);
        assert_eq!(
            Pubkey::create_program_address(&seeds, &program_id).unwrap(),
            addresses.address(Role::StMintAuthority)
        );
    }
}
