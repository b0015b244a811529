use bytemuck::{Pod, Zeroable};
use solana_program::pubkey::Pubkey;

use crate::config::InitializeData;
use crate::pda::{PoolAddresses, Role};

pub const POOL_CONFIG_DISCRIMINATOR: [u8; 8] = *b"stkpool1";
pub const STAKE_LIST_DISCRIMINATOR: [u8; 8] = *b"stkrgv01";
pub const VALIDATOR_LIST_DISCRIMINATOR: [u8; 8] = *b"valrgv01";

/// Fixed-point denominator for `st_price` (1.0 == 2^32).
pub const PRICE_DENOMINATOR: u64 = 0x1_0000_0000;

/// Fee expressed in basis points (1/100 of a percent).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct Fee {
    pub basis_points: u32,
}

impl Fee {
    pub const MAX_BASIS_POINTS: u32 = 10_000;

    pub const fn from_basis_points(basis_points: u32) -> Self {
        Self { basis_points }
    }

    pub const fn is_valid(&self) -> bool {
        self.basis_points <= Self::MAX_BASIS_POINTS
    }

    /// `lamports * bp / 10_000`, rounded down.
    pub fn apply(&self, lamports: u64) -> u64 {
        (lamports as u128 * self.basis_points as u128 / Self::MAX_BASIS_POINTS as u128) as u64
    }
}

impl core::fmt::Display for Fee {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:0>2}%", self.basis_points / 100, self.basis_points % 100)
    }
}

/// Liquidity pool sub-state, embedded in [`PoolConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct LiqPool {
    /// LP token mint (authority = LpMintAuthority PDA)
    pub lp_mint: [u8; 32],

    /// Token account holding the st-token leg (owner = StLegAuthority PDA)
    pub st_leg: [u8; 32],

    /// Liquidity at which the unstake fee bottoms out at `lp_min_fee`
    pub lp_liquidity_target: u64,

    /// LP tokens in circulation
    pub lp_supply: u64,

    /// SOL lent from the sol leg to the reserve
    pub lent_from_sol_leg: u64,

    /// Maximum SOL the sol leg accepts
    pub liquidity_sol_cap: u64,

    pub lp_max_fee: Fee,
    pub lp_min_fee: Fee,

    /// Protocol share of liquid-unstake fees
    pub treasury_cut: Fee,

    pub lp_mint_authority_bump: u8,
    pub sol_leg_bump: u8,
    pub st_leg_authority_bump: u8,

    pub _padding: [u8; 1],
}

pub const LIQ_POOL_SIZE: usize = core::mem::size_of::<LiqPool>();

/// Pool root record.
/// PDA seeds: [b"stake_pool", root]
///
/// Every other pool account is derived from this account's address, and the
/// PDA itself owns the treasury st-token account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct PoolConfig {
    /// `POOL_CONFIG_DISCRIMINATOR` once written; zero while provisioning
    pub discriminator: [u8; 8],

    /// Root seed this pool was derived from
    pub root: [u8; 32],

    /// Can change pool parameters
    pub admin_authority: [u8; 32],

    /// Can add/remove validators and set scores
    pub validator_manager_authority: [u8; 32],

    /// Can pause and resume the pool
    pub pause_authority: [u8; 32],

    pub st_mint: [u8; 32],
    pub treasury_st_account: [u8; 32],
    pub stake_list: [u8; 32],
    pub validator_list: [u8; 32],

    /// Smallest stake account the pool will create
    pub min_stake: u64,

    /// Rate-limit window for stake delta runs
    pub slots_for_stake_delta: u64,

    /// `u64::MAX` until the first stake delta run
    pub last_stake_delta_epoch: u64,

    /// Rent-exempt minimum for a token-sized account, pinned into reserve and sol leg
    pub rent_exempt_for_token_acc: u64,

    pub available_reserve_balance: u64,
    pub st_supply: u64,

    /// SOL per st-token, scaled by `PRICE_DENOMINATOR`
    pub st_price: u64,

    pub min_deposit: u64,
    pub min_withdraw: u64,
    pub staking_sol_cap: u64,
    pub total_active_balance: u64,

    pub reward_fee: Fee,
    pub max_stake_moved_per_epoch: Fee,
    pub total_validator_score: u32,

    pub bump: u8,
    pub reserve_bump: u8,
    pub st_mint_authority_bump: u8,
    pub stake_deposit_bump: u8,
    pub stake_withdraw_bump: u8,

    /// 1 = paused
    pub paused: u8,

    pub _padding: [u8; 6],

    pub liq_pool: LiqPool,

    /// Reserved for future use
    pub _reserved: [u8; 64],
}

/// Size of PoolConfig in bytes
pub const POOL_CONFIG_SIZE: usize = core::mem::size_of::<PoolConfig>();

impl PoolConfig {
    /// Build the record written as the last step of initialization.
    pub fn new(addresses: &PoolAddresses, data: &InitializeData, rent_exempt_for_token_acc: u64) -> Self {
        let mut config = Self::zeroed();

        config.discriminator = POOL_CONFIG_DISCRIMINATOR;
        config.root = addresses.root.to_bytes();
        config.admin_authority = data.admin_authority.to_bytes();
        config.validator_manager_authority = data.validator_manager_authority.to_bytes();
        config.pause_authority = data.pause_authority.to_bytes();
        config.st_mint = addresses.address(Role::StMint).to_bytes();
        config.treasury_st_account = addresses.address(Role::TreasuryStAccount).to_bytes();
        config.stake_list = addresses.address(Role::StakeList).to_bytes();
        config.validator_list = addresses.address(Role::ValidatorList).to_bytes();

        config.min_stake = data.min_stake;
        config.slots_for_stake_delta = data.slots_for_stake_delta;
        config.last_stake_delta_epoch = u64::MAX;
        config.rent_exempt_for_token_acc = rent_exempt_for_token_acc;
        config.st_price = PRICE_DENOMINATOR;
        config.min_deposit = 1;
        config.min_withdraw = 1;
        config.staking_sol_cap = u64::MAX;

        config.reward_fee = data.reward_fee;
        config.max_stake_moved_per_epoch = Fee::from_basis_points(Fee::MAX_BASIS_POINTS);

        config.bump = addresses.pool.bump;
        config.reserve_bump = addresses.bump(Role::Reserve);
        config.st_mint_authority_bump = addresses.bump(Role::StMintAuthority);
        config.stake_deposit_bump = addresses.bump(Role::StakeDepositAuthority);
        config.stake_withdraw_bump = addresses.bump(Role::StakeWithdrawAuthority);

        config.liq_pool = LiqPool {
            lp_mint: addresses.address(Role::LpMint).to_bytes(),
            st_leg: addresses.address(Role::StLeg).to_bytes(),
            lp_liquidity_target: data.liq_pool.lp_liquidity_target,
            lp_supply: 0,
            lent_from_sol_leg: 0,
            liquidity_sol_cap: u64::MAX,
            lp_max_fee: data.liq_pool.lp_max_fee,
            lp_min_fee: data.liq_pool.lp_min_fee,
            treasury_cut: data.liq_pool.lp_treasury_cut,
            lp_mint_authority_bump: addresses.bump(Role::LpMintAuthority),
            sol_leg_bump: addresses.bump(Role::SolLeg),
            st_leg_authority_bump: addresses.bump(Role::StLegAuthority),
            _padding: [0; 1],
        };

        config
    }

    /// Copy a written pool config out of account data.
    pub fn from_account_data(data: &[u8]) -> Option<Self> {
        if data.len() != POOL_CONFIG_SIZE {
            return None;
        }
        let config: Self = bytemuck::try_pod_read_unaligned(data).ok()?;
        config.is_initialized().then_some(config)
    }

    pub fn is_initialized(&self) -> bool {
        self.discriminator == POOL_CONFIG_DISCRIMINATOR
    }

    pub fn root_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.root)
    }

    pub fn admin_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.admin_authority)
    }

    pub fn st_mint_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.st_mint)
    }

    pub fn lp_mint_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.liq_pool.lp_mint)
    }

    pub fn st_leg_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.liq_pool.st_leg)
    }

    pub fn treasury_st_account_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.treasury_st_account)
    }

    pub fn stake_list_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.stake_list)
    }

    pub fn validator_list_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.validator_list)
    }
}

/// Header at offset 0 of the stake list and validator list accounts.
///
/// Records follow the header back to back, `item_size` bytes each, up to
/// `capacity`. Capacity is fixed when the account is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct RegistryHeader {
    /// Layout version, e.g. `STAKE_LIST_DISCRIMINATOR`
    pub discriminator: [u8; 8],

    /// Owning pool config
    pub pool: [u8; 32],

    /// Stride of one record: base record length + additional record space
    pub item_size: u32,

    pub count: u32,
    pub capacity: u32,

    /// Bytes reserved in every record for future fields
    pub additional_record_space: u32,

    pub _reserved: [u8; 32],
}

/// Size of RegistryHeader in bytes
pub const REGISTRY_HEADER_SIZE: usize = core::mem::size_of::<RegistryHeader>();

impl RegistryHeader {
    pub fn from_account_data(data: &[u8]) -> Option<Self> {
        if data.len() < REGISTRY_HEADER_SIZE {
            return None;
        }
        bytemuck::try_pod_read_unaligned(&data[..REGISTRY_HEADER_SIZE]).ok()
    }

    pub fn pool_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.pool)
    }
}
