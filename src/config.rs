//! Initialization payload and its bounds checks.
//!
//! Everything here runs before any account is touched: a payload that fails
//! `validate` aborts initialization with `StakeError::InvalidConfig` and no
//! funds spent.

use solana_program::{entrypoint::MAX_PERMITTED_DATA_INCREASE, pubkey::Pubkey};
use thiserror::Error;

use crate::error::StakeError;
use crate::provision::RegistryLayout;
use crate::state::Fee;

/// 0.01 SOL: stake accounts smaller than this are not worth the rent.
pub const MIN_STAKE_LOWER_LIMIT: u64 = 10_000_000;

/// Minimum slots between stake delta runs.
pub const MIN_UPDATE_WINDOW: u64 = 3_000;

/// Wire size of [`InitializeData`].
pub const INITIALIZE_DATA_LEN: usize = 144;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiqPoolInitializeData {
    pub lp_liquidity_target: u64,
    pub lp_max_fee: Fee,
    pub lp_min_fee: Fee,
    pub lp_treasury_cut: Fee,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitializeData {
    pub admin_authority: Pubkey,
    pub validator_manager_authority: Pubkey,
    pub pause_authority: Pubkey,
    pub min_stake: u64,
    pub reward_fee: Fee,
    pub liq_pool: LiqPoolInitializeData,
    /// Extra bytes appended to every stake record
    pub additional_stake_record_space: u32,
    /// Extra bytes appended to every validator record
    pub additional_validator_record_space: u32,
    pub slots_for_stake_delta: u64,
}

/// Which bound an [`InitializeData`] broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigViolation {
    #[error("reward fee {0} above 100%")]
    RewardFeeTooHigh(Fee),
    #[error("lp max fee {0} above 100%")]
    LpMaxFeeTooHigh(Fee),
    #[error("lp min fee {0} above 100%")]
    LpMinFeeTooHigh(Fee),
    #[error("lp min fee {min} greater than lp max fee {max}")]
    LpFeesWrongWayRound { min: Fee, max: Fee },
    #[error("treasury cut {0} above 100%")]
    TreasuryCutTooHigh(Fee),
    #[error("min stake {0} below 0.01 SOL")]
    MinStakeTooLow(u64),
    #[error("slots for stake delta {0} below 3000")]
    UpdateWindowTooLow(u64),
    #[error("stake list of {0} bytes exceeds the 10240 byte creation limit")]
    StakeListTooLarge(u64),
    #[error("validator list of {0} bytes exceeds the 10240 byte creation limit")]
    ValidatorListTooLarge(u64),
}

impl From<ConfigViolation> for StakeError {
    fn from(_: ConfigViolation) -> Self {
        StakeError::InvalidConfig
    }
}

impl InitializeData {
    pub fn validate(&self) -> Result<(), ConfigViolation> {
        if !self.reward_fee.is_valid() {
            return Err(ConfigViolation::RewardFeeTooHigh(self.reward_fee));
        }

        let liq = &self.liq_pool;
        if !liq.lp_max_fee.is_valid() {
            return Err(ConfigViolation::LpMaxFeeTooHigh(liq.lp_max_fee));
        }
        if !liq.lp_min_fee.is_valid() {
            return Err(ConfigViolation::LpMinFeeTooHigh(liq.lp_min_fee));
        }
        if liq.lp_min_fee > liq.lp_max_fee {
            return Err(ConfigViolation::LpFeesWrongWayRound {
                min: liq.lp_min_fee,
                max: liq.lp_max_fee,
            });
        }
        if !liq.lp_treasury_cut.is_valid() {
            return Err(ConfigViolation::TreasuryCutTooHigh(liq.lp_treasury_cut));
        }

        if self.min_stake < MIN_STAKE_LOWER_LIMIT {
            return Err(ConfigViolation::MinStakeTooLow(self.min_stake));
        }
        if self.slots_for_stake_delta < MIN_UPDATE_WINDOW {
            return Err(ConfigViolation::UpdateWindowTooLow(self.slots_for_stake_delta));
        }

        let stake_list = RegistryLayout::stake_list(self.additional_stake_record_space).space();
        if stake_list > MAX_PERMITTED_DATA_INCREASE as u64 {
            return Err(ConfigViolation::StakeListTooLarge(stake_list));
        }
        let validator_list =
            RegistryLayout::validator_list(self.additional_validator_record_space).space();
        if validator_list > MAX_PERMITTED_DATA_INCREASE as u64 {
            return Err(ConfigViolation::ValidatorListTooLarge(validator_list));
        }

        Ok(())
    }

    pub fn pack_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.admin_authority.as_ref());
        out.extend_from_slice(self.validator_manager_authority.as_ref());
        out.extend_from_slice(self.pause_authority.as_ref());
        out.extend_from_slice(&self.min_stake.to_le_bytes());
        out.extend_from_slice(&self.reward_fee.basis_points.to_le_bytes());
        out.extend_from_slice(&self.liq_pool.lp_liquidity_target.to_le_bytes());
        out.extend_from_slice(&self.liq_pool.lp_max_fee.basis_points.to_le_bytes());
        out.extend_from_slice(&self.liq_pool.lp_min_fee.basis_points.to_le_bytes());
        out.extend_from_slice(&self.liq_pool.lp_treasury_cut.basis_points.to_le_bytes());
        out.extend_from_slice(&self.additional_stake_record_space.to_le_bytes());
        out.extend_from_slice(&self.additional_validator_record_space.to_le_bytes());
        out.extend_from_slice(&self.slots_for_stake_delta.to_le_bytes());
    }

    /// Decode the fixed 144-byte layout written by [`InitializeData::pack_into`].
    pub fn unpack(data: &[u8]) -> Option<Self> {
        if data.len() < INITIALIZE_DATA_LEN {
            return None;
        }
        let key = |at: usize| Pubkey::try_from(&data[at..at + 32]).ok();
        let u64_at = |at: usize| data[at..at + 8].try_into().ok().map(u64::from_le_bytes);
        let u32_at = |at: usize| data[at..at + 4].try_into().ok().map(u32::from_le_bytes);

        Some(Self {
            admin_authority: key(0)?,
            validator_manager_authority: key(32)?,
            pause_authority: key(64)?,
            min_stake: u64_at(96)?,
            reward_fee: Fee::from_basis_points(u32_at(104)?),
            liq_pool: LiqPoolInitializeData {
                lp_liquidity_target: u64_at(108)?,
                lp_max_fee: Fee::from_basis_points(u32_at(116)?),
                lp_min_fee: Fee::from_basis_points(u32_at(120)?),
                lp_treasury_cut: Fee::from_basis_points(u32_at(124)?),
            },
            additional_stake_record_space: u32_at(128)?,
            additional_validator_record_space: u32_at(132)?,
            slots_for_stake_delta: u64_at(136)?,
        })
    }
}
