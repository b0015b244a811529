//! Kani formal verification for liquid-stake-pool fee and registry arithmetic.
//!
//! ZERO dependencies. Pure Rust. CBMC-friendly.
//!
//! Functions use u32 amounts / u64 intermediates. The production code uses
//! u64/u128, but the properties proved here (bounds, monotonicity, exact
//! inversion) are scale-invariant and the narrower types keep proofs fast.
//!
//! Run all:   cargo kani --lib
//! Run one:   cargo kani --harness proof_fee_apply_bounded

// ═══════════════════════════════════════════════════════════════
// Fee + registry math (u32/u64 mirror of src/state.rs and src/provision.rs)
// ═══════════════════════════════════════════════════════════════

pub const MAX_BASIS_POINTS: u32 = 10_000;
pub const REGISTRY_HEADER_SIZE: u32 = 88;
pub const STAKE_RECORD_LEN: u32 = 49;
pub const VALIDATOR_RECORD_LEN: u32 = 53;
pub const STAKE_LIST_CAPACITY: u32 = 128;
pub const VALIDATOR_LIST_CAPACITY: u32 = 64;
pub const MAX_PERMITTED_DATA_INCREASE: u64 = 10_240;

pub fn fee_is_valid(bp: u32) -> bool {
    bp <= MAX_BASIS_POINTS
}

/// floor(amount * bp / 10 000)
pub fn apply_fee(bp: u32, amount: u32) -> u32 {
    ((amount as u64 * bp as u64) / MAX_BASIS_POINTS as u64) as u32
}

pub fn item_size(base: u32, additional: u32) -> u32 {
    base.saturating_add(additional)
}

pub fn registry_space(item_size: u32, capacity: u32) -> u64 {
    REGISTRY_HEADER_SIZE as u64 + item_size as u64 * capacity as u64
}

pub fn capacity_for(item_size: u32, space: u32) -> u32 {
    if item_size == 0 {
        return 0;
    }
    space.saturating_sub(REGISTRY_HEADER_SIZE) / item_size
}

/// Fee part of config validation: every fee bounded, min <= max.
pub fn fees_valid(reward: u32, max_fee: u32, min_fee: u32, cut: u32) -> bool {
    fee_is_valid(reward)
        && fee_is_valid(max_fee)
        && fee_is_valid(min_fee)
        && min_fee <= max_fee
        && fee_is_valid(cut)
}

/// Registry part of config validation.
pub fn registries_fit(additional_stake: u32, additional_validator: u32) -> bool {
    let stake = registry_space(item_size(STAKE_RECORD_LEN, additional_stake), STAKE_LIST_CAPACITY);
    let validator = registry_space(
        item_size(VALIDATOR_RECORD_LEN, additional_validator),
        VALIDATOR_LIST_CAPACITY,
    );
    stake <= MAX_PERMITTED_DATA_INCREASE && validator <= MAX_PERMITTED_DATA_INCREASE
}

// ═══════════════════════════════════════════════════════════════
// KANI PROOFS
// ═══════════════════════════════════════════════════════════════

#[cfg(kani)]
mod proofs {
    use super::*;

    // ── 1. Fees ──

    /// A valid fee never takes more than the amount.
    #[kani::proof]
    fn proof_fee_apply_bounded() {
        let bp: u32 = kani::any();
        let amount: u32 = kani::any();
        kani::assume(fee_is_valid(bp));
        assert!(apply_fee(bp, amount) <= amount);
    }

    /// Monotone in the fee.
    #[kani::proof]
    fn proof_fee_monotone_in_bp() {
        let a: u32 = kani::any();
        let b: u32 = kani::any();
        let amount: u32 = kani::any();
        kani::assume(a <= b && fee_is_valid(b));
        assert!(apply_fee(a, amount) <= apply_fee(b, amount));
    }

    /// Monotone in the amount.
    #[kani::proof]
    fn proof_fee_monotone_in_amount() {
        let bp: u32 = kani::any();
        let x: u32 = kani::any();
        let y: u32 = kani::any();
        kani::assume(fee_is_valid(bp) && x <= y);
        assert!(apply_fee(bp, x) <= apply_fee(bp, y));
    }

    /// 10 000 accepted, 10 001 rejected.
    #[kani::proof]
    fn proof_fee_boundary() {
        assert!(fee_is_valid(10_000));
        assert!(!fee_is_valid(10_001));
    }

    /// min > max is always rejected, whatever the other fees are.
    #[kani::proof]
    fn proof_min_above_max_rejected() {
        let reward: u32 = kani::any();
        let max_fee: u32 = kani::any();
        let min_fee: u32 = kani::any();
        let cut: u32 = kani::any();
        kani::assume(min_fee > max_fee);
        assert!(!fees_valid(reward, max_fee, min_fee, cut));
    }

    // ── 2. Registry layout ──

    /// Exact inversion of space by capacity_for.
    #[kani::proof]
    fn proof_capacity_for_inverts_space() {
        let additional: u32 = kani::any();
        kani::assume(additional <= 1_000);
        let item = item_size(VALIDATOR_RECORD_LEN, additional);
        let space = registry_space(item, VALIDATOR_LIST_CAPACITY);
        assert_eq!(capacity_for(item, space as u32), VALIDATOR_LIST_CAPACITY);
    }

    /// Reported capacity always fits the allocation.
    #[kani::proof]
    fn proof_capacity_for_fits() {
        let item: u32 = kani::any();
        let space: u32 = kani::any();
        kani::assume(item > 0 && item <= 10_240);
        kani::assume(space >= REGISTRY_HEADER_SIZE && space <= 10_240);
        let records = capacity_for(item, space);
        assert!(registry_space(item, records) <= space as u64);
    }

    /// Any payload that passes registry validation creates accounts within the CPI limit.
    #[kani::proof]
    fn proof_validated_registries_creatable() {
        let a: u32 = kani::any();
        let b: u32 = kani::any();
        if registries_fit(a, b) {
            let stake = registry_space(item_size(STAKE_RECORD_LEN, a), STAKE_LIST_CAPACITY);
            assert!(stake <= MAX_PERMITTED_DATA_INCREASE);
            assert!(a <= 30);
        }
    }

    /// Default layouts always fit.
    #[kani::proof]
    fn proof_default_layouts_fit() {
        assert!(registries_fit(0, 0));
    }
}
