//! Unit tests for fees, config bounds, registry layout and instruction decoding.

use liquid_stake_pool::config::{ConfigViolation, InitializeData, MIN_STAKE_LOWER_LIMIT};
use liquid_stake_pool::error::StakeError;
use liquid_stake_pool::instruction::{StakeInstruction, INITIALIZE_LEN};
use liquid_stake_pool::provision::{
    RegistryLayout, STAKE_LIST_CAPACITY, STAKE_RECORD_LEN, VALIDATOR_LIST_CAPACITY,
    VALIDATOR_RECORD_LEN,
};
use liquid_stake_pool::state::{
    Fee, STAKE_LIST_DISCRIMINATOR, VALIDATOR_LIST_DISCRIMINATOR,
};
use solana_program::{entrypoint::MAX_PERMITTED_DATA_INCREASE, pubkey::Pubkey};

// ═══════════════════════════════════════════════════════════════
// Helper: the reference initialization payload
// ═══════════════════════════════════════════════════════════════

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
    data.liq_pool.lp_liquidity_target = 50_000_000_000;
    data.liq_pool.lp_max_fee = Fee::from_basis_points(300);
    data.liq_pool.lp_min_fee = Fee::from_basis_points(50);
    data.liq_pool.lp_treasury_cut = Fee::from_basis_points(200);
    data
}

// ═══════════════════════════════════════════════════════════════
// Fee Tests
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_fee_bounds() {
    assert!(Fee::from_basis_points(0).is_valid());
    assert!(Fee::from_basis_points(10_000).is_valid());
    assert!(!Fee::from_basis_points(10_001).is_valid());
}

#[test]
fn test_fee_apply_rounds_down() {
    assert_eq!(Fee::from_basis_points(500).apply(1_000), 50);
    assert_eq!(Fee::from_basis_points(1).apply(9_999), 0);
    assert_eq!(Fee::from_basis_points(10_000).apply(u64::MAX), u64::MAX);
}

#[test]
fn test_fee_display() {
    assert_eq!(Fee::from_basis_points(500).to_string(), "5.00%");
    assert_eq!(Fee::from_basis_points(7).to_string(), "0.07%");
    assert_eq!(Fee::from_basis_points(10_000).to_string(), "100.00%");
}

// ═══════════════════════════════════════════════════════════════
// Config Bounds
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_reference_config_valid() {
    assert_eq!(reference_data().validate(), Ok(()));
}

#[test]
fn test_reward_fee_boundary() {
    let mut data = reference_data();
    data.reward_fee = Fee::from_basis_points(10_000);
    assert_eq!(data.validate(), Ok(()));

    data.reward_fee = Fee::from_basis_points(10_001);
    assert_eq!(
        data.validate(),
        Err(ConfigViolation::RewardFeeTooHigh(Fee::from_basis_points(10_001)))
    );
}

#[test]
fn test_lp_fees_each_bounded() {
    let mut data = reference_data();
    data.liq_pool.lp_max_fee = Fee::from_basis_points(10_001);
    assert!(matches!(data.validate(), Err(ConfigViolation::LpMaxFeeTooHigh(_))));

    let mut data = reference_data();
    data.liq_pool.lp_treasury_cut = Fee::from_basis_points(10_001);
    assert!(matches!(data.validate(), Err(ConfigViolation::TreasuryCutTooHigh(_))));
}

#[test]
fn test_lp_min_fee_above_max_rejected() {
    let mut data = reference_data();
    data.liq_pool.lp_min_fee = Fee::from_basis_points(301);
    assert_eq!(
        data.validate(),
        Err(ConfigViolation::LpFeesWrongWayRound {
            min: Fee::from_basis_points(301),
            max: Fee::from_basis_points(300),
        })
    );

    // Equal fees are fine.
    data.liq_pool.lp_min_fee = Fee::from_basis_points(300);
    assert_eq!(data.validate(), Ok(()));
}

#[test]
fn test_min_stake_lower_limit() {
    let mut data = reference_data();
    data.min_stake = MIN_STAKE_LOWER_LIMIT;
    assert_eq!(data.validate(), Ok(()));
    data.min_stake = MIN_STAKE_LOWER_LIMIT - 1;
    assert!(matches!(data.validate(), Err(ConfigViolation::MinStakeTooLow(_))));
}

#[test]
fn test_update_window_lower_limit() {
    let mut data = reference_data();
    data.slots_for_stake_delta = 2_999;
    assert_eq!(data.validate(), Err(ConfigViolation::UpdateWindowTooLow(2_999)));
}

#[test]
fn test_oversized_registry_rejected() {
    let mut data = reference_data();
    data.additional_stake_record_space = 100;
    let space = RegistryLayout::stake_list(100).space();
    assert!(space > MAX_PERMITTED_DATA_INCREASE as u64);
    assert_eq!(data.validate(), Err(ConfigViolation::StakeListTooLarge(space)));
}

#[test]
fn test_violation_maps_to_invalid_config() {
    let err: StakeError = ConfigViolation::MinStakeTooLow(0).into();
    assert_eq!(err, StakeError::InvalidConfig);
}

// ═══════════════════════════════════════════════════════════════
// Registry Layout
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_registry_item_size_includes_additional_space() {
    let stake = RegistryLayout::stake_list(7);
    assert_eq!(stake.item_size, STAKE_RECORD_LEN + 7);
    assert_eq!(stake.capacity, STAKE_LIST_CAPACITY);
    assert_eq!(stake.discriminator, STAKE_LIST_DISCRIMINATOR);

    let validator = RegistryLayout::validator_list(0);
    assert_eq!(validator.item_size, VALIDATOR_RECORD_LEN);
    assert_eq!(validator.capacity, VALIDATOR_LIST_CAPACITY);
    assert_eq!(validator.discriminator, VALIDATOR_LIST_DISCRIMINATOR);
}

#[test]
fn test_registry_header_is_empty() {
    let pool = Pubkey::new_unique();
    let header = RegistryLayout::validator_list(3).header(&pool);
    assert_eq!(header.count, 0);
    assert_eq!(header.pool_pubkey(), pool);
    assert_eq!(header.additional_record_space, 3);
    assert_eq!(header.item_size, VALIDATOR_RECORD_LEN + 3);
}

#[test]
fn test_default_registries_fit_creation_limit() {
    assert!(RegistryLayout::stake_list(0).space() <= MAX_PERMITTED_DATA_INCREASE as u64);
    assert!(RegistryLayout::validator_list(0).space() <= MAX_PERMITTED_DATA_INCREASE as u64);
}

// ═══════════════════════════════════════════════════════════════
// Instruction Decoding
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_initialize_instruction_round_trip() {
    let root = Pubkey::new_unique();
    let data = reference_data();
    let packed = StakeInstruction::Initialize { root, data }.pack();
    assert_eq!(packed.len(), INITIALIZE_LEN);
    assert_eq!(packed.len(), 177);
    assert_eq!(
        StakeInstruction::unpack(&packed).unwrap(),
        StakeInstruction::Initialize { root, data }
    );
}

#[test]
fn test_initialize_instruction_trailing_bytes_ignored() {
    let root = Pubkey::new_unique();
    let data = reference_data();
    let mut packed = StakeInstruction::Initialize { root, data }.pack();
    packed.extend_from_slice(&[0xAA; 4]);
    assert_eq!(
        StakeInstruction::unpack(&packed).unwrap(),
        StakeInstruction::Initialize { root, data }
    );
}
