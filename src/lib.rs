//! Liquid Stake Pool Program: pool initialization and account derivation
//!
//! A pool is identified by a root key. Its config record lives at the PDA
//! `[b"stake_pool", root]` and every other pool account, token mint and
//! signing authority is derived under the config address:
//! `[pool_config, role_seed]`. No pool authority is ever an on-curve key.
//!
//! Architecture:
//! - `pda`:         namespace derivation for the config and all 13 roles
//! - `provision`:   create/fund operations for every pool-owned account
//! - `bootstrap`:   st/LP mint and token account initialization
//! - `initializer`: the ordered plan and the host-side state machine that
//!                  submits it to a `Ledger`
//! - `validator`:   read-only audit of an initialized pool
//! - `processor`:   executes the same plan on chain through CPIs
//!
//! Instructions:
//!   0 - Initialize: Create the pool config, reserve, sol leg, registries,
//!                   st mint, LP mint, st leg and treasury accounts

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod initializer;
pub mod instruction;
pub mod ledger;
pub mod pda;
pub mod processor;
pub mod provision;
pub mod state;
pub mod validator;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;

pub use initializer::initialize;
pub use validator::validate;

solana_program::declare_id!("HKAcT7fC13jVeHXqEsp2xbTG78uCguLvqDQAaorxcQfR");
