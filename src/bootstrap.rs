//! Token bootstrap: initialize the two mints and the two token accounts.
//!
//! Mint authorities and token-account owners are always derived addresses,
//! so only the program can ever mint or move pool tokens. Mints carry no
//! freeze authority.

use solana_program::{msg, pubkey::Pubkey};

use crate::error::StakeError;
use crate::ledger::Operation;
use crate::pda::{is_off_curve, PoolAddresses, Role};

pub const ST_DECIMALS: u8 = 9;
pub const LP_DECIMALS: u8 = 9;

/// Initialize `mint` with a derived `authority`. Rejects on-curve authorities.
pub fn initialize_mint(
    mint: Pubkey,
    decimals: u8,
    authority: Pubkey,
    freeze_authority: Option<Pubkey>,
) -> Result<Operation, StakeError> {
    if !is_off_curve(&authority) {
        msg!("Error: mint authority {} is on curve", authority);
        return Err(StakeError::AuthorityNotDerived);
    }
    if let Some(freeze) = freeze_authority {
        if !is_off_curve(&freeze) {
            msg!("Error: freeze authority {} is on curve", freeze);
            return Err(StakeError::AuthorityNotDerived);
        }
    }
    Ok(Operation::InitializeMint {
        mint,
        decimals,
        mint_authority: authority,
        freeze_authority,
    })
}

/// Initialize a token account of `mint` owned by a derived `owner`.
pub fn initialize_token_account(
    account: Pubkey,
    mint: Pubkey,
    owner: Pubkey,
) -> Result<Operation, StakeError> {
    if !is_off_curve(&owner) {
        msg!("Error: token account owner {} is on curve", owner);
        return Err(StakeError::AuthorityNotDerived);
    }
    Ok(Operation::InitializeTokenAccount { account, mint, owner })
}

/// Token initialization for a freshly provisioned pool. Mints come first;
/// token accounts need an initialized mint.
pub fn bootstrap(addresses: &PoolAddresses) -> Result<Vec<Operation>, StakeError> {
    let st_mint = addresses.address(Role::StMint);
    Ok(vec![
        initialize_mint(
            st_mint,
            ST_DECIMALS,
            addresses.address(Role::StMintAuthority),
            None,
        )?,
        initialize_mint(
            addresses.address(Role::LpMint),
            LP_DECIMALS,
            addresses.address(Role::LpMintAuthority),
            None,
        )?,
        initialize_token_account(
            addresses.address(Role::StLeg),
            st_mint,
            addresses.address(Role::StLegAuthority),
        )?,
        initialize_token_account(
            addresses.address(Role::TreasuryStAccount),
            st_mint,
            addresses.pool.address,
        )?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::{Keypair, Signer};

    #[test]
    fn test_on_curve_mint_authority_rejected() {
        let key = Keypair::new().pubkey();
        assert_eq!(
            initialize_mint(Pubkey::new_unique(), 9, key, None),
            Err(StakeError::AuthorityNotDerived)
        );
    }

    #[test]
    fn test_on_curve_token_owner_rejected() {
        let key = Keypair::new().pubkey();
        assert_eq!(
            initialize_token_account(Pubkey::new_unique(), Pubkey::new_unique(), key),
            Err(StakeError::AuthorityNotDerived)
        );
    }

    #[test]
    fn test_bootstrap_uses_derived_authorities() {
        let addresses =
            PoolAddresses::derive(&Pubkey::new_unique(), &Pubkey::new_unique()).unwrap();
        let ops = bootstrap(&addresses).unwrap();
        assert_eq!(ops.len(), 4);
        assert_eq!(
            ops[0],
            Operation::InitializeMint {
                mint: addresses.address(Role::StMint),
                decimals: ST_DECIMALS,
                mint_authority: addresses.address(Role::StMintAuthority),
                freeze_authority: None,
            }
        );
        assert_eq!(
            ops[3],
            Operation::InitializeTokenAccount {
                account: addresses.address(Role::TreasuryStAccount),
                mint: addresses.address(Role::StMint),
                owner: addresses.pool.address,
            }
        );
    }
}
