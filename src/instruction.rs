use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::config::{InitializeData, INITIALIZE_DATA_LEN};
use crate::error::StakeError;
use crate::pda::{PoolAddresses, Role};

/// Tag byte + root + initialize payload
pub const INITIALIZE_LEN: usize = 1 + 32 + INITIALIZE_DATA_LEN;

/// Instructions for the liquid stake pool program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakeInstruction {
    /// Create and initialize every account of the pool derived from `root`.
    /// All pool accounts are PDAs and must not exist yet (reserve and sol leg
    /// may hold lamports).
    ///
    /// Accounts:
    ///   0. `[signer, writable]` Payer (funds every account)
    ///   1. `[writable]` Pool config PDA
    ///   2. `[writable]` Reserve PDA
    ///   3. `[writable]` Sol leg PDA
    ///   4. `[writable]` Stake list PDA
    ///   5. `[writable]` Validator list PDA
    ///   6. `[writable]` St mint PDA
    ///   7. `[writable]` LP mint PDA
    ///   8. `[writable]` St leg token account PDA
    ///   9. `[writable]` Treasury st token account PDA
    ///  10. `[]` Token program
    ///  11. `[]` System program
    Initialize { root: Pubkey, data: InitializeData },
}

impl StakeInstruction {
    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        let (&tag, rest) = data.split_first().ok_or(ProgramError::InvalidInstructionData)?;

        match tag {
            0 => {
                // Initialize: root(32) + data(144)
                if rest.len() < 32 + INITIALIZE_DATA_LEN {
                    return Err(ProgramError::InvalidInstructionData);
                }
                let root = Pubkey::try_from(&rest[0..32])
                    .map_err(|_| ProgramError::InvalidInstructionData)?;
                let data = InitializeData::unpack(&rest[32..])
                    .ok_or(ProgramError::InvalidInstructionData)?;
                Ok(Self::Initialize { root, data })
            }
            _ => Err(ProgramError::InvalidInstructionData),
        }
    }

    pub fn pack(&self) -> Vec<u8> {
        match self {
            Self::Initialize { root, data } => {
                let mut buf = Vec::with_capacity(INITIALIZE_LEN);
                buf.push(0);
                buf.extend_from_slice(root.as_ref());
                data.pack_into(&mut buf);
                buf
            }
        }
    }
}

/// Build an `Initialize` instruction with every pool account derived from `root`.
pub fn initialize(
    program_id: &Pubkey,
    payer: &Pubkey,
    root: &Pubkey,
    data: &InitializeData,
) -> Result<Instruction, StakeError> {
    let addresses = PoolAddresses::derive(program_id, root)?;
    let writable = |role: Role| AccountMeta::new(addresses.address(role), false);

    let accounts = vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new(addresses.pool.address, false),
        writable(Role::Reserve),
        writable(Role::SolLeg),
        writable(Role::StakeList),
        writable(Role::ValidatorList),
        writable(Role::StMint),
        writable(Role::LpMint),
        writable(Role::StLeg),
        writable(Role::TreasuryStAccount),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: StakeInstruction::Initialize { root: *root, data: *data }.pack(),
    })
}
