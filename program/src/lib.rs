// VRF Raffle
// A participation pool that closes on upkeep and pays a winner drawn from verifiable randomness

pub mod constants;
pub mod error;
pub mod events;
pub mod instruction;
pub mod oracle;
pub mod processor;
pub mod state;
pub mod utils;

// Local coordinator used to drive the raffle in tests
pub mod vrf_mock;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process(program_id, accounts, instruction_data)
}
