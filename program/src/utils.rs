// VRF Raffle Program - Utility Functions
use solana_program::pubkey::Pubkey;

use crate::constants::{AUTHORITY_SEED, COORDINATOR_SEED, LAMPORTS_PER_SOL, RAFFLE_SEED};

/// Map a random word onto `[0, count)`.
///
/// Plain modulo: the slight bias towards low indices is negligible because the
/// word range dwarfs any participant count.
pub fn winner_index(random_word: u64, count: usize) -> Option<usize> {
    if count == 0 {
        return None;
    }
    Some((random_word % count as u64) as usize)
}

/// Find the program derived address of a raffle pool
pub fn find_raffle_address(program_id: &Pubkey, creator: &Pubkey, raffle_id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[RAFFLE_SEED, creator.as_ref(), &raffle_id.to_le_bytes()],
        program_id,
    )
}

/// Find the coordinator state account of a coordinator program
pub fn find_coordinator_address(coordinator_program: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[COORDINATOR_SEED], coordinator_program)
}

/// Find the PDA a coordinator program signs fulfillment callbacks with
pub fn find_coordinator_authority(coordinator_program: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[AUTHORITY_SEED], coordinator_program)
}

/// Convert lamports to SOL (for display purposes)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}
