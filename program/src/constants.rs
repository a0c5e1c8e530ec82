// VRF Raffle Program - Constants

/// Seed prefix of a raffle pool PDA: `["raffle", creator, raffle_id_le]`.
pub const RAFFLE_SEED: &[u8] = b"raffle";

/// Seed of the coordinator state PDA owned by the VRF coordinator.
pub const COORDINATOR_SEED: &[u8] = b"coordinator";

/// Seed of the coordinator PDA that signs fulfillment callbacks.
pub const AUTHORITY_SEED: &[u8] = b"authority";

/// Block confirmations the oracle waits for before answering.
pub const REQUEST_CONFIRMATIONS: u16 = 3;

/// Random words requested per round. Only the first one is used.
pub const NUM_WORDS: u32 = 1;

/// Entries a single round can hold; the raffle account is allocated for this many.
pub const MAX_PARTICIPANTS: usize = 100;

/// Upper bound on words per request accepted by the coordinator.
pub const MAX_NUM_WORDS: u32 = 500;

/// Pending requests the mock coordinator can track at once.
pub const MAX_PENDING_REQUESTS: usize = 32;

/// Subscriptions the mock coordinator can track.
pub const MAX_SUBSCRIPTIONS: usize = 16;

/// 1 SOL = 1,000,000,000 lamports
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
