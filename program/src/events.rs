// VRF Raffle Program - Events
//
// Events are borsh encoded and written with `sol_log_data`, prefixed with a
// one byte discriminator so indexers can tell them apart.
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{log::sol_log_data, msg, pubkey::Pubkey};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleEvent {
    Entered = 0,
    WinnerRequested = 1,
    WinnerPicked = 2,
    RandomWordsRequested = 3,
    RandomWordsFulfilled = 4,
}

pub trait Event: BorshSerialize {
    const KIND: RaffleEvent;

    /// Bytes written to the log: the discriminator followed by the borsh encoding.
    fn to_log_data(&self) -> std::io::Result<Vec<u8>> {
        let mut data = vec![Self::KIND as u8];
        self.serialize(&mut data)?;
        Ok(data)
    }

    /// Log the event. Serialization into a `Vec` cannot fail for these
    /// types, so an encoding error only drops the structured payload.
    fn emit(&self) {
        match self.to_log_data() {
            Ok(data) => sol_log_data(&[data.as_slice()]),
            Err(err) => msg!("Failed to encode {:?} event: {}", Self::KIND, err),
        }
    }
}

/// A participant paid the fee and joined the current round.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct RaffleEntered {
    pub raffle: Pubkey,
    pub participant: Pubkey,
    pub amount: u64,
}

/// The round closed and a randomness request is outstanding.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct RequestedRaffleWinner {
    pub raffle: Pubkey,
    pub request_id: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct WinnerPicked {
    pub raffle: Pubkey,
    pub request_id: u64,
    pub winner: Pubkey,
    pub prize: u64,
    pub timestamp: i64,
}

/// Emitted by the mock coordinator when it records a request.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct RandomWordsRequested {
    pub request_id: u64,
    pub requester: Pubkey,
    pub key_hash: [u8; 32],
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct RandomWordsFulfilled {
    pub request_id: u64,
    pub consumer: Pubkey,
    pub payment: u64,
}

impl Event for RaffleEntered {
    const KIND: RaffleEvent = RaffleEvent::Entered;
}

impl Event for RequestedRaffleWinner {
    const KIND: RaffleEvent = RaffleEvent::WinnerRequested;
}

impl Event for WinnerPicked {
    const KIND: RaffleEvent = RaffleEvent::WinnerPicked;
}

impl Event for RandomWordsRequested {
    const KIND: RaffleEvent = RaffleEvent::RandomWordsRequested;
}

impl Event for RandomWordsFulfilled {
    const KIND: RaffleEvent = RaffleEvent::RandomWordsFulfilled;
}
