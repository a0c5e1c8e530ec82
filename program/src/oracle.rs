// VRF Raffle Program - Oracle client
//
// The raffle only needs two things from a randomness oracle: a way to ask for
// random words that returns a request id right away, and a callback that later
// delivers the words for that id. The coordinator wire protocol below is what
// both sides of that contract speak.
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo,
    instruction::{AccountMeta, Instruction},
    msg,
    program::{get_return_data, invoke_signed},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::error::RaffleError;
use crate::utils::{find_coordinator_address, find_coordinator_authority};

/// Instruction tag consumers must route to their fulfillment handler.
pub const FULFILL_RANDOM_WORDS_TAG: u8 = 5;

/// Parameters of a single randomness request.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RandomWordsRequest {
    /// Gas lane the oracle answers on
    pub key_hash: [u8; 32],
    /// Subscription paying for the request
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

/// Capability to request random words from an oracle.
///
/// Implementations return as soon as the request is accepted. The words come
/// back later through a separate `FulfillRandomWords` callback carrying the
/// returned id.
pub trait RandomnessOracle {
    fn request_random_words(&mut self, request: &RandomWordsRequest) -> Result<u64, ProgramError>;
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub enum CoordinatorInstruction {
    /// Create the coordinator state
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Payer
    /// 1. `[writable]` Coordinator state (PDA)
    /// 2. `[]` The system program
    Initialize {
        /// Flat fee charged per fulfillment
        base_fee: u64,
        /// Price per unit of callback gas
        gas_price: u64,
    },

    /// Open a new subscription, its id is written as return data
    ///
    /// Accounts expected:
    /// 0. `[signer]` Subscription owner
    /// 1. `[writable]` Coordinator state
    CreateSubscription,

    /// Credit a subscription
    ///
    /// Accounts expected:
    /// 0. `[writable]` Coordinator state
    FundSubscription { subscription_id: u64, amount: u64 },

    /// Record a request, its id is written as return data
    ///
    /// Accounts expected:
    /// 0. `[writable]` Coordinator state
    /// 1. `[signer]` Requesting consumer account
    RequestRandomWords(RandomWordsRequest),

    /// Deliver random words for a pending request
    ///
    /// Accounts expected:
    /// 0. `[writable]` Coordinator state
    /// 1. `[]` Callback authority (PDA)
    /// 2. `[]` Consumer program
    /// 3. `[writable]` Consumer account
    /// 4.. Extra accounts forwarded to the consumer
    FulfillRandomWords {
        request_id: u64,
        /// Empty means derive the words from the request id
        random_words: Vec<u64>,
    },
}

/// Encode the callback a coordinator sends to a consumer program.
pub fn fulfill_random_words_data(request_id: u64, random_words: &[u64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + 8 + 4 + random_words.len() * 8);
    buf.push(FULFILL_RANDOM_WORDS_TAG);
    buf.extend_from_slice(&request_id.to_le_bytes());
    buf.extend_from_slice(&(random_words.len() as u32).to_le_bytes());
    for word in random_words {
        buf.extend_from_slice(&word.to_le_bytes());
    }
    buf
}

/// Oracle client that talks to a coordinator program through CPI.
///
/// `requester` is the consumer account the request is made for; it signs with
/// `requester_seeds` so the coordinator knows which account asked.
pub struct CoordinatorClient<'a, 'info> {
    pub coordinator_program: &'a AccountInfo<'info>,
    pub coordinator: &'a AccountInfo<'info>,
    pub requester: &'a AccountInfo<'info>,
    pub requester_seeds: &'a [&'a [u8]],
}

impl<'a, 'info> RandomnessOracle for CoordinatorClient<'a, 'info> {
    fn request_random_words(&mut self, request: &RandomWordsRequest) -> Result<u64, ProgramError> {
        let ix = request_random_words(
            self.coordinator_program.key,
            self.coordinator.key,
            self.requester.key,
            request,
        )?;

        invoke_signed(
            &ix,
            &[
                self.coordinator.clone(),
                self.requester.clone(),
                self.coordinator_program.clone(),
            ],
            &[self.requester_seeds],
        )?;

        let (program_id, data) = get_return_data().ok_or(RaffleError::MissingRequestId)?;
        if program_id != *self.coordinator_program.key {
            msg!("Return data came from {}, not the coordinator", program_id);
            return Err(RaffleError::MissingRequestId.into());
        }

        let request_id = data
            .get(..8)
            .and_then(|slice| slice.try_into().ok())
            .map(u64::from_le_bytes)
            .ok_or(RaffleError::MissingRequestId)?;

        Ok(request_id)
    }
}

/// Create coordinator initialize instruction
pub fn initialize(
    coordinator_program: &Pubkey,
    payer: &Pubkey,
    base_fee: u64,
    gas_price: u64,
) -> Result<Instruction, ProgramError> {
    let (coordinator, _) = find_coordinator_address(coordinator_program);

    Ok(Instruction::new_with_borsh(
        *coordinator_program,
        &CoordinatorInstruction::Initialize { base_fee, gas_price },
        vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(coordinator, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    ))
}

/// Create create_subscription instruction
pub fn create_subscription(
    coordinator_program: &Pubkey,
    owner: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let (coordinator, _) = find_coordinator_address(coordinator_program);

    Ok(Instruction::new_with_borsh(
        *coordinator_program,
        &CoordinatorInstruction::CreateSubscription,
        vec![
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new(coordinator, false),
        ],
    ))
}

/// Create fund_subscription instruction
pub fn fund_subscription(
    coordinator_program: &Pubkey,
    subscription_id: u64,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let (coordinator, _) = find_coordinator_address(coordinator_program);

    Ok(Instruction::new_with_borsh(
        *coordinator_program,
        &CoordinatorInstruction::FundSubscription {
            subscription_id,
            amount,
        },
        vec![AccountMeta::new(coordinator, false)],
    ))
}

/// Create request_random_words instruction
pub fn request_random_words(
    coordinator_program: &Pubkey,
    coordinator: &Pubkey,
    requester: &Pubkey,
    request: &RandomWordsRequest,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction::new_with_borsh(
        *coordinator_program,
        &CoordinatorInstruction::RequestRandomWords(request.clone()),
        vec![
            AccountMeta::new(*coordinator, false),
            AccountMeta::new_readonly(*requester, true),
        ],
    ))
}

/// Create fulfill_random_words instruction
///
/// `extra_accounts` are forwarded to the consumer untouched; a raffle needs
/// the winner's account among them.
pub fn fulfill_random_words(
    coordinator_program: &Pubkey,
    consumer_program: &Pubkey,
    consumer: &Pubkey,
    request_id: u64,
    random_words: Vec<u64>,
    extra_accounts: &[AccountMeta],
) -> Result<Instruction, ProgramError> {
    let (coordinator, _) = find_coordinator_address(coordinator_program);
    let (authority, _) = find_coordinator_authority(coordinator_program);

    let mut accounts = vec![
        AccountMeta::new(coordinator, false),
        AccountMeta::new_readonly(authority, false),
        AccountMeta::new_readonly(*consumer_program, false),
        AccountMeta::new(*consumer, false),
    ];
    accounts.extend_from_slice(extra_accounts);

    Ok(Instruction::new_with_borsh(
        *coordinator_program,
        &CoordinatorInstruction::FulfillRandomWords {
            request_id,
            random_words,
        },
        accounts,
    ))
}
