// Mock VRF coordinator for local testing
//
// Stands in for a real randomness oracle: requests are recorded and answered
// only when someone calls FulfillRandomWords with a request id, optionally
// choosing the words. Load it next to the raffle program in solana-program-test
// with `processor!(vrf_raffle::vrf_mock::process_instruction)`.
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    hash::hashv,
    instruction::{AccountMeta, Instruction},
    msg,
    program::{invoke_signed, set_return_data},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_instruction,
    sysvar::{rent::Rent, Sysvar},
};

use crate::constants::{
    AUTHORITY_SEED, COORDINATOR_SEED, MAX_NUM_WORDS, MAX_PENDING_REQUESTS, MAX_SUBSCRIPTIONS,
};
use crate::error::VrfMockError;
use crate::events::{Event, RandomWordsFulfilled, RandomWordsRequested};
use crate::oracle::{fulfill_random_words_data, CoordinatorInstruction, RandomWordsRequest};
use crate::utils::{find_coordinator_address, find_coordinator_authority};

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct Subscription {
    pub id: u64,
    pub owner: Pubkey,
    /// Bookkeeping balance, charged on every fulfillment
    pub balance: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct PendingRandomWords {
    pub request_id: u64,
    /// Account that signed the request
    pub requester: Pubkey,
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

/// Coordinator state account
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct Coordinator {
    pub is_initialized: bool,
    pub bump: u8,
    /// Bump of the callback authority PDA
    pub authority_bump: u8,
    /// Flat fee charged per fulfillment
    pub base_fee: u64,
    /// Charge per unit of callback gas limit
    pub gas_price: u64,
    pub next_request_id: u64,
    pub next_subscription_id: u64,
    pub subscriptions: Vec<Subscription>,
    pub pending: Vec<PendingRandomWords>,
}

impl Coordinator {
    pub const LEN: usize = 1 + 1 + 1 + 8 + 8 + 8 + 8
        + (4 + MAX_SUBSCRIPTIONS * (8 + 32 + 8))
        + (4 + MAX_PENDING_REQUESTS * (8 + 32 + 8 + 4 + 4));

    pub fn load(data: &[u8]) -> Result<Self, ProgramError> {
        let coordinator = Self::deserialize(&mut &data[..])
            .map_err(|_| ProgramError::InvalidAccountData)?;
        if !coordinator.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }
        Ok(coordinator)
    }

    pub fn save(&self, account: &AccountInfo) -> ProgramResult {
        self.serialize(&mut &mut account.data.borrow_mut()[..])
            .map_err(|err| ProgramError::BorshIoError(err.to_string()))
    }

    /// What a fulfillment costs the subscription
    pub fn payment(&self, callback_gas_limit: u32) -> Option<u64> {
        self.gas_price
            .checked_mul(callback_gas_limit as u64)?
            .checked_add(self.base_fee)
    }

    fn subscription_mut(&mut self, subscription_id: u64) -> Result<&mut Subscription, VrfMockError> {
        self.subscriptions
            .iter_mut()
            .find(|sub| sub.id == subscription_id)
            .ok_or(VrfMockError::InvalidSubscription)
    }
}

/// Words used when the caller does not pick them: hash(request_id, index).
pub fn derive_random_words(request_id: u64, num_words: u32) -> Vec<u64> {
    (0..num_words as u64)
        .map(|index| {
            let hash = hashv(&[&request_id.to_le_bytes(), &index.to_le_bytes()]);
            let mut word = [0u8; 8];
            word.copy_from_slice(&hash.to_bytes()[..8]);
            u64::from_le_bytes(word)
        })
        .collect()
}

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    let instruction = CoordinatorInstruction::try_from_slice(instruction_data)
        .map_err(|_| ProgramError::InvalidInstructionData)?;

    match instruction {
        CoordinatorInstruction::Initialize { base_fee, gas_price } => {
            msg!("Coordinator: Initialize");
            process_initialize(program_id, accounts, base_fee, gas_price)
        }
        CoordinatorInstruction::CreateSubscription => {
            msg!("Coordinator: Create Subscription");
            process_create_subscription(program_id, accounts)
        }
        CoordinatorInstruction::FundSubscription {
            subscription_id,
            amount,
        } => {
            msg!("Coordinator: Fund Subscription");
            process_fund_subscription(program_id, accounts, subscription_id, amount)
        }
        CoordinatorInstruction::RequestRandomWords(request) => {
            msg!("Coordinator: Request Random Words");
            process_request_random_words(program_id, accounts, request)
        }
        CoordinatorInstruction::FulfillRandomWords {
            request_id,
            random_words,
        } => {
            msg!("Coordinator: Fulfill Random Words");
            process_fulfill_random_words(program_id, accounts, request_id, random_words)
        }
    }
}

fn load_coordinator(program_id: &Pubkey, coordinator_info: &AccountInfo) -> Result<Coordinator, ProgramError> {
    if coordinator_info.owner != program_id {
        msg!("Coordinator account must be owned by the coordinator program");
        return Err(ProgramError::IncorrectProgramId);
    }
    Coordinator::load(&coordinator_info.data.borrow())
}

fn process_initialize(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    base_fee: u64,
    gas_price: u64,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let payer_info = next_account_info(account_info_iter)?;
    let coordinator_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;

    if !payer_info.is_signer {
        msg!("Payer must sign the transaction");
        return Err(ProgramError::MissingRequiredSignature);
    }

    let (expected_coordinator, bump) = find_coordinator_address(program_id);
    if *coordinator_info.key != expected_coordinator {
        msg!("Invalid coordinator account address");
        return Err(ProgramError::InvalidArgument);
    }

    if coordinator_info.owner == program_id {
        if Coordinator::load(&coordinator_info.data.borrow()).is_ok() {
            return Err(VrfMockError::AlreadyInitialized.into());
        }
    } else {
        let rent = Rent::get()?;
        invoke_signed(
            &system_instruction::create_account(
                payer_info.key,
                coordinator_info.key,
                rent.minimum_balance(Coordinator::LEN),
                Coordinator::LEN as u64,
                program_id,
            ),
            &[
                payer_info.clone(),
                coordinator_info.clone(),
                system_program_info.clone(),
            ],
            &[&[COORDINATOR_SEED, &[bump]]],
        )?;
    }

    let (_, authority_bump) = find_coordinator_authority(program_id);
    let coordinator = Coordinator {
        is_initialized: true,
        bump,
        authority_bump,
        base_fee,
        gas_price,
        next_request_id: 1,
        next_subscription_id: 1,
        subscriptions: Vec::new(),
        pending: Vec::new(),
    };
    coordinator.save(coordinator_info)?;

    msg!("Coordinator initialized: base fee={}, gas price={}", base_fee, gas_price);
    Ok(())
}

fn process_create_subscription(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let owner_info = next_account_info(account_info_iter)?;
    let coordinator_info = next_account_info(account_info_iter)?;

    if !owner_info.is_signer {
        msg!("Subscription owner must sign the transaction");
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut coordinator = load_coordinator(program_id, coordinator_info)?;
    if coordinator.subscriptions.len() >= MAX_SUBSCRIPTIONS {
        return Err(VrfMockError::TooManySubscriptions.into());
    }

    let subscription_id = coordinator.next_subscription_id;
    coordinator.next_subscription_id += 1;
    coordinator.subscriptions.push(Subscription {
        id: subscription_id,
        owner: *owner_info.key,
        balance: 0,
    });
    coordinator.save(coordinator_info)?;

    set_return_data(&subscription_id.to_le_bytes());
    msg!("Subscription {} created for {}", subscription_id, owner_info.key);
    Ok(())
}

fn process_fund_subscription(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    subscription_id: u64,
    amount: u64,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let coordinator_info = next_account_info(account_info_iter)?;

    let mut coordinator = load_coordinator(program_id, coordinator_info)?;
    let subscription = coordinator.subscription_mut(subscription_id)?;
    subscription.balance = subscription
        .balance
        .checked_add(amount)
        .ok_or(ProgramError::InvalidArgument)?;
    let balance = subscription.balance;
    coordinator.save(coordinator_info)?;

    msg!("Subscription {} funded with {}, balance {}", subscription_id, amount, balance);
    Ok(())
}

fn process_request_random_words(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    request: RandomWordsRequest,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let coordinator_info = next_account_info(account_info_iter)?;
    let requester_info = next_account_info(account_info_iter)?;

    if !requester_info.is_signer {
        msg!("Requester must sign the request");
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut coordinator = load_coordinator(program_id, coordinator_info)?;
    coordinator.subscription_mut(request.subscription_id)?;

    if request.num_words == 0 {
        return Err(VrfMockError::InvalidRandomWords.into());
    }
    if request.num_words > MAX_NUM_WORDS {
        msg!("Requested {} words, at most {} allowed", request.num_words, MAX_NUM_WORDS);
        return Err(VrfMockError::NumWordsTooBig.into());
    }
    if coordinator.pending.len() >= MAX_PENDING_REQUESTS {
        return Err(VrfMockError::TooManyPendingRequests.into());
    }

    let request_id = coordinator.next_request_id;
    coordinator.next_request_id += 1;
    coordinator.pending.push(PendingRandomWords {
        request_id,
        requester: *requester_info.key,
        subscription_id: request.subscription_id,
        callback_gas_limit: request.callback_gas_limit,
        num_words: request.num_words,
    });
    coordinator.save(coordinator_info)?;

    RandomWordsRequested {
        request_id,
        requester: *requester_info.key,
        key_hash: request.key_hash,
        subscription_id: request.subscription_id,
        request_confirmations: request.request_confirmations,
        callback_gas_limit: request.callback_gas_limit,
        num_words: request.num_words,
    }
    .emit();

    set_return_data(&request_id.to_le_bytes());
    msg!("Random words request {} recorded for {}", request_id, requester_info.key);
    Ok(())
}

fn process_fulfill_random_words(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    request_id: u64,
    random_words: Vec<u64>,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let coordinator_info = next_account_info(account_info_iter)?;
    let authority_info = next_account_info(account_info_iter)?;
    let consumer_program_info = next_account_info(account_info_iter)?;
    let consumer_info = next_account_info(account_info_iter)?;
    let extra_accounts = account_info_iter.as_slice();

    let mut coordinator = load_coordinator(program_id, coordinator_info)?;

    let authority = Pubkey::create_program_address(
        &[AUTHORITY_SEED, &[coordinator.authority_bump]],
        program_id,
    )?;
    if *authority_info.key != authority {
        msg!("Invalid callback authority account");
        return Err(ProgramError::InvalidArgument);
    }

    let position = coordinator
        .pending
        .iter()
        .position(|pending| pending.request_id == request_id)
        .ok_or(VrfMockError::NonexistentRequest)?;
    let pending = coordinator.pending.remove(position);

    let random_words = if random_words.is_empty() {
        derive_random_words(request_id, pending.num_words)
    } else if random_words.len() != pending.num_words as usize {
        msg!(
            "Got {} words for request {}, expected {}",
            random_words.len(),
            request_id,
            pending.num_words
        );
        return Err(VrfMockError::InvalidRandomWords.into());
    } else {
        random_words
    };

    let payment = coordinator
        .payment(pending.callback_gas_limit)
        .ok_or(VrfMockError::InsufficientBalance)?;
    let subscription = coordinator.subscription_mut(pending.subscription_id)?;
    subscription.balance = subscription
        .balance
        .checked_sub(payment)
        .ok_or(VrfMockError::InsufficientBalance)?;
    coordinator.save(coordinator_info)?;

    let mut metas = vec![
        AccountMeta::new_readonly(*authority_info.key, true),
        AccountMeta::new(*consumer_info.key, false),
    ];
    metas.extend(extra_accounts.iter().map(|acc| AccountMeta {
        pubkey: *acc.key,
        is_signer: acc.is_signer,
        is_writable: acc.is_writable,
    }));

    let mut account_infos = vec![authority_info.clone(), consumer_info.clone()];
    account_infos.extend(extra_accounts.iter().cloned());
    account_infos.push(consumer_program_info.clone());

    invoke_signed(
        &Instruction {
            program_id: *consumer_program_info.key,
            accounts: metas,
            data: fulfill_random_words_data(request_id, &random_words),
        },
        &account_infos,
        &[&[AUTHORITY_SEED, &[coordinator.authority_bump]]],
    )?;

    RandomWordsFulfilled {
        request_id,
        consumer: *consumer_info.key,
        payment,
    }
    .emit();

    msg!("Request {} fulfilled, charged {}", request_id, payment);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_words_are_deterministic_per_request() {
        let first = derive_random_words(1, 3);
        assert_eq!(first.len(), 3);
        assert_eq!(first, derive_random_words(1, 3));
        assert_ne!(first, derive_random_words(2, 3));
        assert_ne!(first[0], first[1]);
    }

    #[test]
    fn payment_is_base_fee_plus_gas() {
        let coordinator = Coordinator {
            is_initialized: true,
            bump: 255,
            authority_bump: 254,
            base_fee: 250,
            gas_price: 2,
            next_request_id: 1,
            next_subscription_id: 1,
            subscriptions: Vec::new(),
            pending: Vec::new(),
        };
        assert_eq!(coordinator.payment(100), Some(450));

        let expensive = Coordinator {
            gas_price: u64::MAX,
            ..coordinator
        };
        assert_eq!(expensive.payment(2), None);
    }

    #[test]
    fn full_coordinator_fits_allocation() {
        let coordinator = Coordinator {
            is_initialized: true,
            bump: 255,
            authority_bump: 254,
            base_fee: 1,
            gas_price: 1,
            next_request_id: 1,
            next_subscription_id: 1,
            subscriptions: vec![
                Subscription {
                    id: 1,
                    owner: Pubkey::new_unique(),
                    balance: 0,
                };
                MAX_SUBSCRIPTIONS
            ],
            pending: vec![
                PendingRandomWords {
                    request_id: 1,
                    requester: Pubkey::new_unique(),
                    subscription_id: 1,
                    callback_gas_limit: 1,
                    num_words: 1,
                };
                MAX_PENDING_REQUESTS
            ],
        };
        assert_eq!(coordinator.try_to_vec().unwrap().len(), Coordinator::LEN);
    }
}
