use crate::constants::RAFFLE_SEED;
use crate::error::RaffleError;
use crate::events::{Event, RaffleEntered, RequestedRaffleWinner, WinnerPicked};
use crate::instruction::RaffleInstruction;
use crate::oracle::CoordinatorClient;
use crate::state::{Raffle, RaffleConfig};
use crate::utils::{find_coordinator_authority, find_raffle_address, lamports_to_sol};

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_instruction,
    sysvar::{clock::Clock, rent::Rent, Sysvar},
};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::InitializeRaffle {
                raffle_id,
                entrance_fee,
                interval,
                gas_lane,
                subscription_id,
                callback_gas_limit,
            } => {
                msg!("Instruction: Initialize Raffle");
                Self::process_initialize_raffle(
                    accounts,
                    raffle_id,
                    RaffleSettings {
                        entrance_fee,
                        interval,
                        gas_lane,
                        subscription_id,
                        callback_gas_limit,
                    },
                    program_id,
                )
            }
            RaffleInstruction::EnterRaffle { amount } => {
                msg!("Instruction: Enter Raffle");
                Self::process_enter_raffle(accounts, amount, program_id)
            }
            RaffleInstruction::CheckUpkeep { check_data } => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(accounts, check_data, program_id)
            }
            RaffleInstruction::PerformUpkeep { perform_data } => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(accounts, &perform_data, program_id)
            }
            RaffleInstruction::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(accounts, request_id, &random_words, program_id)
            }
        }
    }

    /// Load a raffle account after checking it belongs to this program
    fn load_raffle(raffle_info: &AccountInfo, program_id: &Pubkey) -> Result<Raffle, ProgramError> {
        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }
        Raffle::load(&raffle_info.data.borrow())
    }

    fn process_initialize_raffle(
        accounts: &[AccountInfo],
        raffle_id: u64,
        settings: RaffleSettings,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let creator_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let coordinator_program_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;
        let clock_info = next_account_info(account_info_iter)?;

        // Ensure the creator signed the transaction
        if !creator_info.is_signer {
            msg!("Creator must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (expected_raffle, bump) = find_raffle_address(program_id, creator_info.key, raffle_id);
        if *raffle_info.key != expected_raffle {
            msg!("Invalid raffle account address");
            return Err(RaffleError::InvalidRaffleAccount.into());
        }

        // The coordinator state must belong to the coordinator program we will call
        if coordinator_info.owner != coordinator_program_info.key {
            msg!("Coordinator account is not owned by the coordinator program");
            return Err(ProgramError::IncorrectProgramId);
        }

        let clock = Clock::from_account_info(clock_info)?;
        let raffle = Raffle::new(
            bump,
            raffle_id,
            *creator_info.key,
            RaffleConfig {
                entrance_fee: settings.entrance_fee,
                interval: settings.interval,
                gas_lane: settings.gas_lane,
                subscription_id: settings.subscription_id,
                callback_gas_limit: settings.callback_gas_limit,
                coordinator_program: *coordinator_program_info.key,
                coordinator: *coordinator_info.key,
            },
            clock.unix_timestamp,
        )?;

        if raffle_info.owner == program_id {
            if Raffle::load(&raffle_info.data.borrow()).is_ok() {
                msg!("Raffle account is already initialized");
                return Err(RaffleError::AlreadyInitialized.into());
            }
        } else {
            msg!("Creating new raffle account");
            let rent = Rent::get()?;
            invoke_signed(
                &system_instruction::create_account(
                    creator_info.key,
                    raffle_info.key,
                    rent.minimum_balance(Raffle::LEN),
                    Raffle::LEN as u64,
                    program_id,
                ),
                &[
                    creator_info.clone(),
                    raffle_info.clone(),
                    system_program_info.clone(),
                ],
                &[&[
                    RAFFLE_SEED,
                    creator_info.key.as_ref(),
                    &raffle_id.to_le_bytes(),
                    &[bump],
                ]],
            )?;
        }

        raffle.save(raffle_info)?;

        msg!(
            "Raffle initialized: Id={}, EntranceFee={} SOL, Interval={}s, Coordinator={}",
            raffle_id,
            lamports_to_sol(raffle.entrance_fee),
            raffle.interval,
            raffle.coordinator_program
        );
        Ok(())
    }

    fn process_enter_raffle(
        accounts: &[AccountInfo],
        amount: u64,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let participant_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        // Ensure the participant signed the transaction
        if !participant_info.is_signer {
            msg!("Participant must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = Self::load_raffle(raffle_info, program_id)?;
        raffle.enter(*participant_info.key, amount)?;

        // Entry fees are held by the raffle account until payout
        invoke(
            &system_instruction::transfer(participant_info.key, raffle_info.key, amount),
            &[
                participant_info.clone(),
                raffle_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        raffle.save(raffle_info)?;

        RaffleEntered {
            raffle: *raffle_info.key,
            participant: *participant_info.key,
            amount,
        }
        .emit();

        msg!(
            "{} entered with {} lamports, {} entries, pool {} lamports",
            participant_info.key,
            amount,
            raffle.number_of_participants(),
            raffle.balance
        );
        Ok(())
    }

    fn process_check_upkeep(
        accounts: &[AccountInfo],
        check_data: Vec<u8>,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;
        let clock_info = next_account_info(account_info_iter)?;

        let raffle = Self::load_raffle(raffle_info, program_id)?;
        let clock = Clock::from_account_info(clock_info)?;
        let upkeep_needed = raffle.check_upkeep(clock.unix_timestamp);

        // check_data comes back untouched as the perform payload
        let mut result = Vec::with_capacity(1 + check_data.len());
        result.push(upkeep_needed as u8);
        result.extend_from_slice(&check_data);
        set_return_data(&result);

        msg!("Upkeep needed: {}", upkeep_needed);
        Ok(())
    }

    fn process_perform_upkeep(
        accounts: &[AccountInfo],
        perform_data: &[u8],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let coordinator_program_info = next_account_info(account_info_iter)?;
        let clock_info = next_account_info(account_info_iter)?;

        let mut raffle = Self::load_raffle(raffle_info, program_id)?;

        if raffle.coordinator != *coordinator_info.key
            || raffle.coordinator_program != *coordinator_program_info.key
        {
            msg!("Coordinator accounts do not match the ones registered with this raffle");
            return Err(ProgramError::InvalidArgument);
        }

        let clock = Clock::from_account_info(clock_info)?;
        msg!("Perform data: {} bytes", perform_data.len());

        let authority = raffle.authority;
        let raffle_id = raffle.raffle_id.to_le_bytes();
        let bump = [raffle.bump];
        let raffle_seeds: &[&[u8]] = &[RAFFLE_SEED, authority.as_ref(), &raffle_id, &bump];

        let mut oracle = CoordinatorClient {
            coordinator_program: coordinator_program_info,
            coordinator: coordinator_info,
            requester: raffle_info,
            requester_seeds: raffle_seeds,
        };
        let request_id = raffle.perform_upkeep(clock.unix_timestamp, &mut oracle)?;

        raffle.save(raffle_info)?;

        RequestedRaffleWinner {
            raffle: *raffle_info.key,
            request_id,
        }
        .emit();

        msg!(
            "Requested raffle winner: request {} for {} entries",
            request_id,
            raffle.number_of_participants()
        );
        Ok(())
    }

    fn process_fulfill_random_words(
        accounts: &[AccountInfo],
        request_id: u64,
        random_words: &[u64],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let clock_info = next_account_info(account_info_iter)?;
        let candidates = account_info_iter.as_slice();

        let mut raffle = Self::load_raffle(raffle_info, program_id)?;

        // Only the coordinator this raffle was created with may deliver randomness
        let (expected_authority, _) = find_coordinator_authority(&raffle.coordinator_program);
        if !authority_info.is_signer || *authority_info.key != expected_authority {
            msg!("Fulfillment must be signed by the coordinator authority {}", expected_authority);
            return Err(RaffleError::UnauthorizedFulfillment.into());
        }

        let clock = Clock::from_account_info(clock_info)?;

        let (winner, prize) = raffle.fulfill_random_words(
            request_id,
            random_words,
            clock.unix_timestamp,
            |winner, prize| {
                let winner_info = candidates
                    .iter()
                    .find(|info| info.key == winner)
                    .ok_or(ProgramError::NotEnoughAccountKeys)?;
                if !winner_info.is_writable {
                    msg!("Winner account {} is not writable", winner);
                    return Err(ProgramError::InvalidAccountData);
                }

                let raffle_lamports = raffle_info
                    .lamports()
                    .checked_sub(prize)
                    .ok_or(ProgramError::InsufficientFunds)?;
                let winner_lamports = winner_info
                    .lamports()
                    .checked_add(prize)
                    .ok_or(ProgramError::InvalidArgument)?;

                **raffle_info.try_borrow_mut_lamports()? = raffle_lamports;
                **winner_info.try_borrow_mut_lamports()? = winner_lamports;
                Ok(())
            },
        )?;

        raffle.save(raffle_info)?;

        WinnerPicked {
            raffle: *raffle_info.key,
            request_id,
            winner,
            prize,
            timestamp: clock.unix_timestamp,
        }
        .emit();

        msg!(
            "Winner picked: {} receives {} SOL (request {})",
            winner,
            lamports_to_sol(prize),
            request_id
        );
        Ok(())
    }
}

/// Per-raffle settings carried by InitializeRaffle
struct RaffleSettings {
    entrance_fee: u64,
    interval: i64,
    gas_lane: [u8; 32],
    subscription_id: u64,
    callback_gas_limit: u32,
}
