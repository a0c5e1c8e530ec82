use solana_program::{
    instruction::{AccountMeta, Instruction},
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
    sysvar::clock,
};

use crate::oracle::{fulfill_random_words_data, FULFILL_RANDOM_WORDS_TAG};
use crate::utils::{find_coordinator_address, find_raffle_address};

#[derive(Clone, Debug, PartialEq)]
pub enum RaffleInstruction {
    /// Create a raffle pool
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The creator, pays for the raffle account
    /// 1. `[writable]` The raffle account (PDA of creator and raffle_id)
    /// 2. `[]` The coordinator state account
    /// 3. `[]` The coordinator program
    /// 4. `[]` The system program
    /// 5. `[]` The clock sysvar
    InitializeRaffle {
        /// Creator-chosen id, lets one creator run several pools
        raffle_id: u64,
        /// Lamports required per entry
        entrance_fee: u64,
        /// Seconds a round stays open at least
        interval: i64,
        /// Oracle gas lane (key hash)
        gas_lane: [u8; 32],
        subscription_id: u64,
        callback_gas_limit: u32,
    },

    /// Enter the current round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The participant, pays the entrance fee
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The system program
    EnterRaffle {
        /// Lamports paid, at least the entrance fee
        amount: u64,
    },

    /// Report whether upkeep is due. Writes `[upkeep_needed, check_data..]` as return data.
    ///
    /// Accounts expected:
    /// 0. `[]` The raffle account
    /// 1. `[]` The clock sysvar
    CheckUpkeep { check_data: Vec<u8> },

    /// Close the round and request randomness (anyone can call this)
    ///
    /// Accounts expected:
    /// 0. `[writable]` The raffle account
    /// 1. `[writable]` The coordinator state account
    /// 2. `[]` The coordinator program
    /// 3. `[]` The clock sysvar
    PerformUpkeep {
        /// Opaque payload from CheckUpkeep, not interpreted
        perform_data: Vec<u8>,
    },

    /// Oracle callback carrying the random words
    ///
    /// Accounts expected:
    /// 0. `[signer]` The coordinator callback authority (PDA)
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The clock sysvar
    /// 3.. `[writable]` Candidate winner accounts, must include the winner
    FulfillRandomWords {
        request_id: u64,
        random_words: Vec<u64>,
    },
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (&tag, rest) = input.split_first().ok_or(ProgramError::InvalidInstructionData)?;

        let (instruction, rest) = match tag {
            0 => {
                let (raffle_id, rest) = Self::unpack_u64(rest)?;
                let (entrance_fee, rest) = Self::unpack_u64(rest)?;
                let (interval, rest) = Self::unpack_u64(rest)?;
                let (gas_lane, rest) = Self::unpack_fixed_bytes::<32>(rest)?;
                let (subscription_id, rest) = Self::unpack_u64(rest)?;
                let (callback_gas_limit, rest) = Self::unpack_u32(rest)?;
                let instruction = Self::InitializeRaffle {
                    raffle_id,
                    entrance_fee,
                    interval: interval as i64,
                    gas_lane,
                    subscription_id,
                    callback_gas_limit,
                };
                (instruction, rest)
            }
            1 => {
                let (amount, rest) = Self::unpack_u64(rest)?;
                (Self::EnterRaffle { amount }, rest)
            }
            2 => {
                let (check_data, rest) = Self::unpack_bytes(rest)?;
                (Self::CheckUpkeep { check_data }, rest)
            }
            3 => {
                let (perform_data, rest) = Self::unpack_bytes(rest)?;
                (Self::PerformUpkeep { perform_data }, rest)
            }
            FULFILL_RANDOM_WORDS_TAG => {
                let (request_id, rest) = Self::unpack_u64(rest)?;
                let (count, mut rest) = Self::unpack_u32(rest)?;
                let mut random_words = Vec::with_capacity(count.min(64) as usize);
                for _ in 0..count {
                    let (word, next) = Self::unpack_u64(rest)?;
                    random_words.push(word);
                    rest = next;
                }
                let instruction = Self::FulfillRandomWords {
                    request_id,
                    random_words,
                };
                (instruction, rest)
            }
            _ => return Err(ProgramError::InvalidInstructionData),
        };

        if !rest.is_empty() {
            msg!("Instruction data has {} unexpected trailing bytes", rest.len());
            return Err(ProgramError::InvalidInstructionData);
        }
        Ok(instruction)
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Self::InitializeRaffle {
                raffle_id,
                entrance_fee,
                interval,
                gas_lane,
                subscription_id,
                callback_gas_limit,
            } => {
                buf.push(0);
                buf.extend_from_slice(&raffle_id.to_le_bytes());
                buf.extend_from_slice(&entrance_fee.to_le_bytes());
                buf.extend_from_slice(&interval.to_le_bytes());
                buf.extend_from_slice(gas_lane);
                buf.extend_from_slice(&subscription_id.to_le_bytes());
                buf.extend_from_slice(&callback_gas_limit.to_le_bytes());
            }
            Self::EnterRaffle { amount } => {
                buf.push(1);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::CheckUpkeep { check_data } => {
                buf.push(2);
                Self::pack_bytes(&mut buf, check_data);
            }
            Self::PerformUpkeep { perform_data } => {
                buf.push(3);
                Self::pack_bytes(&mut buf, perform_data);
            }
            Self::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                buf = fulfill_random_words_data(*request_id, random_words);
            }
        }
        buf
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<8>(input)?;
        Ok((u64::from_le_bytes(bytes), rest))
    }

    fn unpack_u32(input: &[u8]) -> Result<(u32, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<4>(input)?;
        Ok((u32::from_le_bytes(bytes), rest))
    }

    fn unpack_fixed_bytes<const N: usize>(input: &[u8]) -> Result<([u8; N], &[u8]), ProgramError> {
        if input.len() < N {
            return Err(ProgramError::InvalidInstructionData);
        }
        let (bytes, rest) = input.split_at(N);
        let bytes = bytes
            .try_into()
            .map_err(|_| ProgramError::InvalidInstructionData)?;
        Ok((bytes, rest))
    }

    fn unpack_bytes(input: &[u8]) -> Result<(Vec<u8>, &[u8]), ProgramError> {
        let (len, rest) = Self::unpack_u32(input)?;
        let len = len as usize;
        if rest.len() < len {
            return Err(ProgramError::InvalidInstructionData);
        }
        let (bytes, rest) = rest.split_at(len);
        Ok((bytes.to_vec(), rest))
    }

    fn pack_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
        buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(bytes);
    }
}

/// Create initialize_raffle instruction
#[allow(clippy::too_many_arguments)]
pub fn initialize_raffle(
    program_id: &Pubkey,
    creator: &Pubkey,
    coordinator_program: &Pubkey,
    raffle_id: u64,
    entrance_fee: u64,
    interval: i64,
    gas_lane: [u8; 32],
    subscription_id: u64,
    callback_gas_limit: u32,
) -> Result<Instruction, ProgramError> {
    let (raffle_account, _) = find_raffle_address(program_id, creator, raffle_id);
    let (coordinator, _) = find_coordinator_address(coordinator_program);
    let data = RaffleInstruction::InitializeRaffle {
        raffle_id,
        entrance_fee,
        interval,
        gas_lane,
        subscription_id,
        callback_gas_limit,
    }
    .pack();

    let accounts = vec![
        AccountMeta::new(*creator, true),
        AccountMeta::new(raffle_account, false),
        AccountMeta::new_readonly(coordinator, false),
        AccountMeta::new_readonly(*coordinator_program, false),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(clock::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create enter_raffle instruction
pub fn enter_raffle(
    program_id: &Pubkey,
    participant: &Pubkey,
    raffle_account: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::EnterRaffle { amount }.pack();

    let accounts = vec![
        AccountMeta::new(*participant, true),
        AccountMeta::new(*raffle_account, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create check_upkeep instruction
pub fn check_upkeep(
    program_id: &Pubkey,
    raffle_account: &Pubkey,
    check_data: Vec<u8>,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::CheckUpkeep { check_data }.pack();

    let accounts = vec![
        AccountMeta::new_readonly(*raffle_account, false),
        AccountMeta::new_readonly(clock::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create perform_upkeep instruction
pub fn perform_upkeep(
    program_id: &Pubkey,
    raffle_account: &Pubkey,
    coordinator_program: &Pubkey,
    perform_data: Vec<u8>,
) -> Result<Instruction, ProgramError> {
    let (coordinator, _) = find_coordinator_address(coordinator_program);
    let data = RaffleInstruction::PerformUpkeep { perform_data }.pack();

    let accounts = vec![
        AccountMeta::new(*raffle_account, false),
        AccountMeta::new(coordinator, false),
        AccountMeta::new_readonly(*coordinator_program, false),
        AccountMeta::new_readonly(clock::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create fulfill_random_words instruction, as a coordinator would send it
pub fn fulfill_random_words(
    program_id: &Pubkey,
    coordinator_authority: &Pubkey,
    raffle_account: &Pubkey,
    request_id: u64,
    random_words: Vec<u64>,
    candidates: &[Pubkey],
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::FulfillRandomWords {
        request_id,
        random_words,
    }
    .pack();

    let mut accounts = vec![
        AccountMeta::new_readonly(*coordinator_authority, true),
        AccountMeta::new(*raffle_account, false),
    ];
    accounts.extend(fulfillment_accounts(candidates));

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Accounts a coordinator must forward after the raffle account when
/// delivering randomness: the clock sysvar, then the candidate winners.
pub fn fulfillment_accounts(candidates: &[Pubkey]) -> Vec<AccountMeta> {
    let mut accounts = Vec::with_capacity(candidates.len() + 1);
    accounts.push(AccountMeta::new_readonly(clock::id(), false));
    accounts.extend(candidates.iter().map(|key| AccountMeta::new(*key, false)));
    accounts
}
