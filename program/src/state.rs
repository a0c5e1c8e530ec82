// VRF Raffle Program - State
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo,
    clock::UnixTimestamp,
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    program_pack::IsInitialized,
    pubkey::Pubkey,
};

use crate::constants::{MAX_PARTICIPANTS, NUM_WORDS, REQUEST_CONFIRMATIONS};
use crate::error::RaffleError;
use crate::oracle::{RandomWordsRequest, RandomnessOracle};
use crate::utils::winner_index;

/// Lifecycle of a raffle round
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Accepting entries
    Open,
    /// Entries frozen, waiting for the oracle to answer
    Calculating,
}

impl Default for RaffleState {
    fn default() -> Self {
        RaffleState::Open
    }
}

/// Parameters fixed when a raffle is created
#[derive(Clone, Debug, PartialEq)]
pub struct RaffleConfig {
    /// Lamports required per entry
    pub entrance_fee: u64,
    /// Seconds a round stays open at least
    pub interval: i64,
    pub gas_lane: [u8; 32],
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
    /// Program id of the VRF coordinator
    pub coordinator_program: Pubkey,
    /// Coordinator state account requests are sent to
    pub coordinator: Pubkey,
}

/// Raffle pool account data
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct Raffle {
    /// Is the raffle initialized
    pub is_initialized: bool,
    /// Bump of the raffle PDA
    pub bump: u8,
    /// Creator-chosen id, part of the PDA seeds
    pub raffle_id: u64,
    /// Creator of the raffle (no special rights once created)
    pub authority: Pubkey,
    pub coordinator_program: Pubkey,
    pub coordinator: Pubkey,
    pub gas_lane: [u8; 32],
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
    /// Lamports required per entry
    pub entrance_fee: u64,
    /// Minimum seconds between round start and upkeep
    pub interval: i64,
    /// Start of the current round
    pub last_timestamp: UnixTimestamp,
    pub state: RaffleState,
    /// Lamports collected this round
    pub balance: u64,
    /// Winner of the last completed round
    pub recent_winner: Option<Pubkey>,
    /// Outstanding randomness request, if any
    pub pending_request: Option<u64>,
    /// One entry per paid fee, duplicates allowed
    pub participants: Vec<Pubkey>,
}

impl IsInitialized for Raffle {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Raffle {
    /// Space to allocate for a raffle account holding a full round
    pub const LEN: usize = 1 + 1 + 8 + 32 + 32 + 32 + 32 + 8 + 4 + 8 + 8 + 8 + 1 + 8
        + (1 + 32)
        + (1 + 8)
        + (4 + 32 * MAX_PARTICIPANTS);

    /// Create a new open raffle
    pub fn new(
        bump: u8,
        raffle_id: u64,
        authority: Pubkey,
        config: RaffleConfig,
        now: UnixTimestamp,
    ) -> Result<Self, RaffleError> {
        if config.entrance_fee == 0 {
            msg!("Entrance fee must be greater than zero");
            return Err(RaffleError::InvalidConfig);
        }
        if config.interval <= 0 {
            msg!("Interval must be greater than zero");
            return Err(RaffleError::InvalidConfig);
        }

        Ok(Self {
            is_initialized: true,
            bump,
            raffle_id,
            authority,
            coordinator_program: config.coordinator_program,
            coordinator: config.coordinator,
            gas_lane: config.gas_lane,
            subscription_id: config.subscription_id,
            callback_gas_limit: config.callback_gas_limit,
            entrance_fee: config.entrance_fee,
            interval: config.interval,
            last_timestamp: now,
            state: RaffleState::Open,
            balance: 0,
            recent_winner: None,
            pending_request: None,
            participants: Vec::new(),
        })
    }

    /// Decode raffle data. Trailing bytes left over from a larger round are ignored.
    pub fn load(data: &[u8]) -> Result<Self, ProgramError> {
        let raffle = Self::deserialize(&mut &data[..])
            .map_err(|_| ProgramError::InvalidAccountData)?;
        if !raffle.is_initialized() {
            return Err(ProgramError::UninitializedAccount);
        }
        Ok(raffle)
    }

    pub fn save(&self, account: &AccountInfo) -> ProgramResult {
        self.serialize(&mut &mut account.data.borrow_mut()[..])
            .map_err(|err| ProgramError::BorshIoError(err.to_string()))
    }

    pub fn entrance_fee(&self) -> u64 {
        self.entrance_fee
    }

    pub fn interval(&self) -> i64 {
        self.interval
    }

    pub fn state(&self) -> RaffleState {
        self.state
    }

    pub fn participant(&self, index: usize) -> Option<&Pubkey> {
        self.participants.get(index)
    }

    pub fn number_of_participants(&self) -> usize {
        self.participants.len()
    }

    pub fn recent_winner(&self) -> Option<Pubkey> {
        self.recent_winner
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn last_timestamp(&self) -> UnixTimestamp {
        self.last_timestamp
    }

    pub fn pending_request(&self) -> Option<u64> {
        self.pending_request
    }

    pub fn request_confirmations(&self) -> u16 {
        REQUEST_CONFIRMATIONS
    }

    pub fn num_words(&self) -> u32 {
        NUM_WORDS
    }

    /// Join the current round with `amount` lamports
    pub fn enter(&mut self, participant: Pubkey, amount: u64) -> Result<(), RaffleError> {
        if self.state != RaffleState::Open {
            msg!("Raffle is calculating a winner, entries are closed");
            return Err(RaffleError::PoolNotOpen);
        }
        if amount < self.entrance_fee {
            msg!("Paid {} lamports, entrance fee is {}", amount, self.entrance_fee);
            return Err(RaffleError::InsufficientPayment);
        }
        if self.participants.len() >= MAX_PARTICIPANTS {
            msg!("Raffle already holds {} entries", MAX_PARTICIPANTS);
            return Err(RaffleError::RaffleFull);
        }

        let balance = self
            .balance
            .checked_add(amount)
            .ok_or(RaffleError::InsufficientPayment)?;

        self.participants.push(participant);
        self.balance = balance;
        Ok(())
    }

    /// True once the round may close: open, interval elapsed, funded and non-empty.
    pub fn check_upkeep(&self, now: UnixTimestamp) -> bool {
        let is_open = self.state == RaffleState::Open;
        let time_passed = now.saturating_sub(self.last_timestamp) >= self.interval;
        let has_balance = self.balance > 0;
        let has_players = !self.participants.is_empty();
        is_open && time_passed && has_balance && has_players
    }

    pub fn random_words_request(&self) -> RandomWordsRequest {
        RandomWordsRequest {
            key_hash: self.gas_lane,
            subscription_id: self.subscription_id,
            request_confirmations: REQUEST_CONFIRMATIONS,
            callback_gas_limit: self.callback_gas_limit,
            num_words: NUM_WORDS,
        }
    }

    /// Close the round and ask the oracle for randomness.
    ///
    /// Nothing changes unless the oracle accepts the request.
    pub fn perform_upkeep<O>(&mut self, now: UnixTimestamp, oracle: &mut O) -> Result<u64, ProgramError>
    where
        O: RandomnessOracle + ?Sized,
    {
        if !self.check_upkeep(now) {
            msg!(
                "Upkeep not needed: balance={}, participants={}, state={:?}",
                self.balance,
                self.participants.len(),
                self.state
            );
            return Err(RaffleError::UpkeepNotNeeded.into());
        }

        let request_id = oracle.request_random_words(&self.random_words_request())?;

        self.state = RaffleState::Calculating;
        self.pending_request = Some(request_id);
        Ok(request_id)
    }

    /// Settle the round with the oracle's answer.
    ///
    /// `payout` moves the prize to the winner. If it fails the round is left
    /// calculating with the request still pending; there is no retry and no
    /// fallback winner.
    pub fn fulfill_random_words<F>(
        &mut self,
        request_id: u64,
        random_words: &[u64],
        now: UnixTimestamp,
        payout: F,
    ) -> Result<(Pubkey, u64), ProgramError>
    where
        F: FnOnce(&Pubkey, u64) -> ProgramResult,
    {
        if self.pending_request != Some(request_id) {
            msg!(
                "Request {} does not match pending request {:?}",
                request_id,
                self.pending_request
            );
            return Err(RaffleError::UnknownOrStaleRequest.into());
        }

        let random_word = *random_words.first().ok_or(RaffleError::MissingRandomWords)?;
        let index = winner_index(random_word, self.participants.len())
            .ok_or(RaffleError::NoParticipants)?;
        let winner = self.participants[index];
        let prize = self.balance;

        if let Err(err) = payout(&winner, prize) {
            msg!("Payout of {} lamports to {} failed: {}", prize, winner, err);
            return Err(RaffleError::PayoutFailed.into());
        }

        self.recent_winner = Some(winner);
        self.participants.clear();
        self.balance = 0;
        self.last_timestamp = now;
        self.pending_request = None;
        self.state = RaffleState::Open;
        Ok((winner, prize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEE: u64 = 100_000_000;
    const INTERVAL: i64 = 30;
    const START: UnixTimestamp = 1_700_000_000;

    #[derive(Default)]
    struct TestOracle {
        next_id: u64,
        requests: Vec<RandomWordsRequest>,
        reject: bool,
    }

    impl RandomnessOracle for TestOracle {
        fn request_random_words(&mut self, request: &RandomWordsRequest) -> Result<u64, ProgramError> {
            if self.reject {
                return Err(ProgramError::Custom(999));
            }
            self.next_id += 1;
            self.requests.push(request.clone());
            Ok(self.next_id)
        }
    }

    fn config() -> RaffleConfig {
        RaffleConfig {
            entrance_fee: FEE,
            interval: INTERVAL,
            gas_lane: [7u8; 32],
            subscription_id: 1,
            callback_gas_limit: 500_000,
            coordinator_program: Pubkey::new_unique(),
            coordinator: Pubkey::new_unique(),
        }
    }

    fn raffle() -> Raffle {
        Raffle::new(255, 1, Pubkey::new_unique(), config(), START).unwrap()
    }

    fn raffle_with_players(count: usize) -> (Raffle, Vec<Pubkey>) {
        let mut raffle = raffle();
        let players: Vec<Pubkey> = (0..count).map(|_| Pubkey::new_unique()).collect();
        for player in &players {
            raffle.enter(*player, FEE).unwrap();
        }
        (raffle, players)
    }

    fn calculating_raffle(count: usize) -> (Raffle, Vec<Pubkey>, u64) {
        let (mut raffle, players) = raffle_with_players(count);
        let mut oracle = TestOracle::default();
        let request_id = raffle.perform_upkeep(START + INTERVAL + 1, &mut oracle).unwrap();
        (raffle, players, request_id)
    }

    #[test]
    fn new_raffle_starts_open_and_empty() {
        let raffle = raffle();
        assert_eq!(raffle.state(), RaffleState::Open);
        assert_eq!(raffle.entrance_fee(), FEE);
        assert_eq!(raffle.interval(), INTERVAL);
        assert_eq!(raffle.last_timestamp(), START);
        assert_eq!(raffle.balance(), 0);
        assert_eq!(raffle.number_of_participants(), 0);
        assert_eq!(raffle.recent_winner(), None);
        assert_eq!(raffle.pending_request(), None);
        assert_eq!(raffle.request_confirmations(), 3);
        assert_eq!(raffle.num_words(), 1);
    }

    #[test]
    fn new_rejects_zero_fee_and_interval() {
        let mut bad_fee = config();
        bad_fee.entrance_fee = 0;
        assert_eq!(
            Raffle::new(255, 1, Pubkey::new_unique(), bad_fee, START).unwrap_err(),
            RaffleError::InvalidConfig
        );

        let mut bad_interval = config();
        bad_interval.interval = 0;
        assert_eq!(
            Raffle::new(255, 1, Pubkey::new_unique(), bad_interval, START).unwrap_err(),
            RaffleError::InvalidConfig
        );
    }

    #[test]
    fn enter_records_participant_and_balance() {
        let mut raffle = raffle();
        let player = Pubkey::new_unique();

        raffle.enter(player, FEE).unwrap();
        raffle.enter(player, FEE * 2).unwrap();

        assert_eq!(raffle.number_of_participants(), 2);
        assert_eq!(raffle.participant(0), Some(&player));
        assert_eq!(raffle.participant(1), Some(&player));
        assert_eq!(raffle.participant(2), None);
        assert_eq!(raffle.balance(), FEE * 3);
    }

    #[test]
    fn enter_below_fee_changes_nothing() {
        let (mut raffle, _) = raffle_with_players(1);
        let before = raffle.clone();

        let err = raffle.enter(Pubkey::new_unique(), FEE - 1).unwrap_err();

        assert_eq!(err, RaffleError::InsufficientPayment);
        assert_eq!(raffle, before);
    }

    #[test]
    fn enter_rejected_when_full() {
        let (mut raffle, _) = raffle_with_players(MAX_PARTICIPANTS);
        let err = raffle.enter(Pubkey::new_unique(), FEE).unwrap_err();
        assert_eq!(err, RaffleError::RaffleFull);
        assert_eq!(raffle.number_of_participants(), MAX_PARTICIPANTS);
    }

    #[test]
    fn check_upkeep_false_without_players() {
        let raffle = raffle();
        assert!(!raffle.check_upkeep(START + INTERVAL + 1));
        assert!(!raffle.check_upkeep(START + INTERVAL * 1_000));
    }

    #[test]
    fn check_upkeep_false_before_interval() {
        let (raffle, _) = raffle_with_players(2);
        assert!(!raffle.check_upkeep(START));
        assert!(!raffle.check_upkeep(START + INTERVAL - 5));
        assert!(raffle.check_upkeep(START + INTERVAL));
    }

    #[test]
    fn check_upkeep_true_when_open_funded_and_due() {
        let (raffle, _) = raffle_with_players(1);
        assert!(raffle.check_upkeep(START + INTERVAL + 1));
    }

    #[test]
    fn check_upkeep_false_while_calculating() {
        let (raffle, _, _) = calculating_raffle(1);
        assert!(!raffle.check_upkeep(START + INTERVAL * 10));
    }

    #[test]
    fn perform_upkeep_rejected_when_not_needed() {
        let (mut raffle, _) = raffle_with_players(1);
        let mut oracle = TestOracle::default();
        let before = raffle.clone();

        let err = raffle.perform_upkeep(START + 1, &mut oracle).unwrap_err();

        assert_eq!(err, RaffleError::UpkeepNotNeeded.into());
        assert_eq!(raffle, before);
        assert!(oracle.requests.is_empty());
    }

    #[test]
    fn perform_upkeep_issues_single_request() {
        let (mut raffle, _) = raffle_with_players(2);
        let mut oracle = TestOracle::default();

        let request_id = raffle.perform_upkeep(START + INTERVAL + 1, &mut oracle).unwrap();

        assert_eq!(request_id, 1);
        assert_eq!(raffle.state(), RaffleState::Calculating);
        assert_eq!(raffle.pending_request(), Some(1));
        assert_eq!(oracle.requests.len(), 1);
        let request = &oracle.requests[0];
        assert_eq!(request.key_hash, [7u8; 32]);
        assert_eq!(request.subscription_id, 1);
        assert_eq!(request.request_confirmations, REQUEST_CONFIRMATIONS);
        assert_eq!(request.callback_gas_limit, 500_000);
        assert_eq!(request.num_words, NUM_WORDS);

        let err = raffle.perform_upkeep(START + INTERVAL * 2, &mut oracle).unwrap_err();
        assert_eq!(err, RaffleError::UpkeepNotNeeded.into());
        assert_eq!(oracle.requests.len(), 1);
    }

    #[test]
    fn entries_closed_while_calculating() {
        let (mut raffle, _, _) = calculating_raffle(1);
        let err = raffle.enter(Pubkey::new_unique(), FEE).unwrap_err();
        assert_eq!(err, RaffleError::PoolNotOpen);
        assert_eq!(raffle.number_of_participants(), 1);
    }

    #[test]
    fn oracle_failure_keeps_round_open() {
        let (mut raffle, _) = raffle_with_players(1);
        let mut oracle = TestOracle {
            reject: true,
            ..TestOracle::default()
        };
        let before = raffle.clone();

        let err = raffle.perform_upkeep(START + INTERVAL + 1, &mut oracle).unwrap_err();

        assert_eq!(err, ProgramError::Custom(999));
        assert_eq!(raffle, before);
    }

    #[test]
    fn fulfill_with_wrong_request_changes_nothing() {
        let (mut raffle, _, request_id) = calculating_raffle(3);
        let before = raffle.clone();

        let err = raffle
            .fulfill_random_words(request_id + 1, &[7], START + 100, |_, _| {
                panic!("payout must not run for a stale request")
            })
            .unwrap_err();

        assert_eq!(err, RaffleError::UnknownOrStaleRequest.into());
        assert_eq!(raffle, before);
    }

    #[test]
    fn fulfill_without_pending_request_is_rejected() {
        let (mut raffle, _) = raffle_with_players(2);
        let before = raffle.clone();

        let err = raffle
            .fulfill_random_words(1, &[7], START + 100, |_, _| Ok(()))
            .unwrap_err();

        assert_eq!(err, RaffleError::UnknownOrStaleRequest.into());
        assert_eq!(raffle, before);
    }

    #[test]
    fn fulfill_picks_winner_by_modulo_and_resets() {
        let (mut raffle, players, request_id) = calculating_raffle(3);
        let mut paid = None;

        let (winner, prize) = raffle
            .fulfill_random_words(request_id, &[7], START + 100, |winner, amount| {
                paid = Some((*winner, amount));
                Ok(())
            })
            .unwrap();

        assert_eq!(winner, players[1]);
        assert_eq!(prize, FEE * 3);
        assert_eq!(paid, Some((players[1], FEE * 3)));
        assert_eq!(raffle.recent_winner(), Some(players[1]));
        assert_eq!(raffle.balance(), 0);
        assert_eq!(raffle.number_of_participants(), 0);
        assert_eq!(raffle.state(), RaffleState::Open);
        assert_eq!(raffle.pending_request(), None);
        assert_eq!(raffle.last_timestamp(), START + 100);
    }

    #[test]
    fn duplicate_fulfillment_is_rejected() {
        let (mut raffle, _, request_id) = calculating_raffle(2);
        raffle
            .fulfill_random_words(request_id, &[4], START + 100, |_, _| Ok(()))
            .unwrap();
        let after_first = raffle.clone();

        let err = raffle
            .fulfill_random_words(request_id, &[5], START + 200, |_, _| Ok(()))
            .unwrap_err();

        assert_eq!(err, RaffleError::UnknownOrStaleRequest.into());
        assert_eq!(raffle, after_first);
    }

    #[test]
    fn failed_payout_leaves_round_calculating() {
        let (mut raffle, _, request_id) = calculating_raffle(3);
        let before = raffle.clone();

        let err = raffle
            .fulfill_random_words(request_id, &[7], START + 100, |_, _| {
                Err(ProgramError::InsufficientFunds)
            })
            .unwrap_err();

        assert_eq!(err, RaffleError::PayoutFailed.into());
        assert_eq!(raffle, before);
        assert_eq!(raffle.state(), RaffleState::Calculating);
        assert_eq!(raffle.pending_request(), Some(request_id));
    }

    #[test]
    fn fulfill_without_words_is_rejected() {
        let (mut raffle, _, request_id) = calculating_raffle(1);
        let err = raffle
            .fulfill_random_words(request_id, &[], START + 100, |_, _| Ok(()))
            .unwrap_err();
        assert_eq!(err, RaffleError::MissingRandomWords.into());
        assert_eq!(raffle.state(), RaffleState::Calculating);
    }

    #[test]
    fn rounds_repeat_with_fresh_requests() {
        let mut raffle = raffle();
        let mut oracle = TestOracle::default();
        let mut now = START;

        for round in 1..=3u64 {
            let player = Pubkey::new_unique();
            raffle.enter(player, FEE).unwrap();
            now += INTERVAL;
            let request_id = raffle.perform_upkeep(now, &mut oracle).unwrap();
            assert_eq!(request_id, round);

            let (winner, prize) = raffle
                .fulfill_random_words(request_id, &[round * 13], now, |_, _| Ok(()))
                .unwrap();
            assert_eq!(winner, player);
            assert_eq!(prize, FEE);
            assert!(!raffle.check_upkeep(now + INTERVAL));
        }
    }

    #[test]
    fn state_survives_encoding_with_trailing_space() {
        let (raffle, _, _) = calculating_raffle(3);
        let mut data = vec![0u8; Raffle::LEN];
        let encoded = raffle.try_to_vec().unwrap();
        assert!(encoded.len() <= Raffle::LEN);
        data[..encoded.len()].copy_from_slice(&encoded);

        assert_eq!(Raffle::load(&data).unwrap(), raffle);
    }

    #[test]
    fn full_raffle_fits_allocation() {
        let (raffle, _) = raffle_with_players(MAX_PARTICIPANTS);
        let mut raffle = raffle;
        raffle.recent_winner = Some(Pubkey::new_unique());
        raffle.pending_request = Some(u64::MAX);
        assert_eq!(raffle.try_to_vec().unwrap().len(), Raffle::LEN);
    }

    #[test]
    fn load_rejects_uninitialized_data() {
        let data = vec![0u8; Raffle::LEN];
        assert_eq!(Raffle::load(&data).unwrap_err(), ProgramError::UninitializedAccount);
    }
}
