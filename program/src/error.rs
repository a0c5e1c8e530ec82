use solana_program::{decode_error::DecodeError, program_error::ProgramError};
use thiserror::Error;

/// Errors that may be returned by the Raffle program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Raffle account was already initialized
    #[error("Raffle already initialized")]
    AlreadyInitialized = 0,

    /// Entrance fee or interval out of range
    #[error("Invalid raffle configuration")]
    InvalidConfig = 1,

    /// Entry attempted while the raffle is calculating a winner
    #[error("Raffle is not open")]
    PoolNotOpen = 2,

    /// Paid amount is below the entrance fee
    #[error("Not enough lamports to enter the raffle")]
    InsufficientPayment = 3,

    /// No room left for another entry this round
    #[error("Raffle is full")]
    RaffleFull = 4,

    /// Upkeep preconditions do not hold
    #[error("Upkeep not needed")]
    UpkeepNotNeeded = 5,

    /// Callback was not signed by the coordinator authority
    #[error("Only the coordinator can fulfill randomness")]
    UnauthorizedFulfillment = 6,

    /// Request id does not match the pending request
    #[error("Unknown or stale randomness request")]
    UnknownOrStaleRequest = 7,

    /// Fulfillment carried no random words
    #[error("No random words supplied")]
    MissingRandomWords = 8,

    /// Coordinator did not hand back a request id
    #[error("Coordinator returned no request id")]
    MissingRequestId = 9,

    /// Prize could not be moved to the winner
    #[error("Payout to winner failed")]
    PayoutFailed = 10,

    /// Winner selection with an empty participant list
    #[error("Raffle has no participants")]
    NoParticipants = 11,

    /// Account is not the raffle PDA it claims to be
    #[error("Invalid raffle account")]
    InvalidRaffleAccount = 12,
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

/// Errors returned by the mock VRF coordinator.
///
/// Codes start at 100 so they never collide with [`RaffleError`] when a
/// callback failure bubbles up through the coordinator.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum VrfMockError {
    #[error("Coordinator already initialized")]
    AlreadyInitialized = 100,

    #[error("Nonexistent request")]
    NonexistentRequest = 101,

    #[error("Random words do not match the requested count")]
    InvalidRandomWords = 102,

    #[error("Too many random words requested")]
    NumWordsTooBig = 103,

    #[error("Invalid subscription")]
    InvalidSubscription = 104,

    #[error("Insufficient subscription balance")]
    InsufficientBalance = 105,

    #[error("Too many pending requests")]
    TooManyPendingRequests = 106,

    #[error("Too many subscriptions")]
    TooManySubscriptions = 107,
}

impl From<VrfMockError> for ProgramError {
    fn from(e: VrfMockError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for VrfMockError {
    fn type_of() -> &'static str {
        "VRF Mock Error"
    }
}
