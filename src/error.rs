use thiserror::Error;

/// Failures a giveaway command can report back to whoever issued it.
///
/// The `Display` text is what the bot replies with, so it is phrased for
/// the member and never carries internal detail.
#[derive(Error, Debug)]
pub enum GiveawayError {
    #[error("Invalid duration `{0}`. Use a number followed by m, h or d (e.g. `30m`, `2h`, `1d`).")]
    InvalidDuration(String),

    #[error("The number of winners must be a positive integer.")]
    InvalidWinnerCount,

    #[error("Please provide a prize.")]
    MissingPrize,

    #[error("Role `{0}` does not exist.")]
    UnknownRole(String),

    #[error("Sorry, only an administrator can do that.")]
    AdminOnly,

    #[error("A giveaway is already running here! Wait for it to finish.")]
    AlreadyRunning,

    #[error("There is no giveaway running here.")]
    NoActiveGiveaway,

    #[error("The draw is already in progress.")]
    DrawInProgress,

    #[error("That message is not a finished giveaway.")]
    HistoryNotFound,

    #[error("No eligible participants left to draw from.")]
    NoEligibleParticipants,

    #[error("This giveaway requires the `{0}` role.")]
    RoleRequired(String),

    #[error("Could not reach the chat: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type GiveawayResult<T> = Result<T, GiveawayError>;

impl GiveawayError {
    /// Validation, authorization and conflict errors leave state untouched and
    /// are expected in normal use; the rest are worth a louder log line.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, GiveawayError::Transport(_) | GiveawayError::Storage(_))
    }
}

impl From<anyhow::Error> for GiveawayError {
    fn from(err: anyhow::Error) -> Self {
        GiveawayError::Storage(format!("{err:#}"))
    }
}
