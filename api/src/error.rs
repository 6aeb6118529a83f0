use crate::Format;
use thiserror::Error;

/// Failures of the result/prediction engine. Every variant renders as a short sentence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid match identifier: {0}")]
    MalformedIdentifier(String),
    #[error("at least one match is required, received 0")]
    NoMatchData,
    #[error("unsupported bracket depth {depth}: only up to {supported} rounds are supported")]
    UnsupportedDepth { depth: usize, supported: usize },
    #[error("match {id} is in round {round}, outside a bracket of depth {depth}")]
    UnmappedRound { id: String, round: u32, depth: usize },
    #[error("this tournament requires {expected} teams but input was {actual}")]
    WrongTeamCount { expected: usize, actual: usize },
    #[error("match {id} names {winner} as winner, who is not playing in it")]
    InconsistentWinner { id: String, winner: String },
    #[error("prediction and results cannot be empty")]
    EmptyInput,
    #[error("invalid standing for {team}: {standing}")]
    InvalidStanding { team: String, standing: String },
    #[error("a {prediction} prediction cannot be scored against {state} results")]
    FormatMismatch { prediction: Format, state: Format },
    #[error("unknown tournament format: {0}")]
    UnknownFormat(String),
}
