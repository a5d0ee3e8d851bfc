/// Every failure a caller of the toss service can observe.
///
/// The gateway translates transport and status failures into these variants,
/// so view models only ever branch on this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No response arrived (connect failure, reset, or timeout). Retryable.
    Network { message: String, timed_out: bool },
    /// The server answered with a non-success status other than 401.
    Http { status: u16, message: Option<String> },
    /// The server answered 401; the session has already been torn down.
    Auth(Option<String>),
    /// Input rejected locally before any request was sent.
    Validation(String),
    /// Bet rejected because the wallet cannot cover the stake.
    InsufficientFunds(String),
    /// Bet rejected because the match no longer accepts bets.
    MatchClosed(String),
}

impl ClientError {
    /// The server (or validation) message when there is one, else `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Http {
                message: Some(msg), ..
            }
            | Self::Auth(Some(msg))
            | Self::Validation(msg)
            | Self::InsufficientFunds(msg)
            | Self::MatchClosed(msg) => msg.clone(),
            _ => fallback.to_string(),
        }
    }

    /// Whether re-issuing the same request could succeed without user changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network {
                timed_out: true, ..
            } => write!(f, "network error: request timed out"),
            Self::Network { message, .. } => write!(f, "network error: {message}"),
            Self::Http {
                status,
                message: Some(msg),
            } => write!(f, "http {status}: {msg}"),
            Self::Http {
                status,
                message: None,
            } => write!(f, "http {status}"),
            Self::Auth(Some(msg)) => write!(f, "unauthenticated: {msg}"),
            Self::Auth(None) => write!(f, "unauthenticated"),
            Self::Validation(msg) => write!(f, "invalid input: {msg}"),
            Self::InsufficientFunds(msg) => write!(f, "insufficient funds: {msg}"),
            Self::MatchClosed(msg) => write!(f, "match closed: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}
