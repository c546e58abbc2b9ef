//! Service-wide error taxonomy.
//!
//! User-facing handlers map these to generic HTTP bodies; full detail is
//! logged server-side only. Diagnostic surfaces are the one place a caught
//! error message is intentionally surfaced to the (operator) caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No validated user identity on the request.
    #[error("user not authenticated")]
    Unauthenticated,

    /// The authenticated identity clashes with an existing local user row
    /// (the email already belongs to a different id).
    #[error("user identity conflicts with an existing account")]
    IdentityConflict,

    /// The odds provider was unreachable or returned an error.
    #[error("odds gateway failure: {0}")]
    Gateway(String),

    /// A daily pick already exists for this cycle slot. Recovered by the
    /// generation job as a benign no-op (another run won the race).
    #[error("daily pick already exists for this cycle slot")]
    DuplicateCycle,

    /// The analysis collaborator could not produce a candidate parlay.
    #[error("parlay analysis failed: {0}")]
    Analysis(String),

    /// Persistence-layer failure.
    #[error("database error: {0}")]
    Store(#[from] sqlx::Error),

    /// A required secret/environment value is absent.
    #[error("missing required configuration: {0}")]
    ConfigMissing(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
