use thiserror::Error;

/// Fatal-tier errors (spec §7): these abort the whole command with a non-zero
/// exit code. Per-item errors (container failures, per-library git errors)
/// are *not* represented here — they are accumulated as [`crate::commands::LibraryError`]
/// values and never bubble up as a `LibrarianError`.
#[derive(Debug, Error)]
pub enum LibrarianError {
    #[error("config error: {0}")]
    Config(String),
    #[error("state error: {0}")]
    State(String),
    #[error("git error: {0}")]
    Git(String),
    #[error("github error: {0}")]
    GitHub(String),
    #[error("container error: {0}")]
    Container(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("errors encountered but no PR to create")]
    NoPrNoErrors,
    #[error("{0}")]
    Other(String),
}

impl LibrarianError {
    /// Process exit code per spec §6/§7. Validation and state errors are
    /// reported before any external call; container/git/github failures
    /// happen mid-pipeline.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Validation(_) => 2,
            Self::Git(_) => 4,
            Self::GitHub(_) => 4,
            Self::Io(_) => 5,
            Self::State(_) => 6,
            Self::Container(_) => 7,
            Self::NoPrNoErrors => 1,
            Self::Other(_) => 1,
        }
    }
}

impl From<anyhow::Error> for LibrarianError {
    fn from(e: anyhow::Error) -> Self {
        Self::Other(format!("{e:#}"))
    }
}

impl From<std::io::Error> for LibrarianError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for LibrarianError {
    fn from(e: serde_json::Error) -> Self {
        Self::State(e.to_string())
    }
}

impl From<gix::open::Error> for LibrarianError {
    fn from(e: gix::open::Error) -> Self {
        Self::Git(e.to_string())
    }
}
