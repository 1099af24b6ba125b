use phab_conduit::ConduitError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeadError {
    #[error("base branch {name:?} has no remote separator")]
    MissingRemoteSeparator { name: String },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Conduit(#[from] ConduitError),
    #[error(transparent)]
    Head(#[from] HeadError),
    #[error("repository not found: {phid}")]
    RepositoryNotFound { phid: String },
    #[error("unsupported head: {name}")]
    UnsupportedHead { name: String },
    #[error("{kind} candidates already set")]
    CandidatesAlreadySet { kind: &'static str },
    #[error("interrupted")]
    Interrupted,
    #[error("invalid config: {message}")]
    Config { message: String },
}
