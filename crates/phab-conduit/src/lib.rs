pub mod diffusion;
pub mod staging;
pub mod transport;
pub mod types;

pub use crate::diffusion::DiffusionClient;
pub use crate::transport::{ConduitError, ConduitTransport};
pub use crate::types::{Branch, Repository, RepositoryUri, StagedDiff, VcsKind};
