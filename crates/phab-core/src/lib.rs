pub mod build;
pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod filter;
pub mod observer;
pub mod source;

pub mod types;

pub use crate::config::{load_source_config, SourceConfig};
pub use crate::context::{DiscoveryContext, DiscoveryTrait, SourceRequest};
pub use crate::error::{HeadError, SourceError};
pub use crate::filter::ViewFilter;
pub use crate::observer::{CollectObserver, Criteria, HeadObserver, Interrupt, Probe};
pub use crate::source::PhabricatorSource;
