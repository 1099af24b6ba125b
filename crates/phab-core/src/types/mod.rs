pub mod build;
pub mod head;

pub use build::{BranchSpec, BuildChooser, FetchMode, RemoteConfig, ScmConfig, ScmExtension};
pub use head::{
    split_base_branch, BranchHead, DifferentialHead, Head, HeadCategory, HeadInfo, Revision,
};
