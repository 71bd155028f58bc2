#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod cache;
pub use cache::{GatherCache, GatherKey};

mod error;
pub use error::Error;

mod gateway;
pub use gateway::SourceGateway;

mod memory;
pub use memory::InMemorySource;

mod source;
pub use source::{PackageSource, ResolvedDependencyInfo, Source};
