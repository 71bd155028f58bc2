#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod context;
pub use context::{DependencyBehavior, ResolutionContext};

mod error;
pub use error::Error;

mod solution;
pub use solution::{InstalledPackage, Resolution, ResolutionTarget};

mod solver;
pub use solver::Resolver;
