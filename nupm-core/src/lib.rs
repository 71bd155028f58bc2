#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod apply;
pub use apply::Applier;

mod cancel;
pub use cancel::Cancellation;

mod context;
pub use context::{ExecutionContext, ProjectContext, UninstallationContext};

mod error;
pub use error::Error;

mod manager;
pub use manager::{PackageManager, UpdateTarget};

mod plan;
pub use plan::{Action, ActionPlan, DependencyMap, Planner};

mod project;
pub use project::{NullProjectSystem, PackagesConfigProject, ProjectSystem};

mod solution;
pub use solution::SolutionManager;
