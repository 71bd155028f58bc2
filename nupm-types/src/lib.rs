#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod constraints;
pub use constraints::VersionConstraints;

mod dependency;
pub use dependency::{DependencyGroup, PackageDependency, select_dependency_group};

mod error;
pub use error::Error;

mod framework;
pub use framework::{FrameworkIdentifier, FrameworkName, FrameworkVersion};

mod id;
pub use id::{PackageId, PackageIdentity};

mod range;
pub use range::VersionRange;

mod version;
pub use version::{PrereleaseIdentifier, Version};
