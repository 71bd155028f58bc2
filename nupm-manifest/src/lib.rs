#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod config;
pub use config::PackagesConfig;

mod error;
pub use error::Error;

mod reference;
pub use reference::PackageReference;
