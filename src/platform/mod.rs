//! Platform version handling and installed-executable lookup.

pub mod locator;
pub mod version;

pub use locator::{designer_binary, find_executable, rac_binary, resolve, PlatformLocator};
pub use version::{compute_weight, PlatformVersion};
