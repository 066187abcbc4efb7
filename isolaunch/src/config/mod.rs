//! Boot configuration, runtime home resolution and published properties.

mod boot;
pub mod expansion;
mod home;
pub mod properties;
mod properties_file;

pub use boot::{BootConfig, DEFAULT_APP_ROOT_ENV, DEFAULT_RUNTIME_DIR, SOLUTION_ROOT_ENV};
pub use expansion::SystemPackageExpander;
pub use home::{resolve_runtime_home, HomeSource, RuntimeHome, RuntimeLayout};
pub use properties::{keys, SystemProperties};
pub use properties_file::PropertiesFile;
