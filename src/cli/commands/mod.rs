//! CLI command implementations

pub mod config;
pub mod key;
pub mod login;

pub use config::execute as config;
pub use key::execute as key;
pub use login::execute as login;
