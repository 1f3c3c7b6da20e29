//! Credential handling for external capabilities.

mod secret;

pub use secret::SecretString;
