//! Token secrets, stored credentials, and identity-server grants.

pub mod credentials;
pub mod secret;
