//! Account construction: inputs, fingerprints and the factory

pub mod factory;
pub mod fingerprint;
pub mod inputs;

pub use factory::{build_accounts, AccountInputs};
pub use fingerprint::{build_cookie, new_trace_context, CookieStyle};
pub use inputs::{read_lines, read_optional_lines, read_secondary_secrets};
