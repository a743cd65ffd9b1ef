pub mod auth;
pub mod keypair;

pub use auth::{build_login_request, login_message, LoginRequest};
pub use keypair::{Keypair, SECRET_KEY_LEN};
