pub mod account;
pub mod state;
pub mod workflow;

pub use account::*;
pub use state::*;
pub use workflow::*;
