mod traits;

pub use traits::{ActionExecutor, ActionOutcome};

#[cfg(test)]
pub use traits::MockActionExecutor;
