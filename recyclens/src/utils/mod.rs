/// Logging utilities
pub mod logging;

pub use logging::{init_logging, try_init_logging};
