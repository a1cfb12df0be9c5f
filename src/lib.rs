pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod error_recovery;
pub mod logging;
pub mod models;
pub mod player;
pub mod pool;
pub mod queue;
pub mod resolver;


pub use error::*;
pub use models::*;
