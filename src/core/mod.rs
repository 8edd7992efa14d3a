pub mod completion;
pub mod config;
pub mod constants;
pub mod context;
pub mod keyring;
pub mod message;
pub mod prompt;
pub mod secrets;
pub mod session;
pub mod turn;
