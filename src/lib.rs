pub mod cli;
pub mod crm_client;
pub mod load_config;
pub mod server;

pub use cli::{run, Cli, Commands};
