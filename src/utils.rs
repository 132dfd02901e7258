pub mod config;
pub mod cors;
pub mod errors;
pub mod greeting;
pub mod server_utils;
