#![forbid(unsafe_code)]

use poem_openapi::Object;
use serde::Serialize;
use thiserror::Error;

/// Error enumerates the errors returned by this application.
#[derive(Error, Debug)]
pub enum Errors {
    /// Input parameter logging.
    #[error("greeting_server input parameters:\n{}", .0)]
    InputParms(String),

    /// Inaccessible or invalid logger configuration.
    #[error("Unable to initialize Log4rs using {}", .0)]
    Log4rsInitialization(String),

    #[error("Reading application configuration file: {}", .0)]
    ReadingConfigFile(String),

    #[error("Unable to parse TOML file: {}", .0)]
    TOMLParseError(String),

    #[error("Invalid configuration: {}", .0)]
    InvalidConfig(String),
}

// ***************************************************************************
//                              HttpResult
// ***************************************************************************
/// Common body for responses that carry no payload of their own.
#[derive(Object, Serialize, Debug)]
pub struct HttpResult {
    pub result_code: String,
    pub result_msg: String,
}

impl HttpResult {
    pub fn new(result_code: String, result_msg: String) -> Self {
        Self { result_code, result_msg }
    }
}
