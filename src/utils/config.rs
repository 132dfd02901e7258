#![forbid(unsafe_code)]

use anyhow::{anyhow, Result};
use clap::Parser;
use log::{error, info, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;
use serde::Deserialize;
use std::{env, fs};

// Greeting Utilities
use crate::utils::cors::CorsPolicy;
use crate::utils::errors::Errors;
use crate::utils::server_utils::get_absolute_path;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const ENV_CONFIG_FILE      : &str = "GREETING_CONFIG";
const ENV_PORT             : &str = "PORT";
const DEFAULT_CONFIG_FILE  : &str = "~/.greeting/greeting.toml";
const LOG_PATTERN          : &str = "{d(%Y-%m-%dT%H:%M:%S%.3f)} {l} {t} - {m}{n}";

// Networking.
const DEFAULT_HTTP_ADDR    : &str = "0.0.0.0";
const DEFAULT_HTTP_PORT    : u16  = 8000;

// Origins allowed to read responses from browser scripts.
const DEFAULT_ALLOW_ORIGINS: [&str; 3] = [
    "http://localhost:8000",
    "http://127.0.0.1:8000",
    "https://chrwittm.github.io",
];

// ***************************************************************************
//                               Config Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// GreetingArgs:
// ---------------------------------------------------------------------------
#[derive(Debug, Default, Parser)]
#[command(name = "greeting_server", about = "Command line arguments for the Greeting Server.")]
pub struct GreetingArgs {
    /// Path of the TOML configuration file.
    ///
    /// The configuration file is located using the following priority order:
    ///
    ///   1. If set, the value of the GREETING_CONFIG environment variable,
    ///
    ///   2. Otherwise, if set, the value of this argument,
    ///
    ///   3. Otherwise, ~/.greeting/greeting.toml
    ///
    /// A missing file means all defaults are used.
    #[arg(short, long)]
    pub config_file: Option<String>,

    /// Path of a log4rs YAML configuration file.
    ///
    /// When absent, log records are written to the console at info level.
    #[arg(short, long, env = "GREETING_LOG_CONFIG")]
    pub log_config: Option<String>,

    /// Listening port, overriding both the PORT environment variable and
    /// the configuration file.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Print the effective configuration and exit.
    #[arg(long)]
    pub print_config: bool,
}

// ---------------------------------------------------------------------------
// Parms:
// ---------------------------------------------------------------------------
#[derive(Debug)]
#[allow(dead_code)]
pub struct Parms {
    pub config_file: String,
    pub config: Config,
}

// ---------------------------------------------------------------------------
// RuntimeCtx:
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct RuntimeCtx {
    pub parms: Parms,
    pub args: GreetingArgs,
}

// ---------------------------------------------------------------------------
// Config:
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub title: String,
    pub http_addr: String,
    pub http_port: u16,
    /// Server URL advertised in the OpenAPI document.
    pub server_url: Option<String>,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub cors: CorsConfig,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Greeting API".to_string(),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            server_url: None,
            tls_cert: None,
            tls_key: None,
            cors: CorsConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// CorsConfig:
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub allow_credentials: bool,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: DEFAULT_ALLOW_ORIGINS.iter().map(|s| s.to_string()).collect(),
            allow_credentials: true,
            allow_methods: vec!["*".to_string()],
            allow_headers: vec!["*".to_string()],
        }
    }
}

// ***************************************************************************
//                               Log Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_log:
// ---------------------------------------------------------------------------
/** Initialize log4rs from the given YAML file, or with a console appender
 * when no file is given.  A file that cannot be loaded is an error.
 */
pub fn init_log(log_config: Option<&str>) -> Result<()> {
    match log_config {
        Some(file) => {
            let file = get_absolute_path(file);
            if let Err(e) = log4rs::init_file(&file, Default::default()) {
                return Err(anyhow!("{}: {}", Errors::Log4rsInitialization(file), e));
            }
            info!("Log4rs initialized using: {}", file);
        }
        None => {
            let stdout = ConsoleAppender::builder()
                .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
                .build();
            let config = LogConfig::builder()
                .appender(Appender::builder().build("stdout", Box::new(stdout)))
                .build(Root::builder().appender("stdout").build(LevelFilter::Info))
                .map_err(|e| anyhow!("{}: {}", Errors::Log4rsInitialization("console".to_string()), e))?;
            log4rs::init_config(config)
                .map_err(|e| anyhow!("{}: {}", Errors::Log4rsInitialization("console".to_string()), e))?;
            info!("Log4rs initialized using the console appender.");
        }
    }
    Ok(())
}

/// ***************************************************************************
//                             Parms Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_config_file:
// ---------------------------------------------------------------------------
fn get_config_file(args: &GreetingArgs) -> String {
    // Order of precedence:
    //  1. Environment variable
    //  2. Command line --config-file argument
    //  3. Default location
    //
    let file = env::var(ENV_CONFIG_FILE).unwrap_or_else(|_| {
        match args.config_file.clone() {
            Some(f) => f,
            None => DEFAULT_CONFIG_FILE.to_string(),
        }
    });

    get_absolute_path(&file)
}

// ---------------------------------------------------------------------------
// get_parms:
// ---------------------------------------------------------------------------
/** Retrieve the application parameters from the configuration file, then
 * apply the port overrides.  A configuration file that doesn't exist means
 * defaults; one that exists but can't be parsed or validated is an error.
 */
fn get_parms(args: &GreetingArgs) -> Result<Parms> {
    let config_file = get_config_file(args);

    info!("{}", Errors::ReadingConfigFile(config_file.clone()));
    let mut parms = match fs::read_to_string(&config_file) {
        Ok(contents) => Parms { config: parse_config(&contents, &config_file)?, config_file },
        Err(_) => {
            info!("Unable to read configuration at {}. Using default values.", config_file);
            Parms { config_file: Default::default(), config: Config::new() }
        }
    };

    // The hosting platform's PORT yields to an explicit --port.
    if let Some(port) = env::var(ENV_PORT).ok().and_then(|p| p.parse::<u16>().ok()) {
        parms.config.http_port = port;
    }
    if let Some(port) = args.port {
        parms.config.http_port = port;
    }

    validate_config(&parms.config)?;
    Ok(parms)
}

// ---------------------------------------------------------------------------
// parse_config:
// ---------------------------------------------------------------------------
pub fn parse_config(contents: &str, config_file: &str) -> Result<Config> {
    match toml::from_str(contents) {
        Ok(c) => Ok(c),
        Err(e) => {
            let msg = format!("{}\n   {}", Errors::TOMLParseError(config_file.to_string()), e);
            error!("{}", msg);
            Err(anyhow!(msg))
        }
    }
}

// ---------------------------------------------------------------------------
// validate_config:
// ---------------------------------------------------------------------------
pub fn validate_config(config: &Config) -> Result<()> {
    if config.tls_cert.is_some() != config.tls_key.is_some() {
        return Err(Errors::InvalidConfig(
            "tls_cert and tls_key must be specified together".to_string()).into());
    }
    CorsPolicy::from_config(&config.cors)?;
    Ok(())
}

// ***************************************************************************
//                             Config Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_runtime_context:
// ---------------------------------------------------------------------------
pub fn init_runtime_context(args: GreetingArgs) -> Result<RuntimeCtx> {
    let parms = get_parms(&args)?;
    Ok(RuntimeCtx { parms, args })
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("", "greeting.toml").unwrap();
        assert_eq!(config.title, "Greeting API");
        assert_eq!(config.http_addr, DEFAULT_HTTP_ADDR);
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.cors.allow_origins.len(), 3);
        assert!(config.cors.allow_credentials);
        assert_eq!(config.cors.allow_methods, vec!["*"]);
    }

    #[test]
    fn partial_file_overrides_fields() {
        let toml = r#"
            http_port = 9000
            server_url = "https://greet.example.com"

            [cors]
            allow_origins = ["https://app.example.com"]
            allow_credentials = false
        "#;
        let config = parse_config(toml, "greeting.toml").unwrap();
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.http_addr, DEFAULT_HTTP_ADDR);
        assert_eq!(config.server_url.as_deref(), Some("https://greet.example.com"));
        assert_eq!(config.cors.allow_origins, vec!["https://app.example.com"]);
        assert!(!config.cors.allow_credentials);
        assert_eq!(config.cors.allow_headers, vec!["*"]);
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(parse_config("http_port = \"eighty\"", "greeting.toml").is_err());
        assert!(parse_config("http_prot = 80", "greeting.toml").is_err());
    }

    #[test]
    fn tls_files_come_in_pairs() {
        let config = Config { tls_cert: Some("cert.pem".to_string()), ..Config::new() };
        assert!(validate_config(&config).is_err());

        let config = Config { tls_key: Some("key.pem".to_string()), ..config };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn invalid_origin_fails_validation() {
        let mut config = Config::new();
        config.cors.allow_origins.push("not an origin".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn print_config() {
        println!("{:?}", Config::new());
    }
}
