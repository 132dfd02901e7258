#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use poem::listener::{Listener, RustlsCertificate, RustlsConfig, TcpListener};
use poem::Endpoint;

// Greeting Utilities
use crate::utils::config::{init_log, init_runtime_context, GreetingArgs, RuntimeCtx};
use crate::utils::errors::Errors;
use crate::utils::server_utils::get_absolute_path;

// Modules
mod api;
mod app;
mod utils;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const SERVER_NAME : &str = "GreetingServer"; // for poem logging

// ---------------------------------------------------------------------------
// main:
// ---------------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<()> {
    // --------------- Initialize Server --------------
    // Announce ourselves.
    println!("Starting greeting_server!");

    let ctx = greeting_init(GreetingArgs::parse())?;
    if ctx.args.print_config {
        println!("{:#?}", ctx.parms);
        return Ok(());
    }

    // --------------- Main Loop Set Up ---------------
    let config = &ctx.parms.config;
    let app = app::build_app(config)?;
    let addr = format!("{}:{}", config.http_addr, config.http_port);

    // ------------------ Main Loop -------------------
    let result = match (&config.tls_cert, &config.tls_key) {
        (Some(cert), Some(key)) => {
            info!("Listening on https://{}", addr);
            let listener = TcpListener::bind(addr).rustls(
                RustlsConfig::new().fallback(
                    RustlsCertificate::new()
                        .key(std::fs::read(get_absolute_path(key))?)
                        .cert(std::fs::read(get_absolute_path(cert))?),
                ),
            );
            run_server(listener, app).await
        }
        _ => {
            info!("Listening on http://{}", addr);
            run_server(TcpListener::bind(addr), app).await
        }
    };

    if let Err(e) = &result {
        error!("Server terminated: {}", e);
    }
    result?;
    Ok(())
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// greeting_init:
// ---------------------------------------------------------------------------
/** Initialize logging and read the configuration.  Any failure here aborts
 * startup before a port is bound.
 */
fn greeting_init(args: GreetingArgs) -> Result<RuntimeCtx> {
    // Configure our log.
    init_log(args.log_config.as_deref())?;

    // Read and validate input parameters.
    let ctx = match init_runtime_context(args) {
        Ok(c) => c,
        Err(e) => {
            error!("FAILED to initialize runtime context: {}", e);
            return Err(e);
        }
    };
    info!("{}", Errors::InputParms(format!("{:#?}", ctx)));

    // Log build info.
    print_version_info();
    Ok(ctx)
}

// ---------------------------------------------------------------------------
// run_server:
// ---------------------------------------------------------------------------
async fn run_server<L, E>(listener: L, app: E) -> std::io::Result<()>
where
    L: Listener + 'static,
    E: Endpoint + 'static,
{
    poem::Server::new(listener)
        .name(SERVER_NAME)
        .run(app)
        .await
}

// ---------------------------------------------------------------------------
// print_version_info:
// ---------------------------------------------------------------------------
fn print_version_info() {
    info!("\n*** Running GREETING={}, BRANCH={}, COMMIT={}, DIRTY={}, SRC_TS={}, RUSTC={}.",
          option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
          env!("GIT_BRANCH"),
          env!("GIT_COMMIT_SHORT"),
          env!("GIT_DIRTY"),
          env!("SOURCE_TIMESTAMP"),
          env!("RUSTC_VERSION"));
}
