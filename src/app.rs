#![forbid(unsafe_code)]

use poem::{Endpoint, EndpointExt, Route};
use poem_openapi::OpenApiService;

use crate::api::greet::GreetApi;
use crate::api::root::RootApi;
use crate::api::version::VersionApi;
use crate::utils::config::Config;
use crate::utils::cors::{CorsGate, CorsPolicy};
use crate::utils::errors::Errors;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const API_VERSION: &str = env!("CARGO_PKG_VERSION");
const API_DESCRIPTION: &str = "A simple API that returns a personalized greeting, \
    either via URL query parameters or JSON payload.";

// ---------------------------------------------------------------------------
// build_app:
// ---------------------------------------------------------------------------
/** Assemble the greeting endpoints and their generated documentation, all
 * behind the CORS gate:
 *
 *   /             root greeting
 *   /greet        GET and POST greeting
 *   /version      build information
 *   /docs         Swagger UI
 *   /redoc        ReDoc
 *   /openapi.json OpenAPI document
 */
pub fn build_app(config: &Config) -> Result<impl Endpoint, Errors> {
    let policy = CorsPolicy::from_config(&config.cors)?;

    let endpoints = (RootApi, GreetApi, VersionApi);
    let mut api_service = OpenApiService::new(endpoints, config.title.clone(), API_VERSION)
        .description(API_DESCRIPTION);
    if let Some(url) = &config.server_url {
        api_service = api_service.server(url.clone());
    }

    let spec = api_service.spec_endpoint();
    let swagger = api_service.swagger_ui();
    let redoc = api_service.redoc();

    Ok(Route::new()
        .nest("/docs", swagger)
        .nest("/redoc", redoc)
        .at("/openapi.json", spec)
        .nest("/", api_service)
        .with(CorsGate::new(policy)))
}
