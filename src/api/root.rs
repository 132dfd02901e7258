#![forbid(unsafe_code)]

use poem_openapi::{OpenApi, payload::Json};

use crate::utils::greeting::{greet, GreetingRequest, GreetingResponse, DEFAULT_NAME};

// ***************************************************************************
//                          Request/Response Definitions
// ***************************************************************************
pub struct RootApi;

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl RootApi {
    /// Default greeting
    ///
    /// Greets the world.
    #[oai(path = "/", method = "get")]
    async fn get_root(&self) -> Json<GreetingResponse> {
        Json(greet(&GreetingRequest::new(DEFAULT_NAME)))
    }
}
