#![forbid(unsafe_code)]

use log::info;
use poem::Request;
use poem_openapi::{param::Query, payload::Json, ApiResponse, OpenApi};
use serde_json::Value;

use crate::utils::greeting::{greet, GreetingRequest, GreetingResponse, MalformedInput,
                             MalformedInputResult};
use crate::utils::server_utils::debug_request;

// ***************************************************************************
//                          Request/Response Definitions
// ***************************************************************************
pub struct GreetApi;

// ------------------- HTTP Status Codes -------------------
#[derive(Debug, ApiResponse)]
#[oai(bad_request_handler = "malformed_body_handler")]
enum GreetPostResponse {
    /// The greeting.
    #[oai(status = 200)]
    Http200(Json<GreetingResponse>),
    /// The body is not a JSON object with a string `name` field.
    #[oai(status = 422)]
    Http422(Json<MalformedInputResult>),
}

fn make_http_200(resp: GreetingResponse) -> GreetPostResponse {
    GreetPostResponse::Http200(Json(resp))
}
fn make_http_422(err: &MalformedInput) -> GreetPostResponse {
    info!("Rejected greeting body: {}", err);
    GreetPostResponse::Http422(Json(MalformedInputResult::from(err)))
}

// Payload errors raised while the framework reads the body (bad syntax,
// wrong content type) are reported like any other malformed body.
fn malformed_body_handler(err: poem::Error) -> GreetPostResponse {
    make_http_422(&MalformedInput::from_parse_error(&err))
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl GreetApi {
    /// Greet via query parameter
    ///
    /// Returns a greeting based on the query parameter `name`, which
    /// defaults to "World".
    #[oai(path = "/greet", method = "get")]
    async fn greet_get(&self,
                       http_req: &Request,
                       /// The name of the person to greet.
                       name: Query<Option<String>>,
                      ) -> Json<GreetingResponse> {
        let req = GreetingRequest::from_query(name.0);
        debug_request(http_req, &req);
        Json(greet(&req))
    }

    /// Greet via JSON payload
    ///
    /// Returns a greeting based on a JSON body of the form
    /// `{"name": "<string>"}`.  The `name` field is required.
    #[oai(path = "/greet", method = "post")]
    async fn greet_post(&self, http_req: &Request, body: Json<Value>) -> GreetPostResponse {
        match GreetingRequest::from_json(&body.0) {
            Ok(req) => {
                debug_request(http_req, &req);
                make_http_200(greet(&req))
            }
            Err(e) => make_http_422(&e),
        }
    }
}
