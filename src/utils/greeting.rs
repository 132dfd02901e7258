#![forbid(unsafe_code)]

use poem_openapi::Object;
use serde_json::Value;
use thiserror::Error;

use crate::utils::server_utils::RequestDebug;

// ***************************************************************************
//                                Constants
// ***************************************************************************
/// Name substituted when the query binding receives no `name`.
pub const DEFAULT_NAME: &str = "World";
const GREETING_PREFIX: &str = "Hello ";
const NAME_FIELD: &str = "name";

// ***************************************************************************
//                          Request/Response Definitions
// ***************************************************************************
// ---------------------------------------------------------------------------
// GreetingRequest:
// ---------------------------------------------------------------------------
/// The resolved input of a greeting, whichever transport supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreetingRequest {
    pub name: String,
}

// ---------------------------------------------------------------------------
// GreetingResponse:
// ---------------------------------------------------------------------------
#[derive(Object, Debug, Clone, PartialEq, Eq)]
pub struct GreetingResponse {
    /// The greeting, always "Hello " followed by the name.
    pub message: String,
}

// ---------------------------------------------------------------------------
// MalformedInput:
// ---------------------------------------------------------------------------
/// Reasons a JSON body cannot be bound to a `GreetingRequest`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedInput {
    #[error("Request body is not valid JSON: {}", .0)]
    InvalidJson(String),

    #[error("Field required: body")]
    MissingBody,

    #[error("Request body must be a JSON object")]
    NotAnObject,

    #[error("Field required: {}", .0)]
    MissingField(&'static str),

    #[error("Input should be a valid string: {}", .0)]
    WrongType(&'static str),
}

/// Client-error body explaining which part of the request failed validation.
#[derive(Object, Debug, Clone, PartialEq, Eq)]
pub struct MalformedInputResult {
    pub result_code: String,
    pub result_msg: String,
    /// Location of the failing input, e.g. ["body", "name"].
    pub loc: Vec<String>,
    /// One of invalid_json, not_an_object, missing, string_type.
    pub kind: String,
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl GreetingRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Query binding: an absent name becomes the default.
    pub fn from_query(name: Option<String>) -> Self {
        Self::new(name.unwrap_or_else(|| DEFAULT_NAME.to_string()))
    }

    /// Body binding: the decoded JSON must be an object with a string `name`.
    /// Other members are ignored.  An empty body arrives as null.
    pub fn from_json(body: &Value) -> Result<Self, MalformedInput> {
        if body.is_null() {
            return Err(MalformedInput::MissingBody);
        }
        let obj = body.as_object().ok_or(MalformedInput::NotAnObject)?;
        match obj.get(NAME_FIELD) {
            Some(Value::String(name)) => Ok(Self::new(name.as_str())),
            Some(_) => Err(MalformedInput::WrongType(NAME_FIELD)),
            None => Err(MalformedInput::MissingField(NAME_FIELD)),
        }
    }
}

// Implement the debug record trait for logging.
impl RequestDebug for GreetingRequest {
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(255);
        s.push_str("  Request:");
        s.push_str("\n    name: ");
        s.push_str(&self.name);
        s
    }
}

impl MalformedInput {
    /// Map a payload error raised by the framework before the body could be
    /// decoded (bad syntax, wrong content type).
    pub fn from_parse_error(err: &poem::Error) -> Self {
        MalformedInput::InvalidJson(err.to_string())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MalformedInput::InvalidJson(_) => "invalid_json",
            MalformedInput::NotAnObject => "not_an_object",
            MalformedInput::MissingBody | MalformedInput::MissingField(_) => "missing",
            MalformedInput::WrongType(_) => "string_type",
        }
    }

    pub fn loc(&self) -> Vec<String> {
        match self {
            MalformedInput::InvalidJson(_)
            | MalformedInput::MissingBody
            | MalformedInput::NotAnObject => vec!["body".to_string()],
            MalformedInput::MissingField(f) | MalformedInput::WrongType(f) => {
                vec!["body".to_string(), f.to_string()]
            }
        }
    }
}

impl From<&MalformedInput> for MalformedInputResult {
    fn from(err: &MalformedInput) -> Self {
        Self {
            result_code: 422.to_string(),
            result_msg: err.to_string(),
            loc: err.loc(),
            kind: err.kind().to_string(),
        }
    }
}

// ***************************************************************************
//                             Public Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// greet:
// ---------------------------------------------------------------------------
/** Build the greeting for a resolved request.  The name is used verbatim. */
pub fn greet(req: &GreetingRequest) -> GreetingResponse {
    let mut message = String::with_capacity(GREETING_PREFIX.len() + req.name.len());
    message.push_str(GREETING_PREFIX);
    message.push_str(&req.name);
    GreetingResponse { message }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn greet_prefixes_name() {
        let resp = greet(&GreetingRequest::new("Alice"));
        assert_eq!(resp.message, "Hello Alice");
    }

    #[test]
    fn greet_keeps_name_verbatim() {
        assert_eq!(greet(&GreetingRequest::new("")).message, "Hello ");
        assert_eq!(greet(&GreetingRequest::new("  bob ")).message, "Hello   bob ");
        assert_eq!(greet(&GreetingRequest::new("\"<x>\"\\")).message, "Hello \"<x>\"\\");
    }

    #[test]
    fn query_binding_defaults_to_world() {
        assert_eq!(GreetingRequest::from_query(None).name, DEFAULT_NAME);
        assert_eq!(GreetingRequest::from_query(Some(String::new())).name, "");
    }

    #[test]
    fn json_binding_accepts_string_name() {
        let req = GreetingRequest::from_json(&json!({"name": "Alice", "extra": 1}));
        assert_eq!(req, Ok(GreetingRequest::new("Alice")));
    }

    #[test]
    fn json_binding_rejects_missing_name() {
        let err = GreetingRequest::from_json(&json!({})).unwrap_err();
        assert_eq!(err, MalformedInput::MissingField("name"));
        assert_eq!(err.loc(), vec!["body", "name"]);
        assert_eq!(err.kind(), "missing");
    }

    #[test]
    fn json_binding_rejects_non_string_name() {
        for body in [json!({"name": 123}), json!({"name": null}), json!({"name": ["a"]})] {
            let err = GreetingRequest::from_json(&body).unwrap_err();
            assert_eq!(err, MalformedInput::WrongType("name"));
        }
    }

    #[test]
    fn json_binding_rejects_non_objects() {
        for body in [json!("Alice"), json!(["name"]), json!(7)] {
            let err = GreetingRequest::from_json(&body).unwrap_err();
            assert_eq!(err, MalformedInput::NotAnObject);
            assert_eq!(err.loc(), vec!["body"]);
        }
    }

    #[test]
    fn json_binding_treats_null_as_missing_body() {
        let err = GreetingRequest::from_json(&Value::Null).unwrap_err();
        assert_eq!(err, MalformedInput::MissingBody);
        assert_eq!(err.kind(), "missing");
        assert_eq!(err.loc(), vec!["body"]);
    }

    #[test]
    fn malformed_result_carries_tag() {
        let res = MalformedInputResult::from(&MalformedInput::WrongType("name"));
        assert_eq!(res.result_code, "422");
        assert_eq!(res.kind, "string_type");
        assert_eq!(res.result_msg, "Input should be a valid string: name");
    }
}
