#![forbid(unsafe_code)]

use std::sync::Arc;

use log::debug;
use poem::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use poem::web::Json;
use poem::{Endpoint, IntoResponse, Middleware, Request, Response, Result};

use crate::utils::config::CorsConfig;
use crate::utils::errors::{Errors, HttpResult};

// ***************************************************************************
//                                Constants
// ***************************************************************************
const WILDCARD: &str = "*";
const ALL_METHODS: &str = "DELETE, GET, HEAD, OPTIONS, PATCH, POST, PUT";
const PREFLIGHT_MAX_AGE: &str = "600";

// Headers a browser may always send without asking.
const SAFELISTED_HEADERS: [&str; 4] = ["accept", "accept-language", "content-language", "content-type"];

// ***************************************************************************
//                               Policy Types
// ***************************************************************************
// ---------------------------------------------------------------------------
// AllowList:
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowList {
    Any,
    Only(Vec<String>),
}

impl AllowList {
    /// A `*` entry anywhere in the list allows everything.
    fn from_entries(entries: &[String], normalize: fn(&str) -> String) -> Self {
        if entries.iter().any(|e| e.trim() == WILDCARD) {
            AllowList::Any
        } else {
            AllowList::Only(entries.iter().map(|e| normalize(e.trim())).collect())
        }
    }

    fn allows(&self, value: &str) -> bool {
        match self {
            AllowList::Any => true,
            AllowList::Only(v) => v.iter().any(|e| e == value),
        }
    }
}

// ---------------------------------------------------------------------------
// CorsPolicy:
// ---------------------------------------------------------------------------
/// The origin allow-list and the permissions granted to allowed origins.
/// Built once at startup and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    pub allow_origins: AllowList,
    pub allow_credentials: bool,
    pub allow_methods: AllowList,
    pub allow_headers: AllowList,
}

// ---------------------------------------------------------------------------
// PermissiveHeaders:
// ---------------------------------------------------------------------------
/// Headers granted to an allowed origin on an actual request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissiveHeaders {
    pub allow_origin: String,
    pub allow_credentials: bool,
}

/// Headers granted to an allowed origin on a preflight request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightHeaders {
    pub base: PermissiveHeaders,
    pub allow_methods: String,
    pub allow_headers: Option<String>,
}

// ***************************************************************************
//                              Policy Methods
// ***************************************************************************
impl CorsPolicy {
    /** Build the policy from its configuration, rejecting origins that are
     * not `*` or a bare http/https origin.
     */
    pub fn from_config(cfg: &CorsConfig) -> Result<Self, Errors> {
        for origin in &cfg.allow_origins {
            let origin = origin.trim();
            if origin != WILDCARD && !is_valid_origin(origin) {
                return Err(Errors::InvalidConfig(format!(
                    "CORS allow_origins entry is not a valid origin: {:?}", origin)));
            }
        }

        Ok(Self {
            allow_origins: AllowList::from_entries(&cfg.allow_origins, str::to_string),
            allow_credentials: cfg.allow_credentials,
            allow_methods: AllowList::from_entries(&cfg.allow_methods, str::to_uppercase),
            allow_headers: AllowList::from_entries(&cfg.allow_headers, str::to_lowercase),
        })
    }
}

// ***************************************************************************
//                            Decision Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// permissive_headers:
// ---------------------------------------------------------------------------
/** Decide whether a request's declared origin may read the response.  Returns
 * None when there is no origin or it is not allowed, which is the whole of
 * the refusal: the browser blocks the read when the headers are missing.
 */
pub fn permissive_headers(origin: Option<&str>, policy: &CorsPolicy) -> Option<PermissiveHeaders> {
    let origin = origin?;
    if !policy.allow_origins.allows(origin) {
        return None;
    }

    // Credentialed responses must name the origin; so must allow-lists.
    let allow_origin = if policy.allow_origins == AllowList::Any && !policy.allow_credentials {
        WILDCARD.to_string()
    } else {
        origin.to_string()
    };

    Some(PermissiveHeaders { allow_origin, allow_credentials: policy.allow_credentials })
}

// ---------------------------------------------------------------------------
// preflight_headers:
// ---------------------------------------------------------------------------
/** Decide a preflight.  The origin must be allowed, and when methods or
 * headers are restricted the requested method and headers must be too.
 */
pub fn preflight_headers(origin: Option<&str>,
                         requested_method: Option<&str>,
                         requested_headers: Option<&str>,
                         policy: &CorsPolicy) -> Option<PreflightHeaders> {
    let base = permissive_headers(origin, policy)?;

    if let Some(m) = requested_method {
        if !policy.allow_methods.allows(&m.trim().to_uppercase()) {
            return None;
        }
    }

    let requested: Vec<String> = requested_headers
        .map(|h| h.split(',')
                  .map(|s| s.trim().to_lowercase())
                  .filter(|s| !s.is_empty())
                  .collect())
        .unwrap_or_default();

    let allow_methods = match &policy.allow_methods {
        AllowList::Any => ALL_METHODS.to_string(),
        AllowList::Only(v) => v.join(", "),
    };

    let allow_headers = match &policy.allow_headers {
        // Wildcard mirrors whatever the browser asked for.
        AllowList::Any => {
            if requested.is_empty() { None } else { Some(requested.join(", ")) }
        }
        AllowList::Only(v) => {
            let unlisted = requested.iter().any(|h| {
                !v.contains(h) && !SAFELISTED_HEADERS.contains(&h.as_str())
            });
            if unlisted {
                return None;
            }
            let mut all: Vec<String> = SAFELISTED_HEADERS.iter().map(|s| s.to_string()).collect();
            all.extend(v.iter().filter(|h| !SAFELISTED_HEADERS.contains(&h.as_str())).cloned());
            Some(all.join(", "))
        }
    };

    Some(PreflightHeaders { base, allow_methods, allow_headers })
}

// ***************************************************************************
//                                Middleware
// ***************************************************************************
// ---------------------------------------------------------------------------
// CorsGate:
// ---------------------------------------------------------------------------
/// Applies a `CorsPolicy` to every request before routing.
pub struct CorsGate {
    policy: Arc<CorsPolicy>,
}

impl CorsGate {
    pub fn new(policy: CorsPolicy) -> Self {
        Self { policy: Arc::new(policy) }
    }
}

impl<E: Endpoint> Middleware<E> for CorsGate {
    type Output = CorsGateEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        CorsGateEndpoint { inner: ep, policy: self.policy.clone() }
    }
}

pub struct CorsGateEndpoint<E> {
    inner: E,
    policy: Arc<CorsPolicy>,
}

impl<E: Endpoint> Endpoint for CorsGateEndpoint<E> {
    type Output = Response;

    async fn call(&self, req: Request) -> Result<Self::Output> {
        let origin = header_str(req.headers(), header::ORIGIN);

        // Preflights never reach the routes.
        if req.method() == Method::OPTIONS {
            return Ok(self.preflight(&req, origin.as_deref()));
        }

        let grant = permissive_headers(origin.as_deref(), &self.policy);
        let mut resp = match self.inner.call(req).await {
            Ok(r) => r.into_response(),
            Err(e) => e.into_response(),
        };

        if let Some(grant) = grant {
            apply_permissive(resp.headers_mut(), &grant);
        }
        Ok(resp)
    }
}

impl<E> CorsGateEndpoint<E> {
    fn preflight(&self, req: &Request, origin: Option<&str>) -> Response {
        let requested_method = header_str(req.headers(), header::ACCESS_CONTROL_REQUEST_METHOD);
        let requested_headers = header_str(req.headers(), header::ACCESS_CONTROL_REQUEST_HEADERS);

        match preflight_headers(origin, requested_method.as_deref(),
                                requested_headers.as_deref(), &self.policy) {
            Some(grant) => {
                let mut resp = "OK".with_status(StatusCode::OK).into_response();
                let headers = resp.headers_mut();
                apply_permissive(headers, &grant.base);
                insert_header(headers, header::ACCESS_CONTROL_ALLOW_METHODS, &grant.allow_methods);
                if let Some(h) = &grant.allow_headers {
                    insert_header(headers, header::ACCESS_CONTROL_ALLOW_HEADERS, h);
                }
                headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(PREFLIGHT_MAX_AGE));
                resp
            }
            None => {
                let msg = match origin {
                    Some(o) => format!("Disallowed CORS preflight from origin {}", o),
                    None => "CORS preflight without an Origin header".to_string(),
                };
                debug!("{} for {}", msg, req.uri());
                Json(HttpResult::new(400.to_string(), msg))
                    .with_status(StatusCode::BAD_REQUEST)
                    .into_response()
            }
        }
    }
}

// ***************************************************************************
//                            Private Functions
// ***************************************************************************
fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn insert_header(headers: &mut HeaderMap, name: header::HeaderName, value: &str) {
    if let Ok(v) = HeaderValue::from_str(value) {
        headers.insert(name, v);
    }
}

fn apply_permissive(headers: &mut HeaderMap, grant: &PermissiveHeaders) {
    insert_header(headers, header::ACCESS_CONTROL_ALLOW_ORIGIN, &grant.allow_origin);
    if grant.allow_credentials {
        headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    }
    if grant.allow_origin != WILDCARD {
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}

// Origins are scheme://host[:port] with nothing after the authority.
fn is_valid_origin(origin: &str) -> bool {
    let rest = match origin.strip_prefix("https://").or_else(|| origin.strip_prefix("http://")) {
        Some(r) => r,
        None => return false,
    };
    !rest.is_empty() && !rest.contains(['/', '?', '#', ' '])
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;

    fn default_policy() -> CorsPolicy {
        CorsPolicy::from_config(&CorsConfig::default()).unwrap()
    }

    fn policy(origins: &[&str], credentials: bool) -> CorsPolicy {
        let cfg = CorsConfig {
            allow_origins: origins.iter().map(|s| s.to_string()).collect(),
            allow_credentials: credentials,
            ..CorsConfig::default()
        };
        CorsPolicy::from_config(&cfg).unwrap()
    }

    #[test]
    fn default_policy_allows_local_origins() {
        let p = default_policy();
        for o in ["http://localhost:8000", "http://127.0.0.1:8000", "https://chrwittm.github.io"] {
            let grant = permissive_headers(Some(o), &p).unwrap();
            assert_eq!(grant.allow_origin, o);
            assert!(grant.allow_credentials);
        }
    }

    #[test]
    fn unknown_or_absent_origin_gets_nothing() {
        let p = default_policy();
        assert_eq!(permissive_headers(Some("http://evil.example"), &p), None);
        assert_eq!(permissive_headers(Some("http://localhost:8001"), &p), None);
        assert_eq!(permissive_headers(None, &p), None);
    }

    #[test]
    fn wildcard_echoes_origin_with_credentials() {
        let grant = permissive_headers(Some("http://a.example"), &policy(&["*"], true)).unwrap();
        assert_eq!(grant.allow_origin, "http://a.example");

        let grant = permissive_headers(Some("http://a.example"), &policy(&["*"], false)).unwrap();
        assert_eq!(grant.allow_origin, "*");
    }

    #[test]
    fn preflight_mirrors_requested_headers() {
        let p = default_policy();
        let grant = preflight_headers(Some("http://localhost:8000"), Some("POST"),
                                      Some("Content-Type, X-Custom"), &p).unwrap();
        assert_eq!(grant.allow_methods, ALL_METHODS);
        assert_eq!(grant.allow_headers.as_deref(), Some("content-type, x-custom"));
    }

    #[test]
    fn preflight_enforces_restricted_lists() {
        let cfg = CorsConfig {
            allow_methods: vec!["get".to_string()],
            allow_headers: vec!["X-Token".to_string()],
            ..CorsConfig::default()
        };
        let p = CorsPolicy::from_config(&cfg).unwrap();
        let origin = Some("http://localhost:8000");

        assert!(preflight_headers(origin, Some("POST"), None, &p).is_none());
        assert!(preflight_headers(origin, Some("GET"), Some("x-other"), &p).is_none());

        let grant = preflight_headers(origin, Some("GET"), Some("x-token, accept"), &p).unwrap();
        assert_eq!(grant.allow_methods, "GET");
        assert_eq!(grant.allow_headers.as_deref(),
                   Some("accept, accept-language, content-language, content-type, x-token"));
    }

    #[test]
    fn invalid_origins_are_rejected() {
        for bad in ["localhost:8000", "http://", "https://a.example/path", "ftp://a.example"] {
            let cfg = CorsConfig { allow_origins: vec![bad.to_string()], ..CorsConfig::default() };
            assert!(matches!(CorsPolicy::from_config(&cfg), Err(Errors::InvalidConfig(_))));
        }
    }
}
