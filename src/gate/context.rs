//! Read-only request view handed to skip policies and identity strategies

use hyper::http::request::Parts;
use hyper::{HeaderMap, Method, Request, Uri};

/// Borrowed view of one inbound request
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    method: &'a Method,
    uri: &'a Uri,
    headers: &'a HeaderMap,
}

impl<'a> RequestContext<'a> {
    pub fn new(method: &'a Method, uri: &'a Uri, headers: &'a HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    pub fn from_request<B>(req: &'a Request<B>) -> Self {
        Self::new(req.method(), req.uri(), req.headers())
    }

    pub fn from_parts(parts: &'a Parts) -> Self {
        Self::new(&parts.method, &parts.uri, &parts.headers)
    }

    /// HTTP method, the action of the decision tuple
    pub fn method(&self) -> &'a Method {
        self.method
    }

    /// URL path without query, the object of the decision tuple
    pub fn path(&self) -> &'a str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&'a str> {
        self.uri.query()
    }

    pub fn headers(&self) -> &'a HeaderMap {
        self.headers
    }

    /// Header value as a string; `None` when absent or not visible ASCII
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
