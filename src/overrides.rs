//! Per-request logging overrides
//!
//! Callers can override any per-direction toggle on an individual request by
//! attaching a [`LogOverrides`] value to the request's extensions. Absent
//! overrides fall back to the global [`DirectionConfig`]. The middleware
//! resolves the two [`Directive`]s once, before any body is polled, and they
//! never change mid-exchange.

use crate::config::DirectionConfig;

/// Optional per-request toggles for one direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirectionOverrides {
    pub(crate) uri: Option<bool>,
    pub(crate) headers: Option<bool>,
    pub(crate) body: Option<bool>,
    pub(crate) took_time: Option<bool>,
}

/// Per-request logging overrides, carried in `http::Extensions`.
///
/// # Example
///
/// ```rust
/// use logtap::LogOverrides;
///
/// let request = http::Request::builder()
///     .uri("https://example.com/upload")
///     .body(())
///     .expect("request");
/// // Skip body logging for this one request.
/// let request = LogOverrides::new().request_body(false).attach(request);
/// assert!(request.extensions().get::<LogOverrides>().is_some());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogOverrides {
    pub(crate) request: DirectionOverrides,
    pub(crate) response: DirectionOverrides,
}

impl LogOverrides {
    /// Create an empty override set (everything falls back to config).
    pub fn new() -> Self {
        Self::default()
    }

    /// Override URI logging for the request record.
    pub fn request_uri(mut self, value: bool) -> Self {
        self.request.uri = Some(value);
        self
    }

    /// Override header logging for the request record.
    pub fn request_headers(mut self, value: bool) -> Self {
        self.request.headers = Some(value);
        self
    }

    /// Override body logging for the request record.
    pub fn request_body(mut self, value: bool) -> Self {
        self.request.body = Some(value);
        self
    }

    /// Override elapsed-time logging for the request record.
    pub fn request_took_time(mut self, value: bool) -> Self {
        self.request.took_time = Some(value);
        self
    }

    /// Override URI logging for the response record.
    pub fn response_uri(mut self, value: bool) -> Self {
        self.response.uri = Some(value);
        self
    }

    /// Override header logging for the response record.
    pub fn response_headers(mut self, value: bool) -> Self {
        self.response.headers = Some(value);
        self
    }

    /// Override body logging for the response record.
    pub fn response_body(mut self, value: bool) -> Self {
        self.response.body = Some(value);
        self
    }

    /// Override elapsed-time logging for the response record.
    pub fn response_took_time(mut self, value: bool) -> Self {
        self.response.took_time = Some(value);
        self
    }

    /// Attach the overrides to a request.
    pub fn attach<B>(self, mut request: http::Request<B>) -> http::Request<B> {
        request.extensions_mut().insert(self);
        request
    }
}

/// The resolved toggle set for one direction of one exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Directive {
    /// Log the exchange id line
    pub id: bool,
    /// Log the method/URI line
    pub uri: bool,
    /// Log the headers block
    pub headers: bool,
    /// Log the body
    pub body: bool,
    /// Log the elapsed-time line
    pub took_time: bool,
    /// Ceiling for bodies eligible for capture
    pub max_body_size: u64,
}

impl DirectionConfig {
    /// Resolve the effective directive: per-request overrides win, the
    /// global configuration fills the gaps.
    pub fn resolve(&self, overrides: &DirectionOverrides) -> Directive {
        Directive {
            id: self.include_id,
            uri: overrides.uri.unwrap_or(self.include_uri),
            headers: overrides.headers.unwrap_or(self.include_headers),
            body: overrides.body.unwrap_or(self.include_body),
            took_time: overrides.took_time.unwrap_or(self.include_took_time),
            max_body_size: self.max_body_size,
        }
    }
}
