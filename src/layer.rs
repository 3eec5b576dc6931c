//! Exchange interceptor: tower layer and service
//!
//! [`LoggingLayer`] wraps a transport service. Per exchange it stamps a start
//! time and an id, resolves the per-direction directives, substitutes both
//! bodies with [`TapBody`] wrappers, and emits one record per direction at
//! the correct lifecycle points. The transport itself is opaque: requests and
//! responses are forwarded byte-for-byte, and a transport error propagates
//! unchanged with no record for the phase that failed.
//!
//! Record assembly (decode, mask, string building) runs on a spawned tokio
//! task, never on the poll path that drives the body. When no runtime is
//! available the record is rendered inline as a fallback.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Instant;

use http::header::CONTENT_LENGTH;
use http::{HeaderMap, Request, Response};
use http_body::Body;
use pin_project_lite::pin_project;
use tower::Layer;
use tower_service::Service;
use uuid::Uuid;

use crate::config::{DirectionConfig, LogLevel, LoggingConfig};
use crate::format::{Direction, ExchangeInfo, LogFormatter};
use crate::mask::{self, MaskRule, MaskRules};
use crate::overrides::{Directive, LogOverrides};
use crate::tap::{BodyCapture, TapBody};

/// Log sink: receives a severity and the finished multi-line record.
pub type Sink = Arc<dyn Fn(LogLevel, &str) + Send + Sync>;

/// Per-exchange immutable context shared by both emission points.
struct ExchangeContext {
    id: String,
    method: String,
    uri: String,
    headers: HeaderMap,
    start: Instant,
}

/// Configuration, formatter and sink shared by all exchanges of a layer.
struct Shared {
    enabled: bool,
    level: LogLevel,
    request: DirectionConfig,
    response: DirectionConfig,
    formatter: LogFormatter,
    sink: Sink,
}

impl Shared {
    fn active(&self) -> bool {
        self.enabled && !self.level.is_off()
    }

    /// Render and emit one record, off the caller's poll path.
    ///
    /// Elapsed time is computed at emission, not at capture. Failures inside
    /// the spawned task are contained by the task boundary; logging can never
    /// fail the exchange.
    fn emit(
        self: Arc<Self>,
        direction: Direction,
        directive: Directive,
        ctx: Arc<ExchangeContext>,
        status: Option<u16>,
        response_headers: Option<HeaderMap>,
        capture: BodyCapture,
    ) {
        let render = move || {
            let elapsed = directive.took_time.then(|| ctx.start.elapsed());
            let headers = response_headers.as_ref().unwrap_or(&ctx.headers);
            let info = ExchangeInfo {
                id: &ctx.id,
                method: &ctx.method,
                uri: &ctx.uri,
                status,
                headers,
            };
            let message = self
                .formatter
                .render(direction, &directive, &info, elapsed, &capture);
            (self.sink)(self.level, &message);
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { render() });
            }
            Err(_) => render(),
        }
    }
}

/// Default sink: forward to `tracing` at the configured severity.
fn tracing_sink(level: LogLevel, message: &str) {
    match level {
        LogLevel::Off => {}
        LogLevel::Error => tracing::error!(target: "logtap", "{message}"),
        LogLevel::Warn => tracing::warn!(target: "logtap", "{message}"),
        LogLevel::Info => tracing::info!(target: "logtap", "{message}"),
        LogLevel::Debug => tracing::debug!(target: "logtap", "{message}"),
        LogLevel::Trace => tracing::trace!(target: "logtap", "{message}"),
    }
}

/// Declared body length: `Content-Length` header, else the body's exact size
/// hint. `None` means the length is unknown (streaming without a declared
/// size), which is treated as "nothing to capture".
fn declared_length<B: Body>(headers: &HeaderMap, body: &B) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .or_else(|| body.size_hint().exact())
}

/// What to do with one direction's body.
enum BodyPlan {
    /// Emit the record right away with this capture outcome; don't tap.
    Emit(BodyCapture),
    /// Tap the body with this ceiling and emit on completion.
    Tap(u64),
}

fn body_plan(directive: &Directive, declared: Option<u64>) -> BodyPlan {
    if !directive.body {
        return BodyPlan::Emit(BodyCapture::Skipped);
    }
    match declared {
        None | Some(0) => BodyPlan::Emit(BodyCapture::Skipped),
        Some(length) if length > directive.max_body_size => {
            BodyPlan::Emit(BodyCapture::Oversized(length))
        }
        Some(_) => BodyPlan::Tap(directive.max_body_size),
    }
}

/// Tower layer that logs requests and responses flowing through a client
/// service without altering them.
///
/// # Example
///
/// ```rust,ignore
/// use logtap::{LoggingConfig, LoggingLayer};
/// use tower::ServiceBuilder;
///
/// let client = ServiceBuilder::new()
///     .layer(LoggingLayer::new(
///         LoggingConfig::builder()
///             .mask_json_key("password")
///             .mask_query_param("token")
///             .build(),
///     ))
///     .service(transport);
/// ```
#[derive(Clone)]
pub struct LoggingLayer {
    shared: Arc<Shared>,
}

impl LoggingLayer {
    /// Create a layer from a configuration, with the default masking rules
    /// and the `tracing` sink.
    pub fn new(config: LoggingConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Create a builder for registering custom masking rules or a custom
    /// sink.
    pub fn builder() -> LoggingLayerBuilder {
        LoggingLayerBuilder::default()
    }
}

impl Default for LoggingLayer {
    fn default() -> Self {
        Self::new(LoggingConfig::default())
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingService {
            inner,
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Ordered rule list under construction: an optional full replacement of the
/// defaults plus appended extras.
#[derive(Default)]
struct RuleSlot {
    replace: Option<MaskRules>,
    extra: MaskRules,
}

impl RuleSlot {
    fn build(self, defaults: MaskRules) -> MaskRules {
        let mut rules = self.replace.unwrap_or(defaults);
        rules.extend(self.extra);
        rules
    }
}

/// Builder for [`LoggingLayer`].
///
/// The masking strategy lists are the extension point: additional rules are
/// appended after the config-derived defaults, and each list can also be
/// replaced wholesale, without touching the interceptor.
#[derive(Default)]
pub struct LoggingLayerBuilder {
    config: LoggingConfig,
    uri_rules: RuleSlot,
    request_body_rules: RuleSlot,
    response_body_rules: RuleSlot,
    sink: Option<Sink>,
}

impl LoggingLayerBuilder {
    /// Set the configuration.
    pub fn config(mut self, config: LoggingConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a URI masking rule.
    pub fn uri_rule(mut self, rule: impl MaskRule + 'static) -> Self {
        self.uri_rules.extra.push(Arc::new(rule));
        self
    }

    /// Replace the URI masking rules entirely.
    pub fn uri_rules(mut self, rules: MaskRules) -> Self {
        self.uri_rules.replace = Some(rules);
        self
    }

    /// Append a request-body masking rule.
    pub fn request_body_rule(mut self, rule: impl MaskRule + 'static) -> Self {
        self.request_body_rules.extra.push(Arc::new(rule));
        self
    }

    /// Replace the request-body masking rules entirely.
    pub fn request_body_rules(mut self, rules: MaskRules) -> Self {
        self.request_body_rules.replace = Some(rules);
        self
    }

    /// Append a response-body masking rule.
    pub fn response_body_rule(mut self, rule: impl MaskRule + 'static) -> Self {
        self.response_body_rules.extra.push(Arc::new(rule));
        self
    }

    /// Replace the response-body masking rules entirely.
    pub fn response_body_rules(mut self, rules: MaskRules) -> Self {
        self.response_body_rules.replace = Some(rules);
        self
    }

    /// Replace the default `tracing` sink.
    pub fn sink(mut self, sink: impl Fn(LogLevel, &str) + Send + Sync + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Build the layer.
    pub fn build(self) -> LoggingLayer {
        let config = self.config;
        let formatter = LogFormatter::new(
            &config,
            self.uri_rules.build(mask::uri_rules(&config.mask)),
            self.request_body_rules.build(mask::body_rules(&config.mask)),
            self.response_body_rules.build(mask::body_rules(&config.mask)),
        );
        LoggingLayer {
            shared: Arc::new(Shared {
                enabled: config.enabled,
                level: config.level,
                request: config.request,
                response: config.response,
                formatter,
                sink: self.sink.unwrap_or_else(|| Arc::new(tracing_sink)),
            }),
        }
    }
}

/// The service produced by [`LoggingLayer`].
pub struct LoggingService<S> {
    inner: S,
    shared: Arc<Shared>,
}

impl<S: Clone> Clone for LoggingService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for LoggingService<S>
where
    S: Service<Request<TapBody<ReqBody>>, Response = Response<ResBody>>,
    ReqBody: Body,
    ResBody: Body,
{
    type Response = Response<TapBody<ResBody>>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // Disabled logging short-circuits the whole machine: no context, no
        // timing, plain passthrough wrappers.
        if !self.shared.active() {
            let fut = self.inner.call(req.map(TapBody::passthrough));
            return ResponseFuture { inner: fut, pending: None };
        }

        let shared = Arc::clone(&self.shared);
        let overrides = req
            .extensions()
            .get::<LogOverrides>()
            .copied()
            .unwrap_or_default();
        let request_directive = shared.request.resolve(&overrides.request);
        let response_directive = shared.response.resolve(&overrides.response);

        let ctx = Arc::new(ExchangeContext {
            id: Uuid::new_v4().to_string(),
            method: req.method().to_string(),
            uri: req.uri().to_string(),
            headers: req.headers().clone(),
            start: Instant::now(),
        });

        let declared = declared_length(req.headers(), req.body());
        let req = match body_plan(&request_directive, declared) {
            BodyPlan::Emit(capture) => {
                Arc::clone(&shared).emit(
                    Direction::Request,
                    request_directive,
                    Arc::clone(&ctx),
                    None,
                    None,
                    capture,
                );
                req.map(TapBody::passthrough)
            }
            BodyPlan::Tap(limit) => {
                let cb_shared = Arc::clone(&shared);
                let cb_ctx = Arc::clone(&ctx);
                req.map(|body| {
                    TapBody::capturing(body, limit, move |capture| {
                        cb_shared.emit(
                            Direction::Request,
                            request_directive,
                            cb_ctx,
                            None,
                            None,
                            capture,
                        )
                    })
                })
            }
        };

        let fut = self.inner.call(req);
        ResponseFuture {
            inner: fut,
            pending: Some(PendingResponse {
                shared,
                ctx,
                directive: response_directive,
            }),
        }
    }
}

struct PendingResponse {
    shared: Arc<Shared>,
    ctx: Arc<ExchangeContext>,
    directive: Directive,
}

pin_project! {
    /// Future returned by [`LoggingService`]: resolves the transport future,
    /// then wraps the response body for the response-side record.
    pub struct ResponseFuture<F> {
        #[pin]
        inner: F,
        pending: Option<PendingResponse>,
    }
}

impl<F, ResBody, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
    ResBody: Body,
{
    type Output = Result<Response<TapBody<ResBody>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let result = ready!(this.inner.poll(cx));

        let res = match result {
            // Transport failure: propagate unchanged, no record for the
            // phase that failed to complete.
            Err(error) => return Poll::Ready(Err(error)),
            Ok(res) => res,
        };

        let Some(PendingResponse {
            shared,
            ctx,
            directive,
        }) = this.pending.take()
        else {
            return Poll::Ready(Ok(res.map(TapBody::passthrough)));
        };

        let status = res.status().as_u16();
        let headers = res.headers().clone();
        let declared = declared_length(res.headers(), res.body());

        let res = match body_plan(&directive, declared) {
            BodyPlan::Emit(capture) => {
                shared.emit(
                    Direction::Response,
                    directive,
                    ctx,
                    Some(status),
                    Some(headers),
                    capture,
                );
                res.map(TapBody::passthrough)
            }
            BodyPlan::Tap(limit) => res.map(|body| {
                TapBody::capturing(body, limit, move |capture| {
                    shared.emit(
                        Direction::Response,
                        directive,
                        ctx,
                        Some(status),
                        Some(headers),
                        capture,
                    )
                })
            }),
        };

        Poll::Ready(Ok(res))
    }
}
