//! # logtap
//!
//! Transparent request/response logging middleware for tower HTTP clients.
//!
//! logtap wraps a client transport as a [`tower::Layer`] and produces one
//! structured, multi-line log record per exchange direction without altering
//! a single byte of what the transport sends or the caller receives. It is
//! built around three guarantees:
//!
//! - **Non-intrusive**: streaming bodies are observed through a tap that
//!   forwards every chunk untouched; single-pass bodies are never consumed
//!   destructively, and a skipped or oversized body is forwarded without
//!   buffering at all.
//! - **Off the hot path**: decoding, masking and record assembly run on a
//!   spawned task, never on the poll path driving the connection.
//! - **Masked by default policy**: values of configured JSON keys, form keys
//!   and query parameters are replaced with a redaction marker; a masking
//!   failure omits the value rather than leaking it.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use logtap::{LoggingConfig, LoggingLayer};
//! use tower::{Layer, ServiceExt};
//!
//! let layer = LoggingLayer::new(
//!     LoggingConfig::builder()
//!         .name("Backend")
//!         .mask_json_key("password")
//!         .mask_query_param("token")
//!         .build(),
//! );
//!
//! // `transport` is any tower service speaking http::Request / http::Response,
//! // e.g. a hyper-util client adapter.
//! let client = layer.layer(transport);
//! let response = client.oneshot(request).await?;
//! ```
//!
//! Each exchange emits two records at info level (configurable):
//!
//! ```text
//! ===========================Backend Request begin===========================
//! =ID            : 8d5a4b9e-9a6a-4d3f-9a93-1c9f6f6e2b11
//! =URI           : POST https://api.example.com/login?token=***&id=1
//! =Headers       : content-type:application/json
//! =Body          : {"user":"a","password":"***"}
//! ===========================Backend Request end  ===========================
//! ```
//!
//! Individual requests can opt out of (or into) any field with
//! [`LogOverrides`], and the masking strategy lists are an open extension
//! point on [`LoggingLayer::builder`].
//!
//! ## Modules
//!
//! - [`config`]: configuration structs, bindable from host config files
//! - [`mask`]: the [`MaskRule`] trait and the built-in rules
//! - [`format`]: record rendering
//! - [`tap`]: the non-destructive body tap
//! - [`overrides`]: per-request toggles
//! - [`layer`]: the tower layer/service pair

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod format;
pub mod layer;
pub mod mask;
pub mod overrides;
pub mod tap;

pub use config::{
    DirectionConfig, LogLevel, LoggingConfig, LoggingConfigBuilder, MaskConfig, DEFAULT_MASK,
    DEFAULT_MAX_BODY_SIZE,
};
pub use error::Error;
pub use format::{Direction, ExchangeInfo, LogFormatter};
pub use layer::{LoggingLayer, LoggingLayerBuilder, LoggingService, ResponseFuture, Sink};
pub use mask::{FormKeyMask, JsonKeyMask, MaskRule, MaskRules, QueryParamMask, RegexMask};
pub use overrides::{Directive, DirectionOverrides, LogOverrides};
pub use tap::{BodyCapture, TapBody};
