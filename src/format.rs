//! Log record assembly
//!
//! [`LogFormatter`] renders the single multi-line record emitted for one
//! direction of one exchange. Field order is fixed: header, id, uri, elapsed
//! time, headers, body, footer. Fields whose directive is off or whose value
//! is blank are omitted entirely, never rendered as empty lines.

use std::time::Duration;

use http::HeaderMap;

use crate::mask::MaskRules;
use crate::overrides::Directive;
use crate::tap::BodyCapture;
use crate::LoggingConfig;

const EDGE: &str = "===========================";

/// One direction of an exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// The outgoing request
    Request,
    /// The incoming response
    Response,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::Request => "Request",
            Direction::Response => "Response",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Scalar fields of one exchange direction, borrowed for rendering.
#[derive(Clone, Copy, Debug)]
pub struct ExchangeInfo<'a> {
    /// Opaque exchange identifier correlating the two records
    pub id: &'a str,
    /// Request method
    pub method: &'a str,
    /// Full target URI
    pub uri: &'a str,
    /// Response status, present only on the response side
    pub status: Option<u16>,
    /// Headers of this direction (request or response headers)
    pub headers: &'a HeaderMap,
}

/// Stateless-per-call rendering engine for log records.
///
/// Holds the display name, the label column width, and the ordered masking
/// rule lists for URIs and for each body direction. Safe to share across
/// exchanges; rendering never mutates.
pub struct LogFormatter {
    name: String,
    column_width: usize,
    uri_rules: MaskRules,
    request_body_rules: MaskRules,
    response_body_rules: MaskRules,
}

impl LogFormatter {
    /// Create a formatter with explicit rule lists.
    pub fn new(
        config: &LoggingConfig,
        uri_rules: MaskRules,
        request_body_rules: MaskRules,
        response_body_rules: MaskRules,
    ) -> Self {
        Self {
            name: config.name.clone(),
            column_width: config.column_width,
            uri_rules,
            request_body_rules,
            response_body_rules,
        }
    }

    /// Create a formatter with the default rules derived from
    /// [`LoggingConfig::mask`].
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self::new(
            config,
            crate::mask::uri_rules(&config.mask),
            crate::mask::body_rules(&config.mask),
            crate::mask::body_rules(&config.mask),
        )
    }

    /// Render the record for one direction.
    ///
    /// `elapsed` is the time since the exchange started; `None` renders as
    /// zero when the directive asks for the elapsed line.
    pub fn render(
        &self,
        direction: Direction,
        directive: &Directive,
        info: &ExchangeInfo<'_>,
        elapsed: Option<Duration>,
        body: &BodyCapture,
    ) -> String {
        let mut lines = Vec::with_capacity(7);
        lines.push(format!("{EDGE}{} {} begin{EDGE}", self.name, direction));

        if directive.id && !info.id.is_empty() {
            lines.push(self.field("ID", info.id));
        }
        if directive.uri {
            let uri_line = match (direction, info.status) {
                (Direction::Response, Some(status)) => {
                    format!("{status} {} {}", info.method, info.uri)
                }
                _ => format!("{} {}", info.method, info.uri),
            };
            lines.push(self.field("URI", &self.masked(&self.uri_rules, uri_line, "uri")));
        }
        if directive.took_time {
            let millis = elapsed.unwrap_or(Duration::ZERO).as_millis();
            lines.push(self.field("Took", &format!("{millis} ms")));
        }
        if directive.headers {
            let headers = render_headers(info.headers);
            if !headers.is_empty() {
                lines.push(self.field("Headers", &headers));
            }
        }
        if directive.body {
            if let Some(text) = self.body_text(direction, body) {
                if !text.is_empty() {
                    lines.push(self.field("Body", &text));
                }
            }
        }

        lines.push(format!("{EDGE}{} {} end  {EDGE}", self.name, direction));
        lines.join("\n")
    }

    /// The placeholder rendered instead of content for oversized bodies.
    pub fn too_big_message(&self, length: u64) -> String {
        format!("<TOO BIG {length} bytes>")
    }

    fn field(&self, label: &str, value: &str) -> String {
        format!("={:<width$}: {}", label, value, width = self.column_width)
    }

    /// Decode and mask the captured body. Oversized captures render the
    /// placeholder without any decode or masking pass.
    fn body_text(&self, direction: Direction, body: &BodyCapture) -> Option<String> {
        match body {
            BodyCapture::Skipped => None,
            BodyCapture::Oversized(length) => Some(self.too_big_message(*length)),
            BodyCapture::Full(bytes) => {
                let text = String::from_utf8_lossy(bytes).into_owned();
                let rules = match direction {
                    Direction::Request => &self.request_body_rules,
                    Direction::Response => &self.response_body_rules,
                };
                Some(self.masked(rules, text, "body"))
            }
        }
    }

    /// Apply the rule list in order. A failing rule replaces the whole value
    /// with an omission placeholder; unmasked text must not leak.
    fn masked(&self, rules: &MaskRules, text: String, what: &str) -> String {
        let mut current = text;
        for rule in rules {
            match rule.apply(&current) {
                Ok(next) => current = next,
                Err(error) => {
                    tracing::debug!(target: "logtap", %error, "masking rule failed, omitting {what}");
                    return format!("<{what} omitted: masking failed>");
                }
            }
        }
        current
    }
}

fn render_headers(headers: &HeaderMap) -> String {
    let mut parts = Vec::with_capacity(headers.keys_len());
    for name in headers.keys() {
        let values = headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join(",");
        parts.push(format!("{name}:{values}"));
    }
    parts.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::mask::{MaskRule, QueryParamMask};
    use bytes::Bytes;
    use std::sync::Arc;

    fn directive() -> Directive {
        Directive {
            id: true,
            uri: true,
            headers: true,
            body: true,
            took_time: false,
            max_body_size: 1024,
        }
    }

    fn formatter() -> LogFormatter {
        LogFormatter::from_config(&LoggingConfig::default())
    }

    fn info<'a>(headers: &'a HeaderMap) -> ExchangeInfo<'a> {
        ExchangeInfo {
            id: "abc-123",
            method: "POST",
            uri: "https://example.com/login",
            status: None,
            headers,
        }
    }

    #[test]
    fn renders_fields_in_fixed_order() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().expect("value"));
        let body = BodyCapture::Full(Bytes::from_static(b"{\"user\":\"a\"}"));

        let out = formatter().render(Direction::Request, &directive(), &info(&headers), None, &body);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], format!("{EDGE}HTTP Request begin{EDGE}"));
        assert!(lines[1].starts_with("=ID"));
        assert!(lines[2].starts_with("=URI"));
        assert!(lines[3].starts_with("=Headers"));
        assert!(lines[4].starts_with("=Body"));
        assert_eq!(lines[5], format!("{EDGE}HTTP Request end  {EDGE}"));
        assert!(lines[2].contains("POST https://example.com/login"));
        assert!(lines[3].contains("content-type:application/json"));
    }

    #[test]
    fn skipped_body_and_empty_headers_are_omitted() {
        let headers = HeaderMap::new();
        let out = formatter().render(
            Direction::Request,
            &directive(),
            &info(&headers),
            None,
            &BodyCapture::Skipped,
        );
        assert!(!out.contains("=Body"));
        assert!(!out.contains("=Headers"));
        // Header and footer always present.
        assert!(out.starts_with(EDGE));
        assert!(out.ends_with(EDGE));
    }

    #[test]
    fn disabled_directive_fields_are_omitted() {
        let headers = HeaderMap::new();
        let off = Directive {
            id: false,
            uri: false,
            headers: false,
            body: false,
            took_time: false,
            max_body_size: 1024,
        };
        let out = formatter().render(
            Direction::Request,
            &off,
            &info(&headers),
            None,
            &BodyCapture::Full(Bytes::from_static(b"data")),
        );
        assert_eq!(out.lines().count(), 2);
    }

    #[test]
    fn oversized_body_renders_placeholder_not_content() {
        let headers = HeaderMap::new();
        let out = formatter().render(
            Direction::Request,
            &directive(),
            &info(&headers),
            None,
            &BodyCapture::Oversized(5000),
        );
        assert!(out.contains("<TOO BIG 5000 bytes>"));
    }

    #[test]
    fn response_uri_line_carries_status_and_took() {
        let headers = HeaderMap::new();
        let mut directive = directive();
        directive.took_time = true;
        let mut info = info(&headers);
        info.status = Some(200);

        let out = formatter().render(
            Direction::Response,
            &directive,
            &info,
            Some(Duration::from_millis(42)),
            &BodyCapture::Skipped,
        );
        assert!(out.contains("200 POST https://example.com/login"));
        assert!(out.contains("=Took"));
        assert!(out.contains("42 ms"));
        assert!(out.contains("Response begin"));
    }

    #[test]
    fn took_without_elapsed_renders_zero() {
        let headers = HeaderMap::new();
        let mut directive = directive();
        directive.took_time = true;
        let out = formatter().render(
            Direction::Request,
            &directive,
            &info(&headers),
            None,
            &BodyCapture::Skipped,
        );
        assert!(out.contains("0 ms"));
    }

    #[test]
    fn body_is_masked_with_direction_rules() {
        let config = LoggingConfig::builder().mask_json_key("password").build();
        let formatter = LogFormatter::from_config(&config);
        let headers = HeaderMap::new();
        let body = BodyCapture::Full(Bytes::from_static(b"{\"user\":\"a\",\"password\":\"p1\"}"));

        let out = formatter.render(Direction::Request, &directive(), &info(&headers), None, &body);
        assert!(out.contains(r#""password":"***""#));
        assert!(out.contains(r#""user":"a""#));
        assert!(!out.contains("p1"));
    }

    #[test]
    fn uri_masked_only_when_uri_logged() {
        let config = LoggingConfig::builder().mask_query_param("token").build();
        let formatter = LogFormatter::from_config(&config);
        let headers = HeaderMap::new();
        let info = ExchangeInfo {
            id: "id-1",
            method: "GET",
            uri: "https://x?token=secret&id=1",
            status: None,
            headers: &headers,
        };

        let out = formatter.render(
            Direction::Request,
            &directive(),
            &info,
            None,
            &BodyCapture::Skipped,
        );
        assert!(out.contains("token=***"));
        assert!(out.contains("id=1"));
        assert!(!out.contains("secret"));
    }

    #[test]
    fn failing_rule_omits_value_instead_of_leaking() {
        struct Failing;
        impl MaskRule for Failing {
            fn apply(&self, _text: &str) -> Result<String, Error> {
                Err(Error::Mask("boom".into()))
            }
        }

        let config = LoggingConfig::default();
        let formatter = LogFormatter::new(
            &config,
            vec![Arc::new(QueryParamMask::from_config(&config.mask))],
            vec![Arc::new(Failing)],
            vec![],
        );
        let headers = HeaderMap::new();
        let body = BodyCapture::Full(Bytes::from_static(b"top secret payload"));

        let out = formatter.render(Direction::Request, &directive(), &info(&headers), None, &body);
        assert!(out.contains("<body omitted: masking failed>"));
        assert!(!out.contains("top secret payload"));
    }

    #[test]
    fn multi_valued_headers_join_with_comma() {
        let mut headers = HeaderMap::new();
        headers.append("accept", "text/plain".parse().expect("value"));
        headers.append("accept", "application/json".parse().expect("value"));
        assert_eq!(
            render_headers(&headers),
            "accept:text/plain,application/json"
        );
    }
}
