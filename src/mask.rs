//! Masking rules for sensitive values in logged URIs and bodies
//!
//! Rules are pure text transforms built on regular expressions, not grammar
//! parsers: malformed JSON or unusual encodings are masked on a best-effort
//! basis. Each rule replaces the *value* belonging to a configured key with a
//! redaction marker and leaves everything else untouched, which keeps the
//! rules idempotent: masking already-masked text changes nothing.
//!
//! The lists of rules applied per direction are supplied to
//! [`LoggingLayer`](crate::LoggingLayer) at construction; custom rules only
//! need to implement [`MaskRule`].

use std::collections::BTreeSet;
use std::sync::Arc;

use regex::Regex;

use crate::config::MaskConfig;
use crate::error::Error;

/// A text-rewriting rule that redacts sensitive values.
///
/// Rules must be stateless and cheap to apply; the same rule instance is used
/// concurrently across exchanges. A rule that fails must return an error
/// rather than the unmasked input; the formatter reacts by omitting the
/// whole value.
pub trait MaskRule: Send + Sync {
    /// Rewrite `text`, replacing sensitive values with a redaction marker.
    fn apply(&self, text: &str) -> Result<String, Error>;
}

/// Shared handle to an ordered list of masking rules.
pub type MaskRules = Vec<Arc<dyn MaskRule>>;

/// Builds the alternation `(?:k1|k2|…)` from a key set, regex-escaped and
/// sorted for a deterministic pattern. Returns `None` for an empty set.
fn key_group<I, S>(keys: I, case_insensitive: bool) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let escaped: BTreeSet<String> = keys
        .into_iter()
        .filter(|k| !k.as_ref().is_empty())
        .map(|k| regex::escape(k.as_ref()))
        .collect();
    if escaped.is_empty() {
        return None;
    }
    let alternation = escaped.into_iter().collect::<Vec<_>>().join("|");
    if case_insensitive {
        Some(format!("(?i:{alternation})"))
    } else {
        Some(format!("(?:{alternation})"))
    }
}

/// Masks the values of configured query parameters in a URI string.
///
/// Every occurrence of a configured name is masked, including repeated
/// parameters; the path and all other parameters pass through unchanged.
#[derive(Clone, Debug)]
pub struct QueryParamMask {
    re: Option<Regex>,
    mask: String,
}

impl QueryParamMask {
    /// Create a rule masking the given query parameter names.
    pub fn new<I, S>(names: I, mask: impl Into<String>, case_insensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let re = key_group(names, case_insensitive).map(|group| {
            Regex::new(&format!(r"([?&]{group}=)[^&#\s]*"))
                .expect("query mask pattern is built from escaped keys")
        });
        Self { re, mask: mask.into() }
    }

    /// Create the rule configured by [`MaskConfig::query_params`].
    pub fn from_config(config: &MaskConfig) -> Self {
        Self::new(&config.query_params, &config.mask, config.case_insensitive)
    }
}

impl MaskRule for QueryParamMask {
    fn apply(&self, text: &str) -> Result<String, Error> {
        let Some(re) = &self.re else {
            return Ok(text.to_string());
        };
        Ok(re
            .replace_all(text, |caps: &regex::Captures<'_>| {
                format!("{}{}", &caps[1], self.mask)
            })
            .into_owned())
    }
}

/// Masks the values of configured keys in JSON text.
///
/// Matches `"key": value` members at any nesting depth and replaces the
/// value (string, number, boolean, null, or a flat object/array) with the
/// marker as a quoted token. Deeply nested composite values are handled
/// best-effort, consistent with pattern-based (not parse-tree) masking.
#[derive(Clone, Debug)]
pub struct JsonKeyMask {
    re: Option<Regex>,
    mask: String,
}

impl JsonKeyMask {
    /// Create a rule masking the given JSON member keys.
    pub fn new<I, S>(keys: I, mask: impl Into<String>, case_insensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let re = key_group(keys, case_insensitive).map(|group| {
            let value = r#""(?:\\.|[^"\\])*"|-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?|true|false|null|\{[^{}]*\}|\[[^\[\]]*\]"#;
            Regex::new(&format!(r#"("{group}"\s*:\s*)(?:{value})"#))
                .expect("json mask pattern is built from escaped keys")
        });
        Self { re, mask: mask.into() }
    }

    /// Create the rule configured by [`MaskConfig::json_keys`].
    pub fn from_config(config: &MaskConfig) -> Self {
        Self::new(&config.json_keys, &config.mask, config.case_insensitive)
    }
}

impl MaskRule for JsonKeyMask {
    fn apply(&self, text: &str) -> Result<String, Error> {
        let Some(re) = &self.re else {
            return Ok(text.to_string());
        };
        Ok(re
            .replace_all(text, |caps: &regex::Captures<'_>| {
                format!("{}\"{}\"", &caps[1], self.mask)
            })
            .into_owned())
    }
}

/// Masks the values of configured keys in `application/x-www-form-urlencoded`
/// text.
#[derive(Clone, Debug)]
pub struct FormKeyMask {
    re: Option<Regex>,
    mask: String,
}

impl FormKeyMask {
    /// Create a rule masking the given form keys.
    pub fn new<I, S>(keys: I, mask: impl Into<String>, case_insensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let re = key_group(keys, case_insensitive).map(|group| {
            Regex::new(&format!(r"((?:^|&){group}=)[^&]*"))
                .expect("form mask pattern is built from escaped keys")
        });
        Self { re, mask: mask.into() }
    }

    /// Create the rule configured by [`MaskConfig::form_keys`].
    pub fn from_config(config: &MaskConfig) -> Self {
        Self::new(&config.form_keys, &config.mask, config.case_insensitive)
    }
}

impl MaskRule for FormKeyMask {
    fn apply(&self, text: &str) -> Result<String, Error> {
        let Some(re) = &self.re else {
            return Ok(text.to_string());
        };
        Ok(re
            .replace_all(text, |caps: &regex::Captures<'_>| {
                format!("{}{}", &caps[1], self.mask)
            })
            .into_owned())
    }
}

/// Replaces every match of a user-supplied pattern with the marker.
///
/// Escape hatch for masking needs the key-based rules do not cover (bearer
/// tokens in free text, PAN-shaped numbers, …).
#[derive(Clone, Debug)]
pub struct RegexMask {
    re: Regex,
    mask: String,
}

impl RegexMask {
    /// Create a rule from a raw regular expression.
    pub fn new(pattern: &str, mask: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            re: Regex::new(pattern)?,
            mask: mask.into(),
        })
    }
}

impl MaskRule for RegexMask {
    fn apply(&self, text: &str) -> Result<String, Error> {
        Ok(self.re.replace_all(text, self.mask.as_str()).into_owned())
    }
}

/// Default URI rule list for a mask configuration.
pub(crate) fn uri_rules(config: &MaskConfig) -> MaskRules {
    vec![Arc::new(QueryParamMask::from_config(config))]
}

/// Default body rule list for a mask configuration: JSON keys then form keys.
pub(crate) fn body_rules(config: &MaskConfig) -> MaskRules {
    vec![
        Arc::new(JsonKeyMask::from_config(config)),
        Arc::new(FormKeyMask::from_config(config)),
    ]
}
