//! Regular expression transformers

use std::collections::HashMap;
use std::sync::RwLock;

use regex::{Captures, Regex};
use serde_json::Value;

use super::{Parameters, TransformError, Transformer};

pub const PATTERN_PARAMETER: &str = "pattern";
pub const GROUP_PARAMETER: &str = "group";
pub const REPLACEMENT_PARAMETER: &str = "replacement";
pub const ON_MISS_PARAMETER: &str = "on-miss";
pub const VALUE_PARAMETER: &str = "value";

/// Compiled patterns, keyed by source text
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: RwLock<HashMap<String, Regex>>,
}

impl PatternCache {
    pub fn get(&self, pattern: &str) -> Result<Regex, TransformError> {
        if let Ok(compiled) = self.compiled.read() {
            if let Some(regex) = compiled.get(pattern) {
                return Ok(regex.clone());
            }
        }

        let regex = Regex::new(pattern).map_err(|source| TransformError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        if let Ok(mut compiled) = self.compiled.write() {
            compiled.insert(pattern.to_string(), regex.clone());
        }
        Ok(regex)
    }
}

/// What `regex-match` returns when the pattern does not match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnMiss {
    Keep,
    Null,
}

/// `regex-match`: extract part of the input.
///
/// Parameters: `pattern` (required); `replacement` switches to
/// replace-all; `group` selects a capture group by index or name, otherwise
/// the first group is used when the pattern has one, else the whole match;
/// `on-miss=keep|null` decides the result when nothing matches (default
/// `keep`).
#[derive(Debug, Default)]
pub struct RegexMatch {
    patterns: PatternCache,
}

impl RegexMatch {
    fn selected<'h>(captures: &Captures<'h>, group: Option<&str>) -> &'h str {
        let whole = captures.get(0).map_or("", |m| m.as_str());
        let chosen = match group {
            Some(group) => match group.parse::<usize>() {
                Ok(index) => captures.get(index),
                Err(_) => captures.name(group),
            },
            None if captures.len() > 1 => captures.get(1),
            None => None,
        };
        chosen.map_or(whole, |m| m.as_str())
    }
}

impl Transformer for RegexMatch {
    fn name(&self) -> &str {
        "regex-match"
    }

    fn transform(&self, input: Value, parameters: &Parameters) -> Result<Value, TransformError> {
        let text = match input {
            Value::String(ref s) if !s.trim().is_empty() => s.as_str(),
            _ => return Ok(input),
        };

        let regex = self.patterns.get(parameters.require(PATTERN_PARAMETER)?)?;

        if let Some(replacement) = parameters.get(REPLACEMENT_PARAMETER) {
            return Ok(Value::String(regex.replace_all(text, replacement).into_owned()));
        }

        let on_miss = match parameters.get(ON_MISS_PARAMETER) {
            None => OnMiss::Keep,
            Some(v) if v.eq_ignore_ascii_case("keep") => OnMiss::Keep,
            Some(v) if v.eq_ignore_ascii_case("null") => OnMiss::Null,
            Some(v) => {
                return Err(TransformError::InvalidParameter {
                    name: ON_MISS_PARAMETER,
                    value: v.to_string(),
                })
            }
        };

        let selected = regex
            .captures(text)
            .map(|captures| Self::selected(&captures, parameters.get(GROUP_PARAMETER)).to_string());

        match selected {
            Some(value) => Ok(Value::String(value)),
            None if on_miss == OnMiss::Null => Ok(Value::Null),
            None => Ok(input),
        }
    }
}

/// `regex-replace`: substitute every match of `pattern` with `value`
/// (default empty). Blank input and a result that is blank after trimming
/// both become null.
#[derive(Debug, Default)]
pub struct RegexReplace {
    patterns: PatternCache,
}

impl Transformer for RegexReplace {
    fn name(&self) -> &str {
        "regex-replace"
    }

    fn transform(&self, input: Value, parameters: &Parameters) -> Result<Value, TransformError> {
        let text = match &input {
            Value::String(s) if !s.trim().is_empty() => s,
            _ => return Ok(Value::Null),
        };

        let regex = self.patterns.get(parameters.require(PATTERN_PARAMETER)?)?;
        let replacement = parameters.get(VALUE_PARAMETER).unwrap_or_default();
        let result = regex.replace_all(text, replacement);

        if result.trim().is_empty() {
            Ok(Value::Null)
        } else {
            Ok(Value::String(result.into_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(raw: &str) -> Parameters {
        Parameters::parse(raw).unwrap()
    }

    #[test]
    fn test_match_first_group() {
        let out = RegexMatch::default()
            .transform(json!("/sigaa/centro.jsf?lc=pt_BR&id=1234"), &params(r"pattern=[?&]id=(\d+)"))
            .unwrap();
        assert_eq!(out, json!("1234"));
    }

    #[test]
    fn test_match_named_group() {
        let p = Parameters::new()
            .with(PATTERN_PARAMETER, r"^(?P<code>[A-Z]+)\s*-\s*(?P<name>.*)$")
            .with(GROUP_PARAMETER, "name");
        let out = RegexMatch::default().transform(json!("CCEN - Centro de Ciências"), &p).unwrap();
        assert_eq!(out, json!("Centro de Ciências"));
    }

    #[test]
    fn test_match_whole_when_no_groups() {
        let out = RegexMatch::default()
            .transform(json!("order 42 shipped"), &params(r"pattern=\d+"))
            .unwrap();
        assert_eq!(out, json!("42"));
    }

    #[test]
    fn test_match_miss_policies() {
        let t = RegexMatch::default();
        assert_eq!(t.transform(json!("abc"), &params(r"pattern=\d+")).unwrap(), json!("abc"));
        assert_eq!(
            t.transform(json!("abc"), &params(r"pattern=\d+;on-miss=null")).unwrap(),
            Value::Null
        );
        assert!(t.transform(json!("abc"), &params(r"pattern=\d+;on-miss=maybe")).is_err());
    }

    #[test]
    fn test_match_with_replacement() {
        let out = RegexMatch::default()
            .transform(json!("a1b2"), &params(r"pattern=\d;replacement=#"))
            .unwrap();
        assert_eq!(out, json!("a#b#"));
    }

    #[test]
    fn test_match_requires_pattern() {
        let err = RegexMatch::default().transform(json!("abc"), &Parameters::new()).unwrap_err();
        assert!(matches!(err, TransformError::MissingParameter("pattern")));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = RegexMatch::default().transform(json!("abc"), &params("pattern=(")).unwrap_err();
        assert!(matches!(err, TransformError::InvalidPattern { .. }));
    }

    #[test]
    fn test_replace_removes_phrase() {
        let p = Parameters::new().with(PATTERN_PARAMETER, r"(?i)\bnão informado\b");
        let t = RegexReplace::default();
        assert_eq!(
            t.transform(json!("Endereço: Não Informado"), &p).unwrap(),
            json!("Endereço: ")
        );
        assert_eq!(t.transform(json!(" não informado "), &p).unwrap(), Value::Null);
        assert_eq!(t.transform(json!("   "), &p).unwrap(), Value::Null);
    }

    #[test]
    fn test_replace_with_value() {
        let p = params(r"pattern=\s*\([A-Z]+\)$;value=");
        let out = RegexReplace::default()
            .transform(json!("Departamento de Física (DF)"), &p)
            .unwrap();
        assert_eq!(out, json!("Departamento de Física"));
    }
}
