//! Letter-case transformers

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{Parameters, TransformError, Transformer};

pub const CASING_PARAMETER: &str = "casing";

/// Words kept lowercase inside a title, unless they open it
const SMALL_WORDS: &[&str] = &[
    "a", "à", "às", "ao", "aos", "da", "das", "de", "do", "dos", "em", "no", "nos", "na", "nas",
    "e", "ou", "mas", "nem", "como", "por", "para", "com", "sem", "sob", "sobre", "até", "depois",
    "antes",
];

static ROMAN_NUMERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^M{0,4}(CM|CD|D?C{0,3})(XC|XL|L?X{0,3})(IX|IV|V?I{0,3})$")
        .expect("roman numeral pattern is valid")
});

static PUNCTUATED_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\p{P}*)([\p{L}\p{N}\-]+)(\p{P}*)$").expect("punctuated word pattern is valid")
});

fn is_roman_numeral(word: &str) -> bool {
    !word.is_empty() && ROMAN_NUMERAL.is_match(word)
}

fn is_small_word(word: &str) -> bool {
    let lowered = word.to_lowercase();
    SMALL_WORDS.contains(&lowered.as_str())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Split leading and trailing punctuation off a word
fn split_punctuation(word: &str) -> (&str, &str, &str) {
    match PUNCTUATED_WORD.captures(word) {
        Some(c) => match (c.get(1), c.get(2), c.get(3)) {
            (Some(prefix), Some(core), Some(suffix)) => (prefix.as_str(), core.as_str(), suffix.as_str()),
            _ => ("", word, ""),
        },
        None => ("", word, ""),
    }
}

/// Title-case a phrase.
///
/// Every word is capitalized except small connecting words after the first,
/// Roman numerals are upper-cased, and the parts of hyphenated words are
/// handled separately. Runs of spaces collapse to one.
pub fn title_case(input: &str) -> String {
    input
        .split(' ')
        .filter(|w| !w.is_empty())
        .enumerate()
        .map(|(i, word)| {
            let (prefix, core, suffix) = split_punctuation(word);
            let parts: Vec<String> = core
                .split('-')
                .enumerate()
                .map(|(j, part)| {
                    if is_roman_numeral(part) {
                        part.to_uppercase()
                    } else if i > 0 && j == 0 && is_small_word(part) {
                        part.to_lowercase()
                    } else {
                        capitalize(part)
                    }
                })
                .collect();
            format!("{}{}{}", prefix, parts.join("-"), suffix)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `title-case`
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleCase;

impl Transformer for TitleCase {
    fn name(&self) -> &str {
        "title-case"
    }

    fn transform(&self, input: Value, _parameters: &Parameters) -> Result<Value, TransformError> {
        Ok(match input {
            Value::String(s) if !s.trim().is_empty() => Value::String(title_case(&s)),
            other => other,
        })
    }
}

/// Target casing for `text-casing`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCasing {
    Upper,
    Lower,
    Title,
}

impl TextCasing {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextCasing::Upper => "upper",
            TextCasing::Lower => "lower",
            TextCasing::Title => "title",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [TextCasing::Upper, TextCasing::Lower, TextCasing::Title]
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(value.trim()))
    }

    pub fn apply(&self, input: &str) -> String {
        match self {
            TextCasing::Upper => input.to_uppercase(),
            TextCasing::Lower => input.to_lowercase(),
            TextCasing::Title => title_case(input),
        }
    }
}

/// `text-casing`: `casing=upper|lower|title`
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCasingTransformer;

impl Transformer for TextCasingTransformer {
    fn name(&self) -> &str {
        "text-casing"
    }

    fn transform(&self, input: Value, parameters: &Parameters) -> Result<Value, TransformError> {
        let raw = parameters.require(CASING_PARAMETER)?;
        let casing = TextCasing::parse(raw).ok_or_else(|| TransformError::InvalidParameter {
            name: CASING_PARAMETER,
            value: raw.to_string(),
        })?;

        Ok(match input {
            Value::String(s) if !s.trim().is_empty() => Value::String(casing.apply(&s)),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_title_case_small_words() {
        assert_eq!(
            title_case("CENTRO DE CIÊNCIAS EXATAS E DA NATUREZA"),
            "Centro de Ciências Exatas e da Natureza"
        );
        assert_eq!(title_case("de volta ao lar"), "De Volta ao Lar");
    }

    #[test]
    fn test_title_case_roman_numerals() {
        assert_eq!(title_case("campus iv - litoral norte"), "Campus IV - Litoral Norte");
        assert_eq!(title_case("joão xxiii"), "João XXIII");
    }

    #[test]
    fn test_title_case_punctuation_and_hyphens() {
        assert_eq!(title_case("(engenharia) sócio-ambiental,"), "(Engenharia) Sócio-Ambiental,");
        assert_eq!(title_case("  muitos    espaços "), "Muitos Espaços");
    }

    #[test]
    fn test_text_casing() {
        let t = TextCasingTransformer;
        let upper = Parameters::new().with(CASING_PARAMETER, "Upper");
        assert_eq!(t.transform(json!("ccen"), &upper).unwrap(), json!("CCEN"));
        let title = Parameters::new().with(CASING_PARAMETER, "title");
        assert_eq!(t.transform(json!("rua das flores"), &title).unwrap(), json!("Rua das Flores"));
        assert!(t.transform(json!("x"), &Parameters::new()).is_err());
        let bad = Parameters::new().with(CASING_PARAMETER, "snake");
        assert!(matches!(
            t.transform(json!("x"), &bad),
            Err(TransformError::InvalidParameter { .. })
        ));
    }
}
