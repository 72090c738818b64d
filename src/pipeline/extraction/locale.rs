//! Locale-aware number normalisation for the multilingual strategy.
//!
//! Rewrites decimal commas and locale thousands separators into the plain
//! `1234.5` form the normalizer parses. No translation is attempted.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Space-like thousands separators (regular, no-break, narrow no-break).
static SPACE_GROUPS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,3})((?:[ \u{00A0}\u{202F}]\d{3})+)\b").expect("static regex")
});
static DOT_GROUPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,3})((?:\.\d{3})+)\b").expect("static regex"));
static DECIMAL_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d),(\d+)").expect("static regex"));
static SPACE_BEFORE_PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)[\u{00A0}\u{202F}]%").expect("static regex"));

/// Languages writing `12,5` for twelve and a half.
const DECIMAL_COMMA_LANGUAGES: &[&str] = &["fra", "deu", "spa", "ita", "nld", "por"];
/// Languages writing `1.250` for one thousand two hundred fifty.
const DOT_GROUP_LANGUAGES: &[&str] = &["deu", "spa", "ita", "nld", "por"];

#[derive(Debug, Clone, PartialEq)]
pub struct LocaleNormalization {
    pub text: String,
    pub replacements: usize,
}

pub fn normalize_locale_numbers(text: &str, language: Option<&str>) -> LocaleNormalization {
    let Some(lang) = language.filter(|l| DECIMAL_COMMA_LANGUAGES.contains(l)) else {
        return LocaleNormalization {
            text: text.to_string(),
            replacements: 0,
        };
    };

    let mut replacements = 0;
    let mut current = text.to_string();

    rewrite_all(&SPACE_GROUPS, &mut current, &mut replacements, strip_groups);
    if DOT_GROUP_LANGUAGES.contains(&lang) {
        rewrite_all(&DOT_GROUPS, &mut current, &mut replacements, strip_groups);
    }
    rewrite_all(&DECIMAL_COMMA, &mut current, &mut replacements, decimal_point);
    rewrite_all(&SPACE_BEFORE_PERCENT, &mut current, &mut replacements, tight_percent);

    LocaleNormalization {
        text: current,
        replacements,
    }
}

fn rewrite_all(
    re: &Regex,
    text: &mut String,
    replacements: &mut usize,
    rewrite: fn(&Captures<'_>) -> String,
) {
    let count = re.find_iter(text.as_str()).count();
    if count > 0 {
        *replacements += count;
        let rewritten = re.replace_all(text.as_str(), rewrite).into_owned();
        *text = rewritten;
    }
}

fn strip_groups(caps: &Captures<'_>) -> String {
    let groups: String = caps[2].chars().filter(|c| c.is_ascii_digit()).collect();
    format!("{}{}", &caps[1], groups)
}

fn decimal_point(caps: &Captures<'_>) -> String {
    format!("{}.{}", &caps[1], &caps[2])
}

fn tight_percent(caps: &Captures<'_>) -> String {
    format!("{}%", &caps[1])
}
