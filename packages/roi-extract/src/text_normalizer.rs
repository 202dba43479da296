//! Per-field cleanup of recognized text, keyed by what the field name suggests.
use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

/// Substrings marking identifier-like fields (card numbers, codes, staff IDs).
pub const IDENTIFIER_KEYWORDS: &[&str] = &["number", "num", "编号", "号码", "id", "证号", "编码", "工号"];

/// Substrings marking fields that hold a person's or entity's name.
pub const NAME_KEYWORDS: &[&str] = &["name", "姓名", "cname", "名称", "名字"];

static NO_PREFIX: OnceLock<Regex> = OnceLock::new();
static NOT_ALNUM: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_RUN: OnceLock<Regex> = OnceLock::new();

fn no_prefix() -> &'static Regex {
    NO_PREFIX.get_or_init(|| {
        RegexBuilder::new(r"^NO\.?\s*")
            .case_insensitive(true)
            .build()
            .expect("static pattern")
    })
}

fn not_alnum() -> &'static Regex {
    NOT_ALNUM.get_or_init(|| Regex::new(r"[^A-Z0-9]").expect("static pattern"))
}

fn whitespace_run() -> &'static Regex {
    WHITESPACE_RUN.get_or_init(|| Regex::new(r"\s+").expect("static pattern"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Identifier,
    PersonName,
    Generic,
}

impl FieldRole {
    /// Identifier keywords win over name keywords, so `name_id` is an identifier.
    pub fn classify(field_name: &str) -> Self {
        let lowered = field_name.to_lowercase();
        if IDENTIFIER_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            Self::Identifier
        } else if NAME_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            Self::PersonName
        } else {
            Self::Generic
        }
    }

    pub fn apply(self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }
        match self {
            Self::Identifier => clean_identifier(raw),
            Self::PersonName => clean_name(raw),
            Self::Generic => raw.to_string(),
        }
    }
}

/// Uppercases, drops a leading `NO`/`NO.` and keeps only `A-Z0-9`.
pub fn clean_identifier(text: &str) -> String {
    let upper = text.trim().to_uppercase();
    let without_prefix = no_prefix().replace(&upper, "");
    not_alnum().replace_all(&without_prefix, "").into_owned()
}

/// Removes all whitespace, including line breaks between recognized lines.
pub fn clean_name(text: &str) -> String {
    whitespace_run().replace_all(text.trim(), "").into_owned()
}

pub fn normalize(raw: &str, field_name: &str) -> String {
    FieldRole::classify(field_name).apply(raw)
}
