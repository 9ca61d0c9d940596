//! Reconciles caller overrides with extracted metadata.
//!
//! Precedence for every field is override, then extracted value, then a
//! sentinel default. Persisted text fields are never blank.

use super::models::{ExtractedMetadata, NormalizedMetadata, UploadOverrides};
use crate::common::{non_blank, split_comma_list, truncate_with_ellipsis};
use crate::services::SettingsService;
use std::collections::HashSet;
use tracing::warn;

pub const MAX_FIELD_CHARS: usize = 255;
pub const MAX_LIST_ENTRIES: usize = 100;
pub const UNSPECIFIED: &str = "Unspecified";

const DEFAULT_ABBREVIATIONS: &[&str] = &[
    "USA", "US", "UK", "UAE", "EU", "LLC", "LLP", "PLC", "IBM", "AWS", "HP", "GE", "AMD", "SAP",
    "EY", "KPMG", "BCG", "JP", "NASA", "NSF", "NIH", "IT", "AI", "HR",
];

const DEFAULT_MINOR_WORDS: &[&str] = &[
    "a", "an", "the", "and", "but", "or", "nor", "for", "so", "yet", "as", "at", "by", "in", "of",
    "off", "on", "per", "to", "up", "via", "with", "from", "into",
];

/// Casing exceptions applied to company names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCaseRules {
    abbreviations: HashSet<String>,
    minor_words: HashSet<String>,
}

impl Default for NameCaseRules {
    fn default() -> Self {
        Self::from_lists(
            DEFAULT_ABBREVIATIONS.iter().copied(),
            DEFAULT_MINOR_WORDS.iter().copied(),
        )
    }
}

impl NameCaseRules {
    pub fn from_lists<'a, A, M>(abbreviations: A, minor_words: M) -> Self
    where
        A: IntoIterator<Item = &'a str>,
        M: IntoIterator<Item = &'a str>,
    {
        Self {
            abbreviations: abbreviations
                .into_iter()
                .map(|w| w.trim().to_uppercase())
                .filter(|w| !w.is_empty())
                .collect(),
            minor_words: minor_words
                .into_iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    /// Reads `company_abbreviations` and `company_minor_words`; a missing or
    /// unreadable setting keeps the built-in list for that half.
    pub async fn from_settings(settings: &SettingsService) -> Self {
        let abbreviations = read_list_setting(settings, "company_abbreviations").await;
        let minor_words = read_list_setting(settings, "company_minor_words").await;

        let defaults = Self::default();
        Self {
            abbreviations: abbreviations
                .map(|list| Self::from_lists(list.iter().map(String::as_str), []).abbreviations)
                .unwrap_or(defaults.abbreviations),
            minor_words: minor_words
                .map(|list| Self::from_lists([], list.iter().map(String::as_str)).minor_words)
                .unwrap_or(defaults.minor_words),
        }
    }

    /// Title-cases a company name word by word
    pub fn title_case(&self, name: &str) -> String {
        name.split_whitespace()
            .enumerate()
            .map(|(index, word)| self.case_word(index, word))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn case_word(&self, index: usize, word: &str) -> String {
        let core: String = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_uppercase();

        if !core.is_empty() && self.abbreviations.contains(&core) {
            return word.to_uppercase();
        }

        let lower = word.to_lowercase();
        if index > 0 && self.minor_words.contains(&lower) {
            return lower;
        }

        let mut chars = lower.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

async fn read_list_setting(settings: &SettingsService, key: &str) -> Option<Vec<String>> {
    match settings.get_setting(key).await {
        Ok(Some(raw)) if !raw.trim().is_empty() => Some(split_comma_list(&raw)),
        Ok(_) => None,
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to read casing setting, using defaults");
            None
        }
    }
}

/// Trims, caps and deduplicates (case-insensitively, first seen wins)
fn normalize_list<F>(
    entries: Vec<String>,
    label: &str,
    transform: F,
    warnings: &mut Vec<String>,
) -> Vec<String>
where
    F: Fn(&str) -> String,
{
    let mut cleaned: Vec<String> = entries
        .iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .map(|e| truncate_with_ellipsis(&transform(e), MAX_FIELD_CHARS))
        .collect();

    if cleaned.len() > MAX_LIST_ENTRIES {
        warnings.push(format!(
            "Only the first {} {} were kept ({} supplied)",
            MAX_LIST_ENTRIES,
            label,
            cleaned.len()
        ));
        cleaned.truncate(MAX_LIST_ENTRIES);
    }

    let mut seen = HashSet::new();
    cleaned.retain(|entry| seen.insert(entry.to_lowercase()));
    cleaned
}

pub fn normalize_companies(
    entries: Vec<String>,
    rules: &NameCaseRules,
    warnings: &mut Vec<String>,
) -> Vec<String> {
    normalize_list(entries, "companies", |e| rules.title_case(e), warnings)
}

pub fn normalize_keywords(entries: Vec<String>, warnings: &mut Vec<String>) -> Vec<String> {
    normalize_list(entries, "keywords", str::to_string, warnings)
}

/// Truncates a free-text field, or returns `None` when it is blank
pub fn normalize_text(value: Option<&str>) -> Option<String> {
    non_blank(value).map(|v| truncate_with_ellipsis(v, MAX_FIELD_CHARS))
}

fn pick<'a>(override_value: Option<&'a str>, extracted: Option<&'a str>) -> Option<&'a str> {
    non_blank(override_value).or_else(|| non_blank(extracted))
}

fn pick_list(override_value: Option<&str>, extracted: &[String]) -> Vec<String> {
    match non_blank(override_value) {
        Some(raw) => split_comma_list(raw),
        None => extracted.to_vec(),
    }
}

pub fn normalize(
    overrides: &UploadOverrides,
    extracted: &ExtractedMetadata,
    rules: &NameCaseRules,
    now_millis: i64,
) -> NormalizedMetadata {
    let mut warnings = Vec::new();

    let name = normalize_text(pick(
        overrides.name.as_deref(),
        extracted.name.as_deref(),
    ))
    .unwrap_or_else(|| format!("Unknown_Resume_{}", now_millis));

    let major = normalize_text(pick(
        overrides.major.as_deref(),
        extracted.major.as_deref(),
    ))
    .unwrap_or_else(|| UNSPECIFIED.to_string());

    // An over-long year is junk rather than a truncatable value
    let graduation_year = pick(
        overrides.graduation_year.as_deref(),
        extracted.graduation_year.as_deref(),
    )
    .filter(|year| year.chars().count() <= MAX_FIELD_CHARS)
    .map(str::to_string)
    .unwrap_or_else(|| UNSPECIFIED.to_string());

    let companies = normalize_companies(
        pick_list(overrides.companies.as_deref(), &extracted.companies),
        rules,
        &mut warnings,
    );

    let keywords = normalize_keywords(
        pick_list(overrides.keywords.as_deref(), &extracted.keywords),
        &mut warnings,
    );

    NormalizedMetadata {
        name,
        major,
        graduation_year,
        companies,
        keywords,
        warnings,
    }
}
