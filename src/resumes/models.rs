use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

/// Resume database row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Resume {
    pub id: String,
    pub name: String,
    pub major: String,
    pub graduation_year: String,
    pub pdf_url: String,
    pub s3_key: String,
    pub uploaded_by: String,
    pub is_active: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields returned by the metadata extractor. Every field is best-effort.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExtractedMetadata {
    #[serde(default, deserialize_with = "loose_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub major: Option<String>,
    #[serde(
        default,
        alias = "graduationYear",
        alias = "graduation_year",
        deserialize_with = "loose_string"
    )]
    pub graduation_year: Option<String>,
    #[serde(default, deserialize_with = "loose_list")]
    pub companies: Vec<String>,
    #[serde(default, alias = "skills", deserialize_with = "loose_list")]
    pub keywords: Vec<String>,
}

/// Accepts strings, numbers or null (models often answer `2024` instead of `"2024"`)
fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts an array of strings (non-string entries skipped) or null
fn loose_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Some(serde_json::Value::String(s)) => crate::common::split_comma_list(&s),
        _ => Vec::new(),
    })
}

/// Caller-supplied values that take precedence over extracted ones
#[derive(Debug, Clone, Default)]
pub struct UploadOverrides {
    pub name: Option<String>,
    pub major: Option<String>,
    pub graduation_year: Option<String>,
    /// Comma-separated
    pub companies: Option<String>,
    /// Comma-separated
    pub keywords: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMetadata {
    pub name: String,
    pub major: String,
    pub graduation_year: String,
    pub companies: Vec<String>,
    pub keywords: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponseData {
    pub id: String,
    pub name: String,
    pub major: String,
    pub graduation_year: String,
    pub pdf_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsing_warning: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub companies: Vec<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSummary {
    pub id: String,
    pub name: String,
    pub major: String,
    pub graduation_year: String,
    pub pdf_url: String,
    pub companies: Vec<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeDetail {
    #[serde(flatten)]
    pub summary: ResumeSummary,
    pub uploaded_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub query: Option<String>,
    pub major: Option<String>,
    pub company: Option<String>,
    pub graduation_year: Option<String>,
}

/// Tag list in an update body: either `"a, b"` or `["a", "b"]`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagListInput {
    Csv(String),
    List(Vec<String>),
}

impl TagListInput {
    pub fn into_entries(self) -> Vec<String> {
        match self {
            TagListInput::Csv(raw) => crate::common::split_comma_list(&raw),
            TagListInput::List(items) => items,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResumeRequest {
    pub name: Option<String>,
    pub major: Option<String>,
    pub graduation_year: Option<String>,
    pub companies: Option<TagListInput>,
    pub keywords: Option<TagListInput>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiltersResponse {
    pub majors: Vec<String>,
    pub graduation_years: Vec<String>,
    pub companies: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLink {
    pub url: String,
    pub expires_in_seconds: u64,
}
