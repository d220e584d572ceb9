use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::{describe_transport_error, CategorySource, WordPressClient, CREATE_POST_PATH};
use crate::error::AppError;

pub const DEFAULT_POST_STATUS: &str = "publish";

/// Keyword rule: any keyword found in the article implies `tag`.
struct TagRule {
    tag: &'static str,
    keywords: &'static [&'static str],
}

const TAG_RULES: &[TagRule] = &[
    TagRule {
        tag: "सुनको मूल्य",
        keywords: &["सुनको मूल्य", "सुनको भाउ", "सुनचाँदी", "gold price"],
    },
    TagRule {
        tag: "विदेशी मुद्रा",
        keywords: &["डलर", "विनिमय दर", "dollar", "exchange rate"],
    },
    TagRule {
        tag: "शेयर बजार",
        keywords: &["नेप्से", "शेयर बजार", "nepse", "share market"],
    },
    TagRule {
        tag: "पेट्रोलियम",
        keywords: &["पेट्रोल", "डिजेल", "आयल निगम", "petrol", "diesel"],
    },
    TagRule {
        tag: "मौसम",
        keywords: &["मौसम", "वर्षा", "weather"],
    },
];

/// Article submitted for publishing
#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    /// First line is the title, the rest is the body
    pub article_text: String,
    pub featured_image_id: Option<i64>,
    pub category_names: Vec<String>,
    pub tag_names: Vec<String>,
    pub post_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Success { permalink: String, post_id: Option<i64> },
    Error(String),
}

#[derive(Debug, Serialize)]
struct CreatePostPayload<'a> {
    title: &'a str,
    content: &'a str,
    #[serde(rename = "wpToken")]
    wp_token: &'a str,
    post_status: &'a str,
    #[serde(rename = "catId", skip_serializing_if = "String::is_empty")]
    cat_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    tags: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    featured_image_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CreatePostResponse {
    status: Option<String>,
    permalink: Option<String>,
    #[serde(rename = "postId")]
    post_id: Option<serde_json::Value>,
    msg: Option<String>,
}

/// Builds and submits posts to the CMS plugin endpoint
#[derive(Clone)]
pub struct Publisher {
    wordpress: WordPressClient,
    categories: CategorySource,
    default_status: String,
}

impl Publisher {
    pub fn new(wordpress: WordPressClient, categories: CategorySource) -> Self {
        Self {
            wordpress,
            categories,
            default_status: DEFAULT_POST_STATUS.to_string(),
        }
    }

    pub fn with_default_status(mut self, status: impl Into<String>) -> Self {
        self.default_status = status.into();
        self
    }

    /// Publish one article.
    ///
    /// Only a malformed title/body is returned as `Err`; everything that goes
    /// wrong talking to the CMS comes back as [`PublishOutcome::Error`].
    pub async fn publish(&self, request: PublishRequest) -> Result<PublishOutcome, AppError> {
        let (title, body) = split_title_body(&request.article_text)?;
        let category_ids = self.resolve_categories(&request.category_names).await;
        let tags = infer_tags(&format!("{}\n{}", title, body), &request.tag_names);
        let post_status = request
            .post_status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.default_status.as_str());

        let payload = CreatePostPayload {
            title: &title,
            content: &body,
            wp_token: self.wordpress.api_token(),
            post_status,
            cat_id: category_ids.iter().map(i64::to_string).collect::<Vec<_>>().join(","),
            tags: tags.join(", "),
            featured_image_id: request.featured_image_id,
        };

        let url = self.wordpress.endpoint(CREATE_POST_PATH);
        info!(
            title = %title,
            categories = ?category_ids,
            tags = ?tags,
            "Publishing news to {}",
            url
        );

        let response = match self.wordpress.http().post(&url).json(&payload).send().await {
            Ok(resp) => resp,
            Err(e) => {
                let detail = describe_transport_error(&e);
                error!("Publishing failed: {}", detail);
                return Ok(PublishOutcome::Error(detail));
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => return Ok(PublishOutcome::Error(describe_transport_error(&e))),
        };

        if status != reqwest::StatusCode::OK {
            error!("WordPress returned HTTP {}: {}", status, text);
            return Ok(PublishOutcome::Error(format!("HTTP Status Code {}: {}", status.as_u16(), text)));
        }

        let parsed: CreatePostResponse = match serde_json::from_str(&text) {
            Ok(p) => p,
            Err(e) => {
                error!("Could not decode WordPress JSON response ({}): {}", e, text);
                return Ok(PublishOutcome::Error(format!(
                    "Could not decode JSON response. Raw response: {}",
                    text
                )));
            }
        };

        if parsed.status.as_deref() == Some("success") {
            let post_id = parsed.post_id.as_ref().and_then(json_to_i64);
            let permalink = parsed.permalink.unwrap_or_default();
            info!(post_id = ?post_id, "News published successfully: {}", permalink);
            Ok(PublishOutcome::Success { permalink, post_id })
        } else {
            let msg = parsed.msg.unwrap_or_else(|| "Unknown error".to_string());
            error!("Error publishing news: {}", msg);
            Ok(PublishOutcome::Error(msg))
        }
    }

    async fn resolve_categories(&self, names: &[String]) -> Vec<i64> {
        if names.is_empty() {
            return Vec::new();
        }
        match &self.categories {
            CategorySource::Static(map) => map.resolve(names),
            CategorySource::Live => match self.wordpress.list_categories().await {
                Ok(categories) => super::CategoryMap::from(categories).resolve(names),
                Err(e) => {
                    warn!("Category lookup failed, publishing without categories: {}", e);
                    Vec::new()
                }
            },
        }
    }
}

/// Split on the first line break into (title, body), both trimmed and non-empty.
pub fn split_title_body(text: &str) -> Result<(String, String), AppError> {
    let (title, body) = text
        .split_once('\n')
        .ok_or_else(|| AppError::invalid("Article must have a title line followed by a body"))?;
    let (title, body) = (title.trim(), body.trim());
    if title.is_empty() {
        return Err(AppError::invalid("Article title (first line) is empty"));
    }
    if body.is_empty() {
        return Err(AppError::invalid("Article body is empty"));
    }
    Ok((title.to_string(), body.to_string()))
}

/// Requested tags (trimmed, de-duplicated) followed by keyword-inferred tags not already present.
pub fn infer_tags(text: &str, requested: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::with_capacity(requested.len() + 1);
    for tag in requested.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }

    let haystack = text.to_lowercase();
    for rule in TAG_RULES {
        if rule.keywords.iter().any(|k| haystack.contains(k)) && !tags.iter().any(|t| t == rule.tag) {
            tags.push(rule.tag.to_string());
        }
    }
    tags
}

fn json_to_i64(v: &serde_json::Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_first_line() {
        let (title, body) = split_title_body("Title\nLine1\nLine2").unwrap();
        assert_eq!(title, "Title");
        assert_eq!(body, "Line1\nLine2");
    }

    #[test]
    fn missing_line_break_is_invalid() {
        assert!(matches!(split_title_body("Only a title"), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn blank_title_or_body_is_invalid() {
        assert!(split_title_body("   \nbody").is_err());
        assert!(split_title_body("title\n  \n ").is_err());
    }

    #[test]
    fn gold_keyword_infers_exactly_one_tag() {
        let tags = infer_tags("आज सुनको मूल्य बढ्यो\nप्रतितोला एक लाख ६० हजार पुगेको छ।", &[]);
        assert_eq!(tags, vec!["सुनको मूल्य".to_string()]);
    }

    #[test]
    fn no_keyword_keeps_requested_tags() {
        let requested = vec!["राजनीति".to_string(), "संसद".to_string()];
        let tags = infer_tags("संसद बैठक\nआज बस्ने भएको छ।", &requested);
        assert_eq!(tags, requested);
    }

    #[test]
    fn inferred_tag_already_requested_is_not_duplicated() {
        let requested = vec!["विदेशी मुद्रा".to_string(), "विदेशी मुद्रा".to_string()];
        let tags = infer_tags("Dollar rate rises\nThe US Dollar gained today.", &requested);
        assert_eq!(tags, vec!["विदेशी मुद्रा".to_string()]);
    }

    #[test]
    fn english_keywords_match_case_insensitively() {
        let tags = infer_tags("NEPSE closes higher\nShare Market update", &[]);
        assert_eq!(tags, vec!["शेयर बजार".to_string()]);
    }

    #[test]
    fn post_id_accepts_number_or_string() {
        assert_eq!(json_to_i64(&serde_json::json!(42)), Some(42));
        assert_eq!(json_to_i64(&serde_json::json!("42")), Some(42));
        assert_eq!(json_to_i64(&serde_json::json!(null)), None);
    }
}
