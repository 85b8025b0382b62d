//! Expand identifiers into fetch tasks via a URL template.
//!
//! The template carries exactly one `%s` placeholder, e.g.
//! `https://hacker-news.firebaseio.com/v0/item/%s.json`.

use std::time::{Duration, Instant};
use thiserror::Error;

const PLACEHOLDER: &str = "%s";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("url template has no `%s` placeholder: {0}")]
    MissingPlaceholder(String),
    #[error("url template has {count} `%s` placeholders, expected exactly one: {template}")]
    TooManyPlaceholders { template: String, count: usize },
    #[error("url template does not expand to a valid URL: {0}")]
    InvalidUrl(String),
}

/// Validated template, split around its placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    prefix: String,
    suffix: String,
}

impl UrlTemplate {
    /// Validate `template`: exactly one placeholder, and expanding it with a
    /// sample identifier must give a parseable absolute URL.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let count = template.matches(PLACEHOLDER).count();
        match count {
            0 => return Err(TemplateError::MissingPlaceholder(template.to_string())),
            1 => {}
            _ => {
                return Err(TemplateError::TooManyPlaceholders {
                    template: template.to_string(),
                    count,
                })
            }
        }
        let (prefix, suffix) = template
            .split_once(PLACEHOLDER)
            .ok_or_else(|| TemplateError::MissingPlaceholder(template.to_string()))?;
        let parsed = Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        };
        url::Url::parse(&parsed.expand("0"))
            .map_err(|e| TemplateError::InvalidUrl(format!("{template} ({e})")))?;
        Ok(parsed)
    }

    /// Substitute `id` for the placeholder. No escaping is applied.
    pub fn expand(&self, id: &str) -> String {
        let mut url = String::with_capacity(self.prefix.len() + id.len() + self.suffix.len());
        url.push_str(&self.prefix);
        url.push_str(id);
        url.push_str(&self.suffix);
        url
    }
}

impl std::fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.prefix, PLACEHOLDER, self.suffix)
    }
}

/// One unit of work: an identifier and the URL it resolves to.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub url: String,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
}

impl Task {
    /// Wall time of the last execution, if it ran to completion.
    pub fn elapsed(&self) -> Option<Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end.saturating_duration_since(start)),
            _ => None,
        }
    }
}

/// Builds tasks from identifiers. Pure; no I/O.
#[derive(Debug, Clone)]
pub struct TaskFactory {
    template: UrlTemplate,
}

impl TaskFactory {
    pub fn new(template: UrlTemplate) -> Self {
        Self { template }
    }

    pub fn template(&self) -> &UrlTemplate {
        &self.template
    }

    pub fn build(&self, id: &str) -> Task {
        Task {
            id: id.to_string(),
            url: self.template.expand(id),
            started_at: None,
            finished_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_substitutes_identifier() {
        let t = UrlTemplate::parse("https://hacker-news.firebaseio.com/v0/item/%s.json").unwrap();
        let task = TaskFactory::new(t).build("8863");
        assert_eq!(task.id, "8863");
        assert_eq!(task.url, "https://hacker-news.firebaseio.com/v0/item/8863.json");
        assert!(task.started_at.is_none());
        assert!(task.elapsed().is_none());
    }

    #[test]
    fn placeholder_at_end() {
        let t = UrlTemplate::parse("http://localhost:8080/items/%s").unwrap();
        assert_eq!(t.expand("a/b"), "http://localhost:8080/items/a/b");
        assert_eq!(t.to_string(), "http://localhost:8080/items/%s");
    }

    #[test]
    fn missing_placeholder_rejected() {
        assert!(matches!(
            UrlTemplate::parse("https://example.com/item.json"),
            Err(TemplateError::MissingPlaceholder(_))
        ));
    }

    #[test]
    fn two_placeholders_rejected() {
        match UrlTemplate::parse("https://example.com/%s/%s") {
            Err(TemplateError::TooManyPlaceholders { count, .. }) => assert_eq!(count, 2),
            other => panic!("expected TooManyPlaceholders, got {:?}", other),
        }
    }

    #[test]
    fn non_url_rejected() {
        assert!(matches!(
            UrlTemplate::parse("not a url %s"),
            Err(TemplateError::InvalidUrl(_))
        ));
    }

    #[test]
    fn build_is_deterministic() {
        let factory = TaskFactory::new(UrlTemplate::parse("https://example.com/%s").unwrap());
        assert_eq!(factory.build("x").url, factory.build("x").url);
    }
}
