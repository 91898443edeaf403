use chrono::{DateTime, NaiveDateTime, Utc};
use validator::{Validate, ValidationErrors};

use murmur_types::api::FeedParams;
use murmur_types::models::{FeedFilter, SortOrder};

use crate::error::ApiError;

/// Checks request payloads and turns raw feed query strings into a
/// [`FeedFilter`]. Lives in the application state and is handed to the
/// extractors that need it.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    pub max_limit: u32,
    pub max_tags: usize,
    pub max_search_len: usize,
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self {
            max_limit: FeedFilter::MAX_LIMIT,
            max_tags: FeedFilter::MAX_TAGS,
            max_search_len: FeedFilter::MAX_SEARCH_LEN,
        }
    }
}

impl RequestValidator {
    pub fn validate<T: Validate>(&self, payload: &T) -> Result<(), ApiError> {
        payload
            .validate()
            .map_err(|errors| ApiError::Validation(describe(&errors)))
    }

    pub fn feed_filter(&self, params: FeedParams) -> Result<FeedFilter, ApiError> {
        let mut filter = FeedFilter::default();

        if let Some(raw) = params.limit {
            filter.limit = raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| (1..=self.max_limit).contains(n))
                .ok_or_else(|| {
                    invalid(format!("limit must be between 1 and {}", self.max_limit))
                })?;
        }

        if let Some(raw) = params.offset {
            filter.offset = raw
                .trim()
                .parse::<u32>()
                .map_err(|_| invalid("offset must be a non-negative integer".into()))?;
        }

        if let Some(raw) = params.sort {
            filter.sort = match raw.trim() {
                "asc" => SortOrder::Asc,
                "desc" => SortOrder::Desc,
                _ => return Err(invalid("sort must be asc or desc".into())),
            };
        }

        if let Some(raw) = params.tags {
            filter.tags = raw
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
            if filter.tags.len() > self.max_tags {
                return Err(invalid(format!("at most {} tags are allowed", self.max_tags)));
            }
        }

        if let Some(raw) = params.search {
            if raw.chars().count() > self.max_search_len {
                return Err(invalid(format!(
                    "search must be at most {} characters",
                    self.max_search_len
                )));
            }
            filter.search = raw;
        }

        if let Some(raw) = params.since {
            filter.since = Some(parse_time(&raw).ok_or_else(|| invalid(time_hint("since")))?);
        }
        if let Some(raw) = params.until {
            filter.until = Some(parse_time(&raw).ok_or_else(|| invalid(time_hint("until")))?);
        }

        Ok(filter)
    }
}

fn invalid(message: String) -> ApiError {
    ApiError::Validation(message)
}

fn time_hint(field: &str) -> String {
    format!("{field} must be RFC 3339 or YYYY-MM-DD HH:MM:SS")
}

/// RFC 3339, or a bare `YYYY-MM-DD HH:MM:SS` taken as UTC.
fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|t| t.and_utc())
        })
}

/// `field: message` pairs, sorted by field so the output is stable.
fn describe(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => format!("{field}: {message}"),
                None => format!("{field}: failed {} check", e.code),
            })
        })
        .collect();
    parts.sort();
    parts.join("; ")
}
