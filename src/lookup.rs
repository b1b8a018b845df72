//! Bibliographic metadata lookup by ISBN.
//!
//! The catalog only consumes [`BookRecord`]s; where they come from is hidden
//! behind [`MetadataSource`] so the TUI can be driven by the Google Books
//! client in production and by canned records in tests.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;

use crate::config::LookupConfig;
use crate::error::{LibraryError, LibraryResult};
use crate::models::BookRecord;

/// Anything that can turn an ISBN into a normalized book record.
pub trait MetadataSource {
    /// Resolve `isbn` (already normalized). Misses and transport failures both
    /// come back as [`LibraryError::ExternalLookupFailed`].
    fn lookup(&self, isbn: &str) -> LibraryResult<BookRecord>;
}

/// Strip separators and validate the ISBN-10 / ISBN-13 check digit.
pub fn normalize_isbn(input: &str) -> LibraryResult<String> {
    let cleaned: String = input
        .chars()
        .filter(|ch| !matches!(ch, '-' | ' '))
        .map(|ch| ch.to_ascii_uppercase())
        .collect();

    let valid = match cleaned.len() {
        10 => is_valid_isbn10(&cleaned),
        13 => is_valid_isbn13(&cleaned),
        _ => false,
    };
    if valid {
        Ok(cleaned)
    } else {
        Err(LibraryError::InvalidIsbn {
            input: input.trim().to_string(),
        })
    }
}

fn is_valid_isbn10(value: &str) -> bool {
    let mut sum = 0;
    for (index, ch) in value.chars().enumerate() {
        let digit = match (index, ch) {
            (9, 'X') => 10,
            (_, ch) => match ch.to_digit(10) {
                Some(digit) => digit,
                None => return false,
            },
        };
        sum += digit * (10 - index as u32);
    }
    sum % 11 == 0
}

fn is_valid_isbn13(value: &str) -> bool {
    let mut sum = 0;
    for (index, ch) in value.chars().enumerate() {
        let Some(digit) = ch.to_digit(10) else {
            return false;
        };
        sum += if index % 2 == 0 { digit } else { digit * 3 };
    }
    sum % 10 == 0
}

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    #[serde(default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VolumeInfo {
    title: Option<String>,
    authors: Vec<String>,
    publisher: Option<String>,
    published_date: Option<String>,
    page_count: Option<i64>,
    description: Option<String>,
    language: Option<String>,
    categories: Vec<String>,
    industry_identifiers: Vec<IndustryIdentifier>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

impl VolumeInfo {
    /// ISBN-13 if present, otherwise ISBN-10.
    fn preferred_isbn(&self) -> Option<String> {
        let find = |kind: &str| {
            self.industry_identifiers
                .iter()
                .find(|id| id.kind == kind)
                .map(|id| id.identifier.clone())
        };
        find("ISBN_13").or_else(|| find("ISBN_10"))
    }

    fn into_record(self) -> Option<BookRecord> {
        let preferred_isbn = self.preferred_isbn()?;
        Some(BookRecord {
            title: self.title,
            authors: self.authors,
            publisher: self.publisher,
            published_date: self.published_date,
            page_count: self.page_count,
            description: self.description,
            language: self.language,
            categories: self.categories,
            preferred_isbn,
        })
    }
}

/// First volume of a response as a record. `None` when the response has no
/// items or the first item carries no ISBN identifier.
fn record_from_response(response: VolumesResponse) -> Option<BookRecord> {
    response.items.into_iter().next()?.volume_info.into_record()
}

/// Blocking client for the Google Books volumes API.
pub struct GoogleBooksClient {
    client: Client,
    endpoint: String,
    user_agent: String,
    max_retries: u32,
}

impl GoogleBooksClient {
    pub fn new(config: &LookupConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            max_retries: config.max_retries,
        })
    }

    fn fetch(&self, isbn: &str) -> LibraryResult<VolumesResponse> {
        let url = format!("{}?q=isbn:{isbn}", self.endpoint);
        let failed = |reason: String| LibraryError::ExternalLookupFailed {
            isbn: isbn.to_string(),
            reason,
        };

        let mut attempt = 0;
        loop {
            log::debug!("lookup http start url={url} attempt={}", attempt + 1);
            let request = self
                .client
                .get(&url)
                .header(ACCEPT, "application/json")
                .header(USER_AGENT, &self.user_agent);
            let retry_reason = match request.send() {
                Ok(response) if response.status().is_success() => {
                    return response
                        .json::<VolumesResponse>()
                        .map_err(|err| failed(format!("malformed response: {err}")));
                }
                Ok(response) if response.status().is_server_error() => {
                    format!("server returned {}", response.status())
                }
                Ok(response) => {
                    return Err(failed(format!("server returned {}", response.status())));
                }
                Err(err) => err.to_string(),
            };

            if attempt >= self.max_retries {
                return Err(failed(retry_reason));
            }
            attempt += 1;
            log::warn!("lookup for ISBN {isbn} failed ({retry_reason}); retrying");
            thread::sleep(Duration::from_millis(350 * u64::from(attempt)));
        }
    }
}

impl MetadataSource for GoogleBooksClient {
    fn lookup(&self, isbn: &str) -> LibraryResult<BookRecord> {
        let response = self.fetch(isbn)?;
        record_from_response(response).ok_or_else(|| LibraryError::ExternalLookupFailed {
            isbn: isbn.to_string(),
            reason: "no matching volume with an ISBN".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn parse(value: serde_json::Value) -> Option<BookRecord> {
        record_from_response(serde_json::from_value(value).expect("response shape"))
    }

    #[rstest]
    #[case("9780131103627", "9780131103627")]
    #[case("978-0-13-110362-7", "9780131103627")]
    #[case("0-306-40615-2", "0306406152")]
    #[case("080442957x", "080442957X")]
    fn accepts_valid_isbns(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_isbn(input).expect("valid isbn"), expected);
    }

    #[rstest]
    #[case("9780131103628")]
    #[case("0306406153")]
    #[case("12345")]
    #[case("")]
    #[case("97801311036X7")]
    fn rejects_invalid_isbns(#[case] input: &str) {
        assert!(matches!(
            normalize_isbn(input),
            Err(LibraryError::InvalidIsbn { .. })
        ));
    }

    #[test]
    fn prefers_isbn13_identifier() {
        let record = parse(json!({
            "items": [{
                "volumeInfo": {
                    "title": "The C Programming Language",
                    "authors": ["Brian W. Kernighan", "Dennis M. Ritchie"],
                    "publisher": "Prentice Hall",
                    "publishedDate": "1988",
                    "pageCount": 272,
                    "language": "en",
                    "categories": ["Computers"],
                    "industryIdentifiers": [
                        {"type": "ISBN_10", "identifier": "0131103628"},
                        {"type": "ISBN_13", "identifier": "9780131103627"}
                    ]
                }
            }]
        }))
        .expect("record");

        assert_eq!(record.preferred_isbn, "9780131103627");
        assert_eq!(record.authors_line(), "Brian W. Kernighan, Dennis M. Ritchie");
        assert_eq!(record.page_count, Some(272));
    }

    #[test]
    fn falls_back_to_isbn10_and_tolerates_missing_fields() {
        let record = parse(json!({
            "items": [{
                "volumeInfo": {
                    "title": "Sparse",
                    "industryIdentifiers": [{"type": "ISBN_10", "identifier": "0306406152"}]
                }
            }]
        }))
        .expect("record");

        assert_eq!(record.preferred_isbn, "0306406152");
        assert!(record.authors.is_empty());
        assert_eq!(record.page_count, None);
        assert_eq!(record.categories_line(), "");
    }

    #[test]
    fn empty_or_identifierless_responses_are_misses() {
        assert!(parse(json!({"totalItems": 0})).is_none());
        assert!(parse(json!({
            "items": [{"volumeInfo": {"title": "No ids", "industryIdentifiers": [
                {"type": "OTHER", "identifier": "UOM:39015"}
            ]}}]
        }))
        .is_none());
    }
}
