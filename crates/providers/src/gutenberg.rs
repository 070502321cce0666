//! Project Gutenberg text source with Gutendex metadata.

use std::time::Duration;

use async_trait::async_trait;
use litessay_core::collaborators::{SourceMetadata, TextSource};
use litessay_core::error::CollaboratorError;
use serde::Deserialize;

use crate::http::{ensure_success, parse_response, request_error};

const SERVICE: &str = "gutenberg";

/// Texts this short are mirror error pages, not books.
pub const MIN_TEXT_LEN: usize = 1000;

pub const DEFAULT_TEXT_URL: &str = "https://www.gutenberg.org/ebooks/{id}.txt.utf-8";
pub const DEFAULT_GUTENDEX_URL: &str = "https://gutendex.com/books";

#[derive(Debug, Clone)]
pub struct GutenbergConfig {
    /// Primary text URL; `{id}` is replaced with the ebook id.
    pub text_url: String,
    pub gutendex_url: String,
}

impl Default for GutenbergConfig {
    fn default() -> Self {
        Self {
            text_url: DEFAULT_TEXT_URL.to_string(),
            gutendex_url: DEFAULT_GUTENDEX_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GutendexBook {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    authors: Vec<GutendexPerson>,
}

#[derive(Debug, Deserialize)]
struct GutendexPerson {
    name: String,
}

impl From<GutendexBook> for SourceMetadata {
    fn from(book: GutendexBook) -> Self {
        SourceMetadata {
            title: book.title,
            author: book.authors.into_iter().next().map(|a| a.name),
        }
    }
}

pub struct GutenbergSource {
    client: reqwest::Client,
    config: GutenbergConfig,
}

impl GutenbergSource {
    pub fn new(config: GutenbergConfig) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| request_error(SERVICE, e))?;
        Ok(Self { client, config })
    }

    async fn try_fetch(&self, url: &str) -> Result<Option<String>, CollaboratorError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;
        let response = ensure_success(SERVICE, response).await?;
        let text = response.text().await.map_err(|e| request_error(SERVICE, e))?;
        Ok((text.len() > MIN_TEXT_LEN).then_some(text))
    }
}

#[async_trait]
impl TextSource for GutenbergSource {
    async fn fetch(&self, source_ref: &str) -> Result<String, CollaboratorError> {
        let mut last_error = None;
        for url in candidate_urls(&self.config.text_url, source_ref) {
            tracing::info!(url = %url, "Fetching Gutenberg text");
            match self.try_fetch(&url).await {
                Ok(Some(text)) => return Ok(text),
                Ok(None) => tracing::debug!(url = %url, "Gutenberg text too short, trying next mirror"),
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "Gutenberg fetch failed, trying next mirror");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| CollaboratorError::Decode {
            service: SERVICE,
            message: format!("no usable text found for ebook {source_ref}"),
        }))
    }

    async fn fetch_metadata(&self, source_ref: &str) -> Result<SourceMetadata, CollaboratorError> {
        let response = self
            .client
            .get(format!("{}/{}", self.config.gutendex_url, source_ref))
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;
        let book: GutendexBook = parse_response(SERVICE, response).await?;
        Ok(book.into())
    }
}

/// Mirrors tried in order for one ebook.
fn candidate_urls(text_url: &str, id: &str) -> Vec<String> {
    let base = text_url.replace("{id}", id);
    let plain = base.replace(".txt.utf-8", ".txt");
    let mut urls = vec![base];
    if !urls.contains(&plain) {
        urls.push(plain);
    }
    urls.extend([
        format!("https://www.gutenberg.org/files/{id}/{id}-0.txt"),
        format!("https://www.gutenberg.org/files/{id}/{id}-8.txt"),
        format!("https://www.gutenberg.org/files/{id}/{id}.txt"),
    ]);
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_start_with_configured_url() {
        let urls = candidate_urls(DEFAULT_TEXT_URL, "1342");
        assert_eq!(
            urls,
            vec![
                "https://www.gutenberg.org/ebooks/1342.txt.utf-8",
                "https://www.gutenberg.org/ebooks/1342.txt",
                "https://www.gutenberg.org/files/1342/1342-0.txt",
                "https://www.gutenberg.org/files/1342/1342-8.txt",
                "https://www.gutenberg.org/files/1342/1342.txt",
            ]
        );
    }

    #[test]
    fn custom_url_without_suffix_is_not_duplicated() {
        let urls = candidate_urls("http://mirror.local/{id}", "84");
        assert_eq!(urls[0], "http://mirror.local/84");
        assert_eq!(urls.len(), 4);
    }

    #[test]
    fn gutendex_first_author_wins() {
        let book: GutendexBook = serde_json::from_str(
            r#"{"id":1342,"title":"Pride and Prejudice",
                "authors":[{"name":"Austen, Jane"},{"name":"Someone Else"}]}"#,
        )
        .unwrap();
        let md = SourceMetadata::from(book);
        assert_eq!(md.title.as_deref(), Some("Pride and Prejudice"));
        assert_eq!(md.author.as_deref(), Some("Austen, Jane"));

        let anonymous: GutendexBook = serde_json::from_str(r#"{"title":"Beowulf"}"#).unwrap();
        assert_eq!(SourceMetadata::from(anonymous).author, None);
    }
}
