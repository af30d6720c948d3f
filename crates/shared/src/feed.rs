use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{PipelineError, PipelineResult};
use crate::text::snippet;

pub const DEFAULT_FOLLOWIN_BASE_URL: &str = "https://api.followin.io";
pub const DEFAULT_MAX_ITEMS: usize = 10;
pub const PLACEHOLDER_TITLE: &str = "无标题";

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Where the pipeline gets its headlines from.
pub trait FeedSource {
    fn fetch_titles(&self, max_items: usize) -> impl Future<Output = PipelineResult<Vec<String>>>;
}

/// The Followin open-API feeds this tool knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    News,
    Trending,
    Opinions,
    Tag,
}

impl FeedKind {
    pub fn path(&self) -> &'static str {
        match self {
            FeedKind::News => "/open/feed/news",
            FeedKind::Trending => "/open/feed/list/trending",
            FeedKind::Opinions => "/open/feed/list/tag/opinions",
            FeedKind::Tag => "/open/feed/list/tag",
        }
    }

    fn slug(&self) -> &'static str {
        match self {
            FeedKind::News => "news",
            FeedKind::Trending => "trending",
            FeedKind::Opinions => "opinions",
            FeedKind::Tag => "tag",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for FeedKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "news" => Ok(FeedKind::News),
            "trending" => Ok(FeedKind::Trending),
            "opinions" => Ok(FeedKind::Opinions),
            "tag" => Ok(FeedKind::Tag),
            other => Err(format!(
                "unknown feed '{other}'. Use 'news', 'trending', 'opinions' or 'tag'"
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    data: Option<Value>,
}

/// Turns the loosely shaped `data` field into an ordered item list.
///
/// A bare object is one item, an array is used as-is, anything else
/// (absent, null, scalar) yields nothing.
pub fn normalize_items(data: Option<Value>) -> Vec<Value> {
    match data {
        Some(Value::Array(items)) => items,
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    }
}

/// Reads the `title` of the first `max_items` items, substituting
/// [`PLACEHOLDER_TITLE`] where it is missing, blank or not a string.
pub fn extract_titles(items: &[Value], max_items: usize) -> Vec<String> {
    items
        .iter()
        .take(max_items)
        .map(|item| {
            item.get("title")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(PLACEHOLDER_TITLE)
                .to_string()
        })
        .collect()
}

pub fn has_usable_title(titles: &[String]) -> bool {
    titles.iter().any(|t| t != PLACEHOLDER_TITLE)
}

pub struct FollowinClient {
    client: Client,
    api_key: String,
    base_url: String,
    feeds: Vec<FeedKind>,
}

impl FollowinClient {
    pub fn new(api_key: String, base_url: String, feeds: Vec<FeedKind>) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| PipelineError::Fetch(format!("failed to create HTTP client: {e}")))?;

        let feeds = if feeds.is_empty() {
            vec![FeedKind::News]
        } else {
            feeds
        };

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            feeds,
        })
    }

    /// GETs one feed and returns its normalized items.
    ///
    /// The key travels in the custom `apikey` header.
    pub async fn fetch_items(&self, kind: FeedKind) -> PipelineResult<Vec<Value>> {
        let url = format!("{}{}", self.base_url, kind.path());

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(|e| PipelineError::Fetch(format!("{kind} feed request failed: {e}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return Err(PipelineError::Fetch(format!(
                "{kind} feed returned {status} - {}",
                snippet(&error_text)
            )));
        }

        let feed_response = response
            .json::<FeedResponse>()
            .await
            .map_err(|e| PipelineError::Fetch(format!("failed to parse {kind} feed response: {e}")))?;

        Ok(normalize_items(feed_response.data))
    }
}

impl FeedSource for FollowinClient {
    async fn fetch_titles(&self, max_items: usize) -> PipelineResult<Vec<String>> {
        let mut titles = Vec::new();

        for &kind in &self.feeds {
            let items = self.fetch_items(kind).await?;
            let feed_titles = extract_titles(&items, max_items);
            tracing::info!(feed = %kind, items = items.len(), titles = feed_titles.len(), "fetched feed");
            titles.extend(feed_titles);
        }

        if !has_usable_title(&titles) {
            return Err(PipelineError::EmptyContent);
        }

        Ok(titles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_becomes_single_item() {
        let item = json!({"title": "BTC hits new high", "id": 7});
        let items = normalize_items(Some(item.clone()));
        assert_eq!(items, vec![item]);
    }

    #[test]
    fn test_array_keeps_order() {
        let data = json!([{"title": "a"}, {"title": "b"}, {"title": "c"}]);
        let items = normalize_items(Some(data));
        assert_eq!(items.len(), 3);
        assert_eq!(extract_titles(&items, 10), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_other_shapes_are_empty() {
        assert!(normalize_items(None).is_empty());
        assert!(normalize_items(Some(Value::Null)).is_empty());
        assert!(normalize_items(Some(json!("oops"))).is_empty());
        assert!(normalize_items(Some(json!(42))).is_empty());
    }

    #[test]
    fn test_extract_truncates_to_max() {
        let items: Vec<Value> = (0..15).map(|i| json!({ "title": format!("t{i}") })).collect();
        let titles = extract_titles(&items, 10);
        assert_eq!(titles.len(), 10);
        assert_eq!(titles[0], "t0");
        assert_eq!(titles[9], "t9");
    }

    #[test]
    fn test_missing_title_uses_placeholder() {
        let items = vec![json!({"id": 1}), json!({"title": "  "}), json!({"title": 5}), json!({"title": "ok"})];
        assert_eq!(
            extract_titles(&items, 10),
            vec![PLACEHOLDER_TITLE, PLACEHOLDER_TITLE, PLACEHOLDER_TITLE, "ok"]
        );
    }

    #[test]
    fn test_usable_title_detection() {
        assert!(!has_usable_title(&[]));
        assert!(!has_usable_title(&[PLACEHOLDER_TITLE.to_string()]));
        assert!(has_usable_title(&[PLACEHOLDER_TITLE.to_string(), "ETH".to_string()]));
    }

    #[test]
    fn test_response_without_data_field() {
        let parsed: FeedResponse = serde_json::from_str(r#"{"code": 0}"#).unwrap();
        assert!(normalize_items(parsed.data).is_empty());
    }

    #[test]
    fn test_feed_kind_parsing() {
        assert_eq!("News".parse::<FeedKind>().unwrap(), FeedKind::News);
        assert_eq!("opinions".parse::<FeedKind>().unwrap().path(), "/open/feed/list/tag/opinions");
        assert!("weather".parse::<FeedKind>().is_err());
        assert_eq!(FeedKind::Trending.to_string(), "trending");
    }

    #[test]
    fn test_client_defaults_to_news_feed() {
        let client = FollowinClient::new("k".into(), "https://api.followin.io/".into(), vec![]).unwrap();
        assert_eq!(client.feeds, vec![FeedKind::News]);
        assert_eq!(client.base_url, "https://api.followin.io");
    }
}
