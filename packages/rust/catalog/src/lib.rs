//! Catalog loader: fetches and ranks the source document index.
//!
//! The catalog is a remotely hosted delimited text index. Fetching is
//! best-effort: any transport or parse failure logs a warning and
//! yields an empty candidate list, which the run controller treats as
//! "no work this run" rather than a crash.

mod parser;

use std::time::Duration;

use tracing::{info, instrument, warn};
use url::Url;

use insightforge_shared::{CatalogConfig, CatalogItem, InsightForgeError, Result};

/// User-Agent string for catalog requests.
const USER_AGENT: &str = concat!("insightforge/", env!("CARGO_PKG_VERSION"));

/// Fetch the catalog and return candidates ordered by rank.
///
/// Never fails: errors degrade to an empty list.
#[instrument(skip_all, fields(url = %config.url))]
pub async fn fetch(config: &CatalogConfig) -> Vec<CatalogItem> {
    match try_fetch(config).await {
        Ok(items) => {
            info!(count = items.len(), "catalog loaded");
            items
        }
        Err(e) => {
            warn!(error = %e, "catalog fetch failed, no work this run");
            Vec::new()
        }
    }
}

async fn try_fetch(config: &CatalogConfig) -> Result<Vec<CatalogItem>> {
    let url = Url::parse(&config.url)
        .map_err(|e| InsightForgeError::config(format!("invalid catalog URL: {e}")))?;

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| InsightForgeError::Network(format!("client build: {e}")))?;

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| InsightForgeError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(InsightForgeError::Network(format!("{url}: HTTP {status}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| InsightForgeError::Network(format!("{url}: body read failed: {e}")))?;

    let (items, has_popularity) = parser::parse_catalog(&body)?;
    Ok(rank(items, has_popularity))
}

/// Assign 1-based ranks.
///
/// With a popularity column: stable sort by descending popularity, so
/// ties keep catalog file order. Without one: file order as-is.
fn rank(mut items: Vec<CatalogItem>, has_popularity: bool) -> Vec<CatalogItem> {
    if has_popularity {
        items.sort_by_key(|item| std::cmp::Reverse(item.popularity));
    }
    for (i, item) in items.iter_mut().enumerate() {
        item.rank = i + 1;
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, popularity: u64) -> CatalogItem {
        CatalogItem {
            id: id.into(),
            title: format!("Title {id}"),
            author: String::new(),
            subjects: String::new(),
            popularity,
            rank: 0,
        }
    }

    #[test]
    fn rank_orders_by_descending_popularity() {
        let ranked = rank(vec![item("a", 10), item("b", 99), item("c", 50)], true);

        assert_eq!(ranked[0].id, "b");
        assert_eq!(ranked[1].id, "c");
        assert_eq!(ranked[2].id, "a");
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn rank_ties_keep_file_order() {
        let ranked = rank(vec![item("x", 5), item("y", 5), item("z", 9)], true);

        assert_eq!(ranked[0].id, "z");
        assert_eq!(ranked[1].id, "x");
        assert_eq!(ranked[2].id, "y");
    }

    #[test]
    fn rank_without_popularity_keeps_file_order() {
        let ranked = rank(vec![item("m", 0), item("n", 0)], false);

        assert_eq!(ranked[0].id, "m");
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].id, "n");
        assert_eq!(ranked[1].rank, 2);
    }

    #[tokio::test]
    async fn fetch_parses_remote_catalog() {
        let server = wiremock::MockServer::start().await;

        let csv = "Text#,Title,Authors,Subjects,Downloads\n\
                   84,Frankenstein,\"Shelley, Mary\",Horror,42000\n\
                   1342,Pride and Prejudice,\"Austen, Jane\",Fiction,50000\n";

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/catalog.csv"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(csv))
            .mount(&server)
            .await;

        let config = CatalogConfig {
            url: format!("{}/catalog.csv", server.uri()),
            timeout_secs: 5,
        };

        let items = fetch(&config).await;
        assert_eq!(items.len(), 2);
        // Ranked by downloads, not file order
        assert_eq!(items[0].id, "1342");
        assert_eq!(items[0].rank, 1);
        assert_eq!(items[1].id, "84");
    }

    #[tokio::test]
    async fn fetch_server_error_degrades_to_empty() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = CatalogConfig {
            url: format!("{}/catalog.csv", server.uri()),
            timeout_secs: 5,
        };

        assert!(fetch(&config).await.is_empty());
    }

    #[tokio::test]
    async fn fetch_unreachable_host_degrades_to_empty() {
        let config = CatalogConfig {
            // Reserved TEST-NET address, nothing listens here
            url: "http://192.0.2.1:9/catalog.csv".into(),
            timeout_secs: 1,
        };

        assert!(fetch(&config).await.is_empty());
    }
}
