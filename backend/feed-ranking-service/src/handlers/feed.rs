use actix_web::{get, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::{FeedError, Result};
use crate::models::RankedItem;
use crate::services::{Cursor, FeedService};

/// Header set by the upstream auth layer.
pub const VIEWER_HEADER: &str = "x-user-id";

pub struct FeedHandlerState {
    pub service: Arc<FeedService>,
}

#[derive(Debug, Deserialize)]
pub struct RelatedQueryParams {
    pub cursor: Option<String>,
    /// Raw cursor parts are parsed leniently; garbage restarts the list.
    pub last_score: Option<String>,
    pub last_id: Option<String>,
    /// Epoch milliseconds the paging pass was scored at.
    pub as_of: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PageQueryParams {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedItemsResponse {
    pub items: Vec<RankedItem>,
    pub next_cursor: Option<String>,
    pub last_score: Option<f64>,
    pub last_id: Option<String>,
    pub as_of: Option<i64>,
    pub has_more: bool,
}

impl RelatedQueryParams {
    /// An opaque token wins over raw `last_score`/`last_id`.
    fn cursor(&self, scope: &str) -> Cursor {
        match self.cursor.as_deref() {
            Some(token) if !token.is_empty() => Cursor::decode(token, scope),
            _ => Cursor::from_parts(
                self.last_score.as_deref(),
                self.last_id.as_deref(),
                self.as_of.as_deref(),
            ),
        }
    }
}

fn viewer_id(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(VIEWER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn require_viewer(req: &HttpRequest) -> Result<String> {
    viewer_id(req).ok_or_else(|| FeedError::Unauthorized("Missing user context".into()))
}

/// Related items for one seed item. Anonymous viewers get the same ranking
/// without following or interaction signals.
#[get("/items/{id}/related")]
pub async fn get_related_items(
    path: web::Path<String>,
    query: web::Query<RelatedQueryParams>,
    http_req: HttpRequest,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    let item_id = path.into_inner();
    let viewer = viewer_id(&http_req).unwrap_or_default();
    let scope = format!("{}/{}", viewer, item_id);
    let cursor = query.cursor(&scope);
    let limit = state.service.config().clamp_limit(query.limit);

    debug!(item_id = %item_id, viewer_id = %viewer, limit, "Related items request");

    let page = state
        .service
        .get_related_items(&item_id, &viewer, &cursor, limit)
        .await?;

    let response = RelatedItemsResponse {
        has_more: page.next_cursor.is_some(),
        next_cursor: page.next_cursor.as_ref().map(|c| c.encode(&scope)),
        last_score: page.next_cursor.as_ref().map(|c| c.last_score),
        as_of: page
            .next_cursor
            .as_ref()
            .and_then(|c| c.as_of)
            .map(|t| t.timestamp_millis()),
        last_id: page.next_cursor.map(|c| c.last_id),
        items: page.items,
    };

    Ok(HttpResponse::Ok().json(response))
}

#[get("/feed/discover")]
pub async fn get_discovery_feed(
    query: web::Query<PageQueryParams>,
    http_req: HttpRequest,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    let viewer = require_viewer(&http_req)?;
    let limit = state.service.config().clamp_limit(query.limit);
    let page = query.page.unwrap_or(0);

    let feed = state
        .service
        .get_discovery_feed(&viewer, page, limit)
        .await?;

    Ok(HttpResponse::Ok().json(feed))
}

#[get("/feed/main")]
pub async fn get_main_feed(
    query: web::Query<PageQueryParams>,
    http_req: HttpRequest,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    let viewer = require_viewer(&http_req)?;
    let limit = state.service.config().clamp_limit(query.limit);
    let page = query.page.unwrap_or(1);

    let feed = state.service.get_main_feed(&viewer, page, limit).await?;

    Ok(HttpResponse::Ok().json(feed))
}

/// Mounts the feed routes under `/api/v1`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(get_related_items)
            .service(get_discovery_feed)
            .service(get_main_feed),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankingConfig;
    use crate::models::ContentItem;
    use crate::services::FeedDependencies;
    use crate::session::{MemorySessionStore, SessionKeys};
    use crate::store::MemoryStore;
    use actix_web::{http::StatusCode, test, App};
    use chrono::Utc;

    fn state(store: Arc<MemoryStore>) -> web::Data<FeedHandlerState> {
        let service = FeedService::new(
            FeedDependencies {
                content: store.clone(),
                viewers: store.clone(),
                interactions: store,
                sessions: Arc::new(MemorySessionStore::new()),
            },
            RankingConfig::default(),
            SessionKeys::default(),
        );
        web::Data::new(FeedHandlerState {
            service: Arc::new(service),
        })
    }

    fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for i in 0..6 {
            store.insert_item(ContentItem {
                id: format!("item-{}", i),
                owner_id: format!("owner-{}", i),
                created_at: Utc::now() - chrono::Duration::hours(2),
                tags: vec![format!("tag-{}", i)],
                likes: i,
                saves: 0,
                comments: 0,
                views: 0,
            });
        }
        store
    }

    #[actix_web::test]
    async fn test_discover_requires_viewer() {
        let app = test::init_service(
            App::new()
                .app_data(state(seeded_store()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/feed/discover")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_related_cursor_round_trip() {
        let app = test::init_service(
            App::new()
                .app_data(state(seeded_store()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/items/item-0/related?limit=2")
            .insert_header((VIEWER_HEADER, "viewer"))
            .to_request();
        let first: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(first["items"].as_array().map(Vec::len), Some(2));
        assert_eq!(first["hasMore"], true);
        let token = first["nextCursor"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/items/item-0/related?limit=2&cursor={}", token))
            .insert_header((VIEWER_HEADER, "viewer"))
            .to_request();
        let second: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let first_ids: Vec<&str> = first["items"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|i| i["id"].as_str())
            .collect();
        for item in second["items"].as_array().unwrap() {
            assert!(!first_ids.contains(&item["id"].as_str().unwrap()));
        }
    }

    #[actix_web::test]
    async fn test_malformed_raw_cursor_restarts_from_top() {
        let app = test::init_service(
            App::new()
                .app_data(state(seeded_store()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/items/item-0/related?limit=3")
            .insert_header((VIEWER_HEADER, "viewer"))
            .to_request();
        let first: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::get()
            .uri("/api/v1/items/item-0/related?limit=3&last_score=abc&last_id=x")
            .insert_header((VIEWER_HEADER, "viewer"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let restarted: serde_json::Value = test::read_body_json(resp).await;

        let ids = |body: &serde_json::Value| -> Vec<String> {
            body["items"]
                .as_array()
                .unwrap()
                .iter()
                .filter_map(|i| i["id"].as_str().map(str::to_string))
                .collect()
        };
        assert_eq!(ids(&restarted), ids(&first));
        assert!(!ids(&first).is_empty());
    }

    #[actix_web::test]
    async fn test_raw_cursor_parts_page_forward() {
        let app = test::init_service(
            App::new()
                .app_data(state(seeded_store()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/items/item-0/related?limit=2")
            .insert_header((VIEWER_HEADER, "viewer"))
            .to_request();
        let first: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let uri = format!(
            "/api/v1/items/item-0/related?limit=2&last_score={}&last_id={}&as_of={}",
            first["lastScore"],
            first["lastId"].as_str().unwrap(),
            first["asOf"],
        );

        let req = test::TestRequest::get()
            .uri(&uri)
            .insert_header((VIEWER_HEADER, "viewer"))
            .to_request();
        let second: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let last_id = first["lastId"].as_str().unwrap();
        let second_items = second["items"].as_array().unwrap();
        assert!(!second_items.is_empty());
        assert!(second_items.iter().all(|i| i["id"] != last_id));
    }

    #[actix_web::test]
    async fn test_main_feed_page_shape() {
        let app = test::init_service(
            App::new()
                .app_data(state(seeded_store()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/feed/main?page=1&limit=4")
            .insert_header((VIEWER_HEADER, "viewer"))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["items"].as_array().map(Vec::len), Some(4));
        assert_eq!(body["hasNextPage"], true);
        assert_eq!(body["items"][0]["liked"], false);
    }

    #[actix_web::test]
    async fn test_store_outage_maps_to_503() {
        let store = seeded_store();
        store.set_unavailable(true);
        let app = test::init_service(App::new().app_data(state(store)).configure(configure)).await;

        let req = test::TestRequest::get()
            .uri("/api/v1/feed/main")
            .insert_header((VIEWER_HEADER, "viewer"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(resp.headers().contains_key("retry-after"));
    }
}
