use std::sync::Arc;

use {
    askama::Template,
    axum::{
        Json,
        extract::{Query, State},
        http::{StatusCode, header},
        response::{Html, IntoResponse, Response},
    },
    prayerwall_store::PrayerRequest,
    serde::Deserialize,
    serde_json::json,
    tracing::error,
};

use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 500;
/// Requests per `/wall` page.
const WALL_PAGE_SIZE: u32 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
}

impl ListParams {
    fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WallParams {
    /// 1-based; page 1 is the newest.
    pub page: Option<u32>,
}

impl WallParams {
    fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }
}

#[derive(Template)]
#[template(path = "wall.html")]
pub struct WallPage<'a> {
    requests: &'a [PrayerRequest],
    newer: Option<u32>,
    older: Option<u32>,
}

impl<'a> WallPage<'a> {
    /// `has_older` says whether anything exists past this page.
    pub fn new(requests: &'a [PrayerRequest], page: u32, has_older: bool) -> Self {
        Self {
            requests,
            newer: (page > 1).then(|| page - 1),
            older: has_older.then(|| page + 1),
        }
    }
}

pub async fn index() -> impl IntoResponse {
    Html(include_str!("assets/index.html"))
}

pub async fn stylesheet() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        include_str!("assets/style.css"),
    )
}

pub async fn wall(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WallParams>,
) -> Response {
    let page = params.page();
    let offset = u64::from(page - 1) * u64::from(WALL_PAGE_SIZE);
    // One extra row tells whether an older page exists.
    let mut requests = match state.store.list_page(WALL_PAGE_SIZE + 1, offset).await {
        Ok(requests) => requests,
        Err(e) => {
            error!(error = ?e, "failed to load wall");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        },
    };
    let has_older = requests.len() > WALL_PAGE_SIZE as usize;
    requests.truncate(WALL_PAGE_SIZE as usize);

    match WallPage::new(&requests, page, has_older).render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "failed to render wall");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        },
    }
}

pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Response {
    match state.store.list(params.limit()).await {
        Ok(requests) => Json(requests).into_response(),
        Err(e) => {
            error!(error = ?e, "failed to list requests");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal Server Error" })),
            )
                .into_response()
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn request(content: &str) -> PrayerRequest {
        PrayerRequest {
            id: 1,
            content: content.into(),
            created_at: 0,
        }
    }

    #[test]
    fn escapes_user_content() {
        let requests = [request("<script>alert('x')</script> & more")];
        let html = WallPage::new(&requests, 1, false).render().unwrap();
        assert!(html.contains("&lt;script&gt;alert("));
        assert!(html.contains("&amp; more"));
        assert!(!html.contains("<script>"));
        assert!(html.contains(r#"datetime="1970-01-01T00:00:00+00:00""#));
    }

    #[test]
    fn empty_wall_has_placeholder() {
        let html = WallPage::new(&[], 1, false).render().unwrap();
        assert!(html.contains("No prayer requests yet."));
        assert!(!html.contains("/wall?page="));
    }

    #[test]
    fn pager_links_follow_position() {
        let requests = [request("x")];
        let first = WallPage::new(&requests, 1, true).render().unwrap();
        assert!(first.contains(r#"href="/wall?page=2""#));
        assert!(!first.contains("Newer"));

        let middle = WallPage::new(&requests, 2, true).render().unwrap();
        assert!(middle.contains(r#"href="/wall?page=1""#));
        assert!(middle.contains(r#"href="/wall?page=3""#));

        let last = WallPage::new(&requests, 3, false).render().unwrap();
        assert!(last.contains(r#"href="/wall?page=2""#));
        assert!(!last.contains("Older"));
    }

    #[test]
    fn page_zero_is_first_page() {
        assert_eq!(WallParams { page: Some(0) }.page(), 1);
        assert_eq!(WallParams { page: None }.page(), 1);
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(ListParams { limit: None }.limit(), DEFAULT_LIMIT);
        assert_eq!(ListParams { limit: Some(0) }.limit(), 1);
        assert_eq!(ListParams { limit: Some(10_000) }.limit(), MAX_LIMIT);
    }
}
