use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use log::{debug, error, info, warn};
use pickems_api::client::MatchSource;
use pickems_api::service::Pickems;
use pickems_api::store::Store;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;

pub const WEBHOOK_PATH: &str = "/webhooks/liquipedia";

/// Page-edit notification posted by LiquipediaDB.
#[derive(Debug, Clone, Deserialize)]
pub struct PageEvent {
    pub wiki: String,
    pub page: String,
    #[serde(default)]
    pub event: String,
}

/// The tournament page itself or any page below it.
pub fn is_relevant_page(page: &str, base: &str) -> bool {
    page == base || page.strip_prefix(base).is_some_and(|rest| rest.starts_with('/'))
}

pub struct WebhookState<S, M> {
    pub service: Arc<Pickems<S, M>>,
    pub wiki: String,
    pub base_page: String,
}

impl<S, M> Clone for WebhookState<S, M> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            wiki: self.wiki.clone(),
            base_page: self.base_page.clone(),
        }
    }
}

pub fn router<S, M>(state: WebhookState<S, M>) -> Router
where
    S: Store + 'static,
    M: MatchSource + 'static,
{
    Router::new().route(WEBHOOK_PATH, post(page_event::<S, M>)).with_state(state)
}

pub async fn serve<S, M>(addr: SocketAddr, state: WebhookState<S, M>) -> anyhow::Result<()>
where
    S: Store + 'static,
    M: MatchSource + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("webhook listening on {addr}{WEBHOOK_PATH}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Acknowledges every well-formed event. Relevant ones start a background
/// refresh whose failure is only logged.
async fn page_event<S, M>(State(state): State<WebhookState<S, M>>, body: Bytes) -> StatusCode
where
    S: Store + 'static,
    M: MatchSource + 'static,
{
    let event: PageEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("failed to decode webhook: {e}");
            return StatusCode::BAD_REQUEST;
        }
    };

    if event.wiki != state.wiki || !is_relevant_page(&event.page, &state.base_page) {
        debug!("ignoring {} event for {}:{}", event.event, event.wiki, event.page);
        return StatusCode::OK;
    }

    info!("liquipedia event wiki={} page={} event={}", event.wiki, event.page, event.event);
    let service = Arc::clone(&state.service);
    tokio::spawn(async move {
        if let Err(e) = service.refresh().await {
            error!("refresh after page edit failed: {e}");
        }
    });
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use pickems_api::client::ApiResult;
    use pickems_api::store::MemoryStore;
    use pickems_api::{Format, MatchRecord, RoundData, ScheduledMatch};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::util::ServiceExt;

    struct CountingSource(Arc<AtomicUsize>);

    #[async_trait]
    impl MatchSource for CountingSource {
        async fn fetch_round(&self) -> ApiResult<RoundData> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(RoundData {
                format: Format::Swiss,
                records: vec![MatchRecord::new("s_R01-M001", "Vitality", "MOUZ", "Vitality")],
                schedule: vec![ScheduledMatch {
                    team1: "Vitality".into(),
                    team2: "MOUZ".into(),
                    best_of: "1".into(),
                    ..Default::default()
                }],
            })
        }
    }

    fn app() -> (Router, Arc<AtomicUsize>) {
        let fetches = Arc::new(AtomicUsize::new(0));
        let service = Pickems::new(
            MemoryStore::new(),
            CountingSource(Arc::clone(&fetches)),
            "AustinMajor2025",
            "Stage_1",
        );
        let state = WebhookState {
            service: Arc::new(service),
            wiki: "counterstrike".into(),
            base_page: "BLAST/Major/2025/Austin".into(),
        };
        (router(state), fetches)
    }

    async fn send(app: Router, method: Method, body: &str) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri(WEBHOOK_PATH)
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    async fn wait_for(fetches: &AtomicUsize, expected: usize) -> bool {
        for _ in 0..100 {
            if fetches.load(Ordering::SeqCst) == expected {
                return true;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        false
    }

    #[test]
    fn relevance_is_exact_page_or_sub_page() {
        let base = "BLAST/Premier/2025/World_Final";
        assert!(is_relevant_page(base, base));
        assert!(is_relevant_page("BLAST/Premier/2025/World_Final/Opening_Stage", base));
        assert!(!is_relevant_page("ESL/Pro_League/Season_20", base));
        assert!(!is_relevant_page("BLAST/Premier/2025", base));
        assert!(!is_relevant_page("BLAST/Premier/2025/World_Finals", base));
        assert!(!is_relevant_page("SomePage", ""));
        assert!(is_relevant_page("", ""));
    }

    #[tokio::test]
    async fn only_post_is_allowed() {
        let (app, fetches) = app();
        assert_eq!(send(app, Method::GET, "").await, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_json_is_a_bad_request() {
        let (app, _) = app();
        assert_eq!(send(app, Method::POST, "invalid json").await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unrelated_events_are_acknowledged_without_refresh() {
        let (app, fetches) = app();
        let other_wiki = r#"{"wiki":"dota2","page":"BLAST/Major/2025/Austin","event":"edit"}"#;
        assert_eq!(send(app.clone(), Method::POST, other_wiki).await, StatusCode::OK);
        let other_page = r#"{"wiki":"counterstrike","page":"ESL/Pro_League","event":"edit"}"#;
        assert_eq!(send(app, Method::POST, other_page).await, StatusCode::OK);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn relevant_sub_page_triggers_refresh() {
        let (app, fetches) = app();
        let event = r#"{"wiki":"counterstrike","page":"BLAST/Major/2025/Austin/Stage_1","event":"edit"}"#;
        assert_eq!(send(app, Method::POST, event).await, StatusCode::OK);
        assert!(wait_for(&fetches, 1).await);
    }
}
