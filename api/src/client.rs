use crate::liquipedia::{LpMatch, LpOpponent, MatchResponse};
use crate::wikitext::extract_bracket_ids;
use crate::{MatchRecord, RoundData, ScheduledMatch, TBD};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use log::{debug, info};
use reqwest::{Client, StatusCode, Url};
use std::fmt;
use std::time::Duration;

pub type ApiResult<T> = Result<T, ApiError>;

const LIQUIPEDIA_API: &str = "https://api.liquipedia.net";
const LIQUIPEDIA_WIKI: &str = "https://liquipedia.net";
const MATCH_LIMIT: &str = "100";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// LiquipediaDB + raw wikitext client.
#[derive(Debug, Clone)]
pub struct LiquipediaApi {
    client: Client,
    timeout: Duration,
    wiki: String,
    api_key: String,
    api_base: String,
    wiki_base: String,
}

#[derive(Debug)]
pub enum ApiError {
    Network(reqwest::Error, String),
    Api(reqwest::Error, String),
    Parsing(reqwest::Error, String),
    Malformed(String),
    Wikitext(String),
    NotFound(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(e, url) => write!(f, "Network error for {url}: {e}"),
            ApiError::Api(e, url) => write!(f, "API error for {url}: {e}"),
            ApiError::Parsing(e, url) => write!(f, "Parse error for {url}: {e}"),
            ApiError::Malformed(msg) => write!(f, "Unexpected match data: {msg}"),
            ApiError::Wikitext(msg) => write!(f, "Could not read tournament page: {msg}"),
            ApiError::NotFound(msg) => write!(f, "Not found: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Network(e, _) | ApiError::Api(e, _) | ApiError::Parsing(e, _) => Some(e),
            _ => None,
        }
    }
}

impl LiquipediaApi {
    pub fn new(api_key: impl Into<String>, wiki: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .user_agent("pickems/0.3 (tournament pick'em bot)")
                .gzip(true)
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_secs(10),
            wiki: wiki.into(),
            api_key: api_key.into(),
            api_base: LIQUIPEDIA_API.to_owned(),
            wiki_base: LIQUIPEDIA_WIKI.to_owned(),
        }
    }

    /// Point both endpoints somewhere else, e.g. a local mock server.
    pub fn with_base_urls(mut self, api_base: impl Into<String>, wiki_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self.wiki_base = wiki_base.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn wiki(&self) -> &str {
        &self.wiki
    }

    /// Raw wikitext of a tournament page. `optional_params` is appended verbatim
    /// after `?action=raw`, e.g. `&section=3`.
    pub async fn fetch_wikitext(&self, page: &str, optional_params: &str) -> ApiResult<String> {
        let url = format!(
            "{}/{}/{}?action=raw{optional_params}",
            self.wiki_base,
            self.wiki,
            page.trim_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ApiError::Network(e, url.clone()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(format!("page {page} on {}", self.wiki)));
        }
        let response = response.error_for_status().map_err(|e| ApiError::Api(e, url.clone()))?;
        response.text().await.map_err(|e| ApiError::Parsing(e, url))
    }

    /// Every match belonging to any of the given bracket ids, in one request.
    pub async fn fetch_matches(&self, bracket_ids: &[String]) -> ApiResult<Vec<LpMatch>> {
        let conditions = bracket_ids
            .iter()
            .map(|id| format!("[[match2bracketid::{id}]]"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let endpoint = format!("{}/api/v3/match", self.api_base);
        let url = Url::parse_with_params(
            &endpoint,
            &[
                ("wiki", self.wiki.as_str()),
                ("limit", MATCH_LIMIT),
                ("conditions", conditions.as_str()),
                ("rawstreams", "false"),
                ("streamurls", "false"),
            ],
        )
        .map_err(|e| ApiError::Malformed(format!("invalid match endpoint {endpoint}: {e}")))?;

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Apikey {}", self.api_key))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ApiError::Network(e, endpoint.clone()))?
            .error_for_status()
            .map_err(|e| ApiError::Api(e, endpoint.clone()))?;

        let raw: MatchResponse =
            response.json().await.map_err(|e| ApiError::Parsing(e, endpoint.clone()))?;
        if raw.result.is_empty() && !raw.error.is_empty() {
            return Err(ApiError::Malformed(raw.error.join("; ")));
        }
        debug!("fetched {} matches for {} brackets", raw.result.len(), bracket_ids.len());
        Ok(raw.result)
    }
}

// ---------------------------------------------------------------------------
// Mapping: Liquipedia wire types → domain types
// ---------------------------------------------------------------------------

fn opponents(raw: &LpMatch) -> ApiResult<[String; 2]> {
    let [first, second] = raw.match2opponents.as_slice() else {
        return Err(ApiError::Malformed(format!(
            "match {} has {} opponents, expected 2",
            raw.match2id,
            raw.match2opponents.len()
        )));
    };
    let name = |o: &LpOpponent| match o.name.as_deref() {
        Some(n) if !n.trim().is_empty() => n.to_owned(),
        _ => TBD.to_owned(),
    };
    Ok([name(first), name(second)])
}

fn is_finished(raw: &LpMatch) -> ApiResult<bool> {
    match raw.finished {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ApiError::Malformed(format!(
            "match {} has finished={other}, expected 0 or 1",
            raw.match2id
        ))),
    }
}

pub fn map_match_record(raw: &LpMatch) -> ApiResult<MatchRecord> {
    let [team1, team2] = opponents(raw)?;
    let winner = if is_finished(raw)? {
        match raw.winner.as_deref().map(str::trim) {
            Some("1") => team1.clone(),
            Some("2") => team2.clone(),
            // Finished without a winner (draw or cancelled): nothing to score.
            Some("") | None => TBD.to_owned(),
            Some(other) => {
                return Err(ApiError::Malformed(format!(
                    "match {} has winner={other}, expected 1 or 2",
                    raw.match2id
                )));
            }
        }
    } else {
        TBD.to_owned()
    };
    Ok(MatchRecord::new(raw.match2id.clone(), team1, team2, winner))
}

pub fn parse_match_date(date: &str) -> ApiResult<i64> {
    NaiveDateTime::parse_from_str(date.trim(), DATE_FORMAT)
        .map(|dt| dt.and_utc().timestamp())
        .map_err(|e| ApiError::Malformed(format!("invalid match date {date:?}: {e}")))
}

pub fn map_scheduled_match(raw: &LpMatch) -> ApiResult<ScheduledMatch> {
    let [team1, team2] = opponents(raw)?;
    let date = raw
        .date
        .as_deref()
        .ok_or_else(|| ApiError::Malformed(format!("match {} has no date", raw.match2id)))?;
    Ok(ScheduledMatch {
        team1,
        team2,
        start: parse_match_date(date)?,
        best_of: raw.bestof.map(|b| b.to_string()).unwrap_or_default(),
        stream: raw.twitch_stream().map(str::to_owned),
        finished: is_finished(raw)?,
    })
}

// ---------------------------------------------------------------------------
// Match source
// ---------------------------------------------------------------------------

/// Where a round's matches come from.
#[async_trait]
pub trait MatchSource: Send + Sync {
    async fn fetch_round(&self) -> ApiResult<RoundData>;
}

/// Reads one tournament page: bracket ids from its wikitext, then the matches
/// of all those brackets from LiquipediaDB.
#[derive(Debug, Clone)]
pub struct LiquipediaSource {
    api: LiquipediaApi,
    page: String,
    optional_params: String,
}

impl LiquipediaSource {
    pub fn new(api: LiquipediaApi, page: impl Into<String>, optional_params: impl Into<String>) -> Self {
        Self { api, page: page.into(), optional_params: optional_params.into() }
    }

    pub fn page(&self) -> &str {
        &self.page
    }
}

#[async_trait]
impl MatchSource for LiquipediaSource {
    async fn fetch_round(&self) -> ApiResult<RoundData> {
        let wikitext = self.api.fetch_wikitext(&self.page, &self.optional_params).await?;
        let (ids, format) = extract_bracket_ids(&wikitext)?;
        let raw = self.api.fetch_matches(&ids).await?;

        let records = raw.iter().map(map_match_record).collect::<ApiResult<Vec<_>>>()?;
        let mut schedule = raw.iter().map(map_scheduled_match).collect::<ApiResult<Vec<_>>>()?;
        schedule.sort_by_key(|m| m.start);

        info!(
            "{}: {format} round with {} brackets, {} matches",
            self.page,
            ids.len(),
            records.len()
        );
        Ok(RoundData { format, records, schedule })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Format;
    use mockito::Matcher;
    use serde_json::json;

    fn lp_match(value: serde_json::Value) -> LpMatch {
        serde_json::from_value(value).unwrap()
    }

    fn finished_match() -> serde_json::Value {
        json!({
            "match2id": "RSTxQ88PoQ_R01-M001",
            "finished": 1,
            "winner": "2",
            "date": "2025-06-03 16:00:00",
            "bestof": 1,
            "stream": {"twitch": "BLAST_Premier"},
            "match2opponents": [{"name": "Vitality"}, {"name": "MOUZ"}]
        })
    }

    #[test]
    fn finished_match_resolves_winner_by_index() {
        let record = map_match_record(&lp_match(finished_match())).unwrap();
        assert_eq!(record, MatchRecord::new("RSTxQ88PoQ_R01-M001", "Vitality", "MOUZ", "MOUZ"));
    }

    #[test]
    fn unfinished_match_and_empty_names_use_placeholder() {
        let raw = lp_match(json!({
            "match2id": "x_R02-M001",
            "finished": 0,
            "winner": "",
            "date": "0000-01-01 00:00:00",
            "stream": [],
            "match2opponents": [{"name": ""}, {"name": "Spirit"}]
        }));
        assert_eq!(map_match_record(&raw).unwrap(), MatchRecord::new("x_R02-M001", TBD, "Spirit", TBD));

        let scheduled = map_scheduled_match(&raw).unwrap();
        assert_eq!(scheduled.start, -62167219200);
        assert_eq!(scheduled.stream, None);
        assert_eq!(scheduled.best_of, "");
        assert!(scheduled.involves_tbd());
    }

    #[test]
    fn scheduled_match_carries_date_stream_and_length() {
        let scheduled = map_scheduled_match(&lp_match(finished_match())).unwrap();
        assert_eq!(scheduled.start, 1748966400);
        assert_eq!(scheduled.best_of, "1");
        assert_eq!(scheduled.stream.as_deref(), Some("BLAST_Premier"));
        assert!(scheduled.finished);
    }

    #[test]
    fn malformed_wire_data_is_rejected() {
        let mut three = finished_match();
        three["match2opponents"] = json!([{"name": "A"}, {"name": "B"}, {"name": "C"}]);
        assert!(matches!(map_match_record(&lp_match(three)), Err(ApiError::Malformed(_))));

        let mut not_binary = finished_match();
        not_binary["finished"] = json!(2);
        assert!(matches!(map_match_record(&lp_match(not_binary)), Err(ApiError::Malformed(_))));

        let mut bad_winner = finished_match();
        bad_winner["winner"] = json!("3");
        assert!(matches!(map_match_record(&lp_match(bad_winner)), Err(ApiError::Malformed(_))));

        assert!(matches!(parse_match_date("June 3rd"), Err(ApiError::Malformed(_))));
    }

    #[tokio::test]
    async fn fetches_a_round_from_wikitext_and_match_api() {
        let mut server = mockito::Server::new_async().await;
        let page = server
            .mock("GET", "/counterstrike/BLAST/Major/2025/Austin/Stage_1")
            .match_query(Matcher::UrlEncoded("action".into(), "raw".into()))
            .with_status(200)
            .with_body("==Format==\nSwiss\n{{Matchlist|id=aaa}}\n{{Matchlist|id=bbb}}")
            .create_async()
            .await;
        let matches = server
            .mock("GET", "/api/v3/match")
            .match_header("authorization", "Apikey secret")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("wiki".into(), "counterstrike".into()),
                Matcher::UrlEncoded("limit".into(), "100".into()),
                Matcher::UrlEncoded(
                    "conditions".into(),
                    "[[match2bracketid::aaa]] OR [[match2bracketid::bbb]]".into(),
                ),
                Matcher::UrlEncoded("rawstreams".into(), "false".into()),
                Matcher::UrlEncoded("streamurls".into(), "false".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"result": [
                    {
                        "match2id": "aaa_R01-M002",
                        "finished": 0,
                        "date": "2025-06-03 19:00:00",
                        "bestof": 1,
                        "match2opponents": [{"name": "G2"}, {"name": "NAVI"}]
                    },
                    finished_match()
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let api = LiquipediaApi::new("secret", "counterstrike").with_base_urls(server.url(), server.url());
        let source = LiquipediaSource::new(api, "BLAST/Major/2025/Austin/Stage_1", "");
        let round = source.fetch_round().await.unwrap();

        page.assert_async().await;
        matches.assert_async().await;
        assert_eq!(round.format, Format::Swiss);
        assert_eq!(round.records.len(), 2);
        assert_eq!(round.schedule[0].team1, "Vitality");
        assert_eq!(round.schedule[1].team1, "G2");
    }

    #[tokio::test]
    async fn missing_page_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/counterstrike/Nowhere")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        let api = LiquipediaApi::new("k", "counterstrike").with_base_urls(server.url(), server.url());
        assert!(matches!(api.fetch_wikitext("Nowhere", "").await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn server_errors_surface_as_api_errors() {
        let mut server = mockito::Server::new_async().await;
        let _matches = server
            .mock("GET", "/api/v3/match")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        let api = LiquipediaApi::new("k", "counterstrike").with_base_urls(server.url(), server.url());
        assert!(matches!(api.fetch_matches(&["x".into()]).await, Err(ApiError::Api(..))));
    }
}
