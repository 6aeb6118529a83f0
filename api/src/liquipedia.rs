/// LiquipediaDB v3 raw wire types. Mapped to domain types in client.rs.
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct MatchResponse {
    #[serde(default)]
    pub result: Vec<LpMatch>,
    #[serde(default)]
    pub error: Vec<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct LpMatch {
    pub match2id: String,
    /// 0 or 1 on the wire.
    pub finished: i64,
    /// 1-based opponent index as a string, empty while unfinished.
    #[serde(default)]
    pub winner: Option<String>,
    /// `YYYY-MM-DD HH:MM:SS`, UTC.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub bestof: Option<u32>,
    /// Usually `{"twitch": "..."}`; an empty list when the match has no streams.
    #[serde(default)]
    pub stream: Value,
    #[serde(default)]
    pub match2opponents: Vec<LpOpponent>,
}

impl LpMatch {
    pub fn twitch_stream(&self) -> Option<&str> {
        self.stream
            .get("twitch")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct LpOpponent {
    #[serde(default)]
    pub name: Option<String>,
}
