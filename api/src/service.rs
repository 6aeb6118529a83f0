use crate::cache::{CachePolicy, refresh_reason};
use crate::client::{ApiError, MatchSource};
use crate::error::EngineError;
use crate::normalize::normalize_teams;
use crate::prediction::{encode_prediction, required_teams};
use crate::scoring::{rank, score_prediction};
use crate::store::{Store, StoreError};
use crate::{
    CacheEntry, CanonicalState, Format, Prediction, PredictionRecord, RoundData, ScheduleEntry,
    ScheduledMatch, ScoreResult, User, resolve_round,
};
use chrono::Utc;
use log::{debug, info};
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum PickemsError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no scheduled matches found for round {0}")]
    NotPopulated(String),
    #[error("you have no prediction stored for round {0}")]
    NoPrediction(String),
    #[error("the following team names are invalid: {}", quoted(.0))]
    InvalidTeams(Vec<String>),
    #[error("'{0}' entered multiple times, stored prediction was not updated")]
    DuplicateTeam(String),
    #[error("no results returned for round {0}")]
    EmptyResults(String),
}

fn quoted(names: &[String]) -> String {
    names.iter().map(|n| format!("'{n}'")).collect::<Vec<_>>().join(" ")
}

pub type PickemsResult<T> = Result<T, PickemsError>;

pub const NO_PREDICTIONS: &str = "There are no user predictions currently stored";

/// Twitch channel for the stream names Liquipedia reports.
pub fn stream_url(stream: &str) -> Option<&'static str> {
    match stream {
        "BLAST_Premier" => Some("https://www.twitch.tv/blastpremier"),
        "BLAST" => Some("https://www.twitch.tv/blast"),
        _ => None,
    }
}

/// One tournament round: fetches matches, caches canonical state, and stores
/// and scores user predictions.
pub struct Pickems<S, M> {
    store: S,
    source: M,
    tournament: String,
    round: String,
    policy: CachePolicy,
    clock: fn() -> i64,
    // Serializes refreshes so concurrent callers that all see a stale cache
    // trigger a single fetch. Waiters re-check the cache once they hold it.
    refresh_lock: Mutex<()>,
}

fn system_clock() -> i64 {
    Utc::now().timestamp()
}

impl<S: Store, M: MatchSource> Pickems<S, M> {
    pub fn new(store: S, source: M, tournament: impl Into<String>, round: impl Into<String>) -> Self {
        Self {
            store,
            source,
            tournament: tournament.into(),
            round: round.into(),
            policy: CachePolicy::default(),
            clock: system_clock,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn tournament(&self) -> &str {
        &self.tournament
    }

    pub fn round(&self) -> &str {
        &self.round
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    /// Fetch the round and store its schedule. Unless `schedule_only`, also
    /// resolve and cache results, which fails for rounds the engine cannot score.
    pub async fn populate(&self, schedule_only: bool) -> PickemsResult<()> {
        let _guard = self.refresh_lock.lock().await;
        let data = self.source.fetch_round().await?;
        let now = self.now();
        self.store_schedule(&data, now).await?;
        if !schedule_only {
            self.store_results(&data, now).await?;
        }
        info!("populated {} {} ({} scheduled matches)", self.tournament, self.round, data.schedule.len());
        Ok(())
    }

    /// Canonical state of the round, refreshed first if the cached copy is
    /// missing or past its ttl.
    pub async fn match_results(&self) -> PickemsResult<CanonicalState> {
        if let Some(state) = self.cached_if_fresh().await? {
            return Ok(state);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        if let Some(state) = self.cached_if_fresh().await? {
            return Ok(state);
        }
        self.refresh_locked().await
    }

    /// Recompute unconditionally, e.g. after the source reports a page edit.
    pub async fn refresh(&self) -> PickemsResult<CanonicalState> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn cached_if_fresh(&self) -> PickemsResult<Option<CanonicalState>> {
        let now = self.now();
        let cached = self.store.results(&self.round).await?;
        match refresh_reason(cached.as_ref(), now) {
            None => {
                debug!("cache hit for {}", self.round);
                Ok(cached.map(|entry| entry.state))
            }
            Some(reason) => {
                info!("refreshing {}: {reason}", self.round);
                Ok(None)
            }
        }
    }

    async fn refresh_locked(&self) -> PickemsResult<CanonicalState> {
        let data = self.source.fetch_round().await?;
        let now = self.now();
        self.store_schedule(&data, now).await?;
        self.store_results(&data, now).await
    }

    async fn store_schedule(&self, data: &RoundData, now: i64) -> PickemsResult<()> {
        if data.schedule.is_empty() {
            return Err(PickemsError::NotPopulated(self.round.clone()));
        }
        self.store.put_schedule(ScheduleEntry {
            round: self.round.clone(),
            ttl: self.policy.ttl_for(&data.schedule, now),
            matches: data.schedule.clone(),
        })
        .await?;
        Ok(())
    }

    async fn store_results(&self, data: &RoundData, now: i64) -> PickemsResult<CanonicalState> {
        let state = resolve_round(data.format, &data.records)?;
        if state.is_empty() {
            return Err(PickemsError::EmptyResults(self.round.clone()));
        }
        let ttl = self.policy.ttl_for(&data.schedule, now);
        self.store
            .put_results(CacheEntry { round: self.round.clone(), ttl, state: state.clone() })
            .await?;
        debug!("cached {} results for {} until {ttl}", state.format(), self.round);
        Ok(state)
    }

    async fn schedule(&self) -> PickemsResult<Vec<ScheduledMatch>> {
        match self.store.schedule(&self.round).await? {
            Some(entry) if !entry.matches.is_empty() => Ok(entry.matches),
            _ => Err(PickemsError::NotPopulated(self.round.clone())),
        }
    }

    /// Team names that predictions may use, with the round's format.
    pub async fn valid_teams(&self) -> PickemsResult<(Vec<String>, Format)> {
        self.schedule().await?;
        let state = self.match_results().await?;
        Ok((state.teams(), state.format()))
    }

    pub fn required_predictions(&self, format: Format, team_count: usize) -> usize {
        required_teams(format, team_count)
    }

    /// Validate, normalize and store a user's picks for this round, replacing
    /// any earlier submission.
    pub async fn set_prediction(&self, user: &User, inputs: &[String]) -> PickemsResult<Prediction> {
        let (valid, format) = self.valid_teams().await?;
        let required = self.required_predictions(format, valid.len());
        if inputs.len() != required {
            return Err(EngineError::WrongTeamCount { expected: required, actual: inputs.len() }.into());
        }

        let teams = normalize_teams(inputs, &valid).map_err(PickemsError::InvalidTeams)?;
        let mut seen = HashSet::new();
        if let Some(dup) = teams.iter().find(|t| !seen.insert(t.as_str())) {
            return Err(PickemsError::DuplicateTeam(dup.clone()));
        }

        let prediction = encode_prediction(format, &teams, required)?;
        self.store.put_prediction(PredictionRecord {
            user_id: user.id.clone(),
            username: user.name.clone(),
            round: self.round.clone(),
            prediction: prediction.clone(),
        })
        .await?;
        info!("stored {format} prediction for {} in {}", user.name, self.round);
        Ok(prediction)
    }

    /// Score the user's stored prediction against current results.
    pub async fn check_prediction(&self, user: &User) -> PickemsResult<(ScoreResult, String)> {
        self.schedule().await?;
        let record = self
            .store
            .prediction(&user.id, &self.round)
            .await?
            .ok_or_else(|| PickemsError::NoPrediction(self.round.clone()))?;
        let state = self.match_results().await?;
        Ok(score_prediction(&record.prediction, &state)?)
    }

    /// Every user's score for the round, best `successes - failures` first.
    /// Ties keep submission order.
    pub async fn leaderboard(&self) -> PickemsResult<String> {
        self.schedule().await?;
        let state = self.match_results().await?;
        let predictions = self.store.predictions(&self.round).await?;
        if predictions.is_empty() {
            return Ok(NO_PREDICTIONS.to_owned());
        }

        let mut board = predictions
            .into_iter()
            .map(|record| {
                let (score, _) = score_prediction(&record.prediction, &state)?;
                Ok((record.username, score))
            })
            .collect::<Result<Vec<_>, EngineError>>()?;
        rank(&mut board);

        let mut out = String::from("The users with the best pickems are:\n");
        for (i, (name, score)) in board.iter().enumerate() {
            out.push_str(&format!(
                "{}. {name}, {} successes, {} failures\n",
                i + 1,
                score.successes,
                score.failed
            ));
        }
        Ok(out)
    }

    /// Matches still to be played at `now`, soonest first. Matches with an
    /// undecided opponent are left out.
    pub async fn upcoming_matches(&self, now: i64) -> PickemsResult<Vec<String>> {
        let mut matches = self.schedule().await?;
        matches.sort_by_key(|m| m.start);
        Ok(matches
            .iter()
            .filter(|m| !m.finished && m.start >= now && !m.involves_tbd())
            .map(|m| {
                let line = if m.best_of.is_empty() {
                    format!("- {} VS {}: <t:{}>", m.team1, m.team2, m.start)
                } else {
                    format!("- {} VS {} (bo{}): <t:{}>", m.team1, m.team2, m.best_of, m.start)
                };
                match m.stream.as_deref().and_then(stream_url) {
                    Some(url) => format!("{line}: {url}"),
                    None => line,
                }
            })
            .collect())
    }

    pub async fn tournament_info(&self) -> PickemsResult<Vec<String>> {
        let (teams, format) = self.valid_teams().await?;
        Ok(vec![
            format!("Tournament Name: {}", self.tournament),
            format!("Round: {}", self.round),
            format!("Format: {format}"),
            format!("Number of required teams: {}", self.required_predictions(format, teams.len())),
        ])
    }
}
