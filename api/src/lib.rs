pub mod cache;
pub mod client;
pub mod elimination;
pub mod error;
pub mod identifier;
pub mod liquipedia;
pub mod normalize;
pub mod prediction;
pub mod scoring;
pub mod service;
pub mod store;
pub mod swiss;
pub mod wikitext;

use crate::error::EngineError;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

/// Placeholder used by the data source for undecided winners and unknown opponents.
pub const TBD: &str = "TBD";

// ---------------------------------------------------------------------------
// Domain types, independent of the Liquipedia wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    #[serde(rename = "swiss")]
    Swiss,
    #[serde(rename = "single-elimination")]
    SingleElimination,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Swiss => "swiss",
            Format::SingleElimination => "single-elimination",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "swiss" => Ok(Format::Swiss),
            "single-elimination" => Ok(Format::SingleElimination),
            other => Err(EngineError::UnknownFormat(other.to_owned())),
        }
    }
}

/// One match as harvested from the data source. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchRecord {
    pub id: String,
    pub team1: String,
    pub team2: String,
    pub winner: String, // team1, team2 or TBD
}

impl MatchRecord {
    pub fn new(
        id: impl Into<String>,
        team1: impl Into<String>,
        team2: impl Into<String>,
        winner: impl Into<String>,
    ) -> Self {
        Self { id: id.into(), team1: team1.into(), team2: team2.into(), winner: winner.into() }
    }

    pub fn is_decided(&self) -> bool {
        !self.winner.is_empty() && self.winner != TBD
    }

    /// The other team, if `winner` names one of the two.
    pub fn loser(&self) -> Option<&str> {
        if self.winner == self.team1 {
            Some(&self.team2)
        } else if self.winner == self.team2 {
            Some(&self.team1)
        } else {
            None
        }
    }
}

/// Stage names of a single-elimination bracket, ordered from the final backwards.
/// `GrandFinal < SemiFinal < ...`, so a smaller value is a later stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoundName {
    #[serde(rename = "Grand Final")]
    GrandFinal,
    #[serde(rename = "Semi Final")]
    SemiFinal,
    #[serde(rename = "Quarter Final")]
    QuarterFinal,
    #[serde(rename = "Best of 16")]
    BestOf16,
    #[serde(rename = "Best of 32")]
    BestOf32,
}

impl RoundName {
    /// Every supported stage, final first. Brackets deeper than this are rejected.
    pub const LADDER: [RoundName; 5] = [
        RoundName::GrandFinal,
        RoundName::SemiFinal,
        RoundName::QuarterFinal,
        RoundName::BestOf16,
        RoundName::BestOf32,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RoundName::GrandFinal => "Grand Final",
            RoundName::SemiFinal => "Semi Final",
            RoundName::QuarterFinal => "Quarter Final",
            RoundName::BestOf16 => "Best of 16",
            RoundName::BestOf32 => "Best of 32",
        }
    }

    /// Position in [`RoundName::LADDER`]; 0 is the grand final.
    pub fn depth(&self) -> usize {
        *self as usize
    }

    pub fn from_depth(depth: usize) -> Option<Self> {
        Self::LADDER.get(depth).copied()
    }

    pub fn is_later_than(&self, other: RoundName) -> bool {
        *self < other
    }
}

impl fmt::Display for RoundName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Pending,
    Advanced,
    Eliminated,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Pending => "pending",
            ProgressStatus::Advanced => "advanced",
            ProgressStatus::Eliminated => "eliminated",
        }
    }
}

/// Furthest stage a team has reached in an elimination bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamProgress {
    pub round: RoundName,
    pub status: ProgressStatus,
}

impl TeamProgress {
    pub fn new(round: RoundName, status: ProgressStatus) -> Self {
        Self { round, status }
    }
}

pub type EliminationProgress = BTreeMap<String, TeamProgress>;

/// Team name → `"wins-losses"`, kept in the order teams were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwissStandings {
    entries: Vec<(String, String)>,
}

impl SwissStandings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a team's record without changing its position.
    pub fn insert(&mut self, team: impl Into<String>, record: impl Into<String>) {
        let team = team.into();
        let record = record.into();
        match self.entries.iter_mut().find(|(t, _)| *t == team) {
            Some(entry) => entry.1 = record,
            None => self.entries.push((team, record)),
        }
    }

    pub fn get(&self, team: &str) -> Option<&str> {
        self.entries.iter().find(|(t, _)| t == team).map(|(_, r)| r.as_str())
    }

    pub fn contains(&self, team: &str) -> bool {
        self.get(team).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, r)| (t.as_str(), r.as_str()))
    }

    pub fn teams(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(t, _)| t.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Into<String>, R: Into<String>> FromIterator<(T, R)> for SwissStandings {
    fn from_iter<I: IntoIterator<Item = (T, R)>>(iter: I) -> Self {
        let mut standings = SwissStandings::new();
        for (team, record) in iter {
            standings.insert(team, record);
        }
        standings
    }
}

impl Serialize for SwissStandings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(t, r)| (t, r)))
    }
}

impl<'de> Deserialize<'de> for SwissStandings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StandingsVisitor;

        impl<'de> Visitor<'de> for StandingsVisitor {
            type Value = SwissStandings;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of team name to \"wins-losses\"")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut standings = SwissStandings::new();
                while let Some((team, record)) = map.next_entry::<String, String>()? {
                    standings.insert(team, record);
                }
                Ok(standings)
            }
        }

        deserializer.deserialize_map(StandingsVisitor)
    }
}

/// Canonical state of one round, recomputed from scratch on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "teams")]
pub enum CanonicalState {
    #[serde(rename = "swiss")]
    Swiss(SwissStandings),
    #[serde(rename = "single-elimination")]
    Elimination(EliminationProgress),
}

impl CanonicalState {
    pub fn format(&self) -> Format {
        match self {
            CanonicalState::Swiss(_) => Format::Swiss,
            CanonicalState::Elimination(_) => Format::SingleElimination,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CanonicalState::Swiss(standings) => standings.is_empty(),
            CanonicalState::Elimination(progress) => progress.is_empty(),
        }
    }

    pub fn teams(&self) -> Vec<String> {
        match self {
            CanonicalState::Swiss(standings) => standings.teams().map(str::to_owned).collect(),
            CanonicalState::Elimination(progress) => progress.keys().cloned().collect(),
        }
    }
}

/// A user's picks for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format")]
pub enum Prediction {
    #[serde(rename = "swiss")]
    Swiss {
        win: Vec<String>,
        advance: Vec<String>,
        lose: Vec<String>,
    },
    #[serde(rename = "single-elimination")]
    Elimination { progression: EliminationProgress },
}

impl Prediction {
    pub fn format(&self) -> Format {
        match self {
            Prediction::Swiss { .. } => Format::Swiss,
            Prediction::Elimination { .. } => Format::SingleElimination,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    pub id: String,
    pub name: String,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

/// Stored prediction document, unique per `(user_id, round)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub user_id: String,
    pub username: String,
    pub round: String,
    #[serde(flatten)]
    pub prediction: Prediction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreResult {
    pub successes: u32,
    pub pending: u32,
    pub failed: u32,
}

impl ScoreResult {
    pub fn total(&self) -> u32 {
        self.successes + self.pending + self.failed
    }

    /// Leaderboard ranking key.
    pub fn net(&self) -> i64 {
        i64::from(self.successes) - i64::from(self.failed)
    }
}

impl AddAssign for ScoreResult {
    fn add_assign(&mut self, rhs: Self) {
        self.successes += rhs.successes;
        self.pending += rhs.pending;
        self.failed += rhs.failed;
    }
}

/// A match from the round's schedule. Drives the cache freshness window, not scoring.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMatch {
    pub team1: String,
    pub team2: String,
    pub start: i64, // epoch seconds, UTC
    pub best_of: String,
    #[serde(default)]
    pub stream: Option<String>,
    #[serde(default)]
    pub finished: bool,
}

impl ScheduledMatch {
    pub fn involves_tbd(&self) -> bool {
        self.team1 == TBD || self.team2 == TBD
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub round: String,
    pub ttl: i64, // absolute epoch seconds
    pub state: CanonicalState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub round: String,
    pub ttl: i64,
    pub matches: Vec<ScheduledMatch>,
}

/// Everything one fetch from the data source yields for a round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundData {
    pub format: Format,
    pub records: Vec<MatchRecord>,
    pub schedule: Vec<ScheduledMatch>,
}

/// Fold a round's records into canonical state for its format.
pub fn resolve_round(format: Format, records: &[MatchRecord]) -> Result<CanonicalState, EngineError> {
    match format {
        Format::Swiss => Ok(CanonicalState::Swiss(swiss::score_swiss(records))),
        Format::SingleElimination => {
            Ok(CanonicalState::Elimination(elimination::resolve_elimination(records)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_both_tags() {
        assert_eq!("swiss".parse::<Format>().unwrap(), Format::Swiss);
        assert_eq!("Single-Elimination".parse::<Format>().unwrap(), Format::SingleElimination);
        assert!(matches!("double-elimination".parse::<Format>(), Err(EngineError::UnknownFormat(_))));
    }

    #[test]
    fn round_names_order_later_stages_first() {
        assert!(RoundName::GrandFinal.is_later_than(RoundName::SemiFinal));
        assert!(!RoundName::BestOf32.is_later_than(RoundName::BestOf16));
        assert_eq!(RoundName::from_depth(2), Some(RoundName::QuarterFinal));
        assert_eq!(RoundName::from_depth(5), None);
        assert_eq!(RoundName::BestOf16.depth(), 3);
    }

    #[test]
    fn standings_keep_first_seen_order_through_json() {
        let standings: SwissStandings =
            [("Zeta", "1-0"), ("Alpha", "0-1"), ("Mid", "0-0")].into_iter().collect();
        let json = serde_json::to_string(&standings).unwrap();
        assert_eq!(json, r#"{"Zeta":"1-0","Alpha":"0-1","Mid":"0-0"}"#);

        let back: SwissStandings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.teams().collect::<Vec<_>>(), vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn canonical_state_is_tagged_by_format() {
        let mut progress = EliminationProgress::new();
        progress.insert("A".into(), TeamProgress::new(RoundName::GrandFinal, ProgressStatus::Advanced));
        let json = serde_json::to_value(CanonicalState::Elimination(progress)).unwrap();
        assert_eq!(json["type"], "single-elimination");
        assert_eq!(json["teams"]["A"]["round"], "Grand Final");
        assert_eq!(json["teams"]["A"]["status"], "advanced");
    }

    #[test]
    fn prediction_record_flattens_format_fields() {
        let record = PredictionRecord {
            user_id: "42".into(),
            username: "zach".into(),
            round: "Stage_1".into(),
            prediction: Prediction::Swiss {
                win: vec!["A".into()],
                advance: vec![],
                lose: vec!["B".into()],
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["userId"], "42");
        assert_eq!(json["format"], "swiss");
        assert_eq!(json["win"][0], "A");

        let back: PredictionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn match_record_loser_requires_known_winner() {
        let decided = MatchRecord::new("x_R01-M001", "A", "B", "B");
        assert!(decided.is_decided());
        assert_eq!(decided.loser(), Some("A"));

        let pending = MatchRecord::new("x_R01-M001", "A", "B", TBD);
        assert!(!pending.is_decided());
        assert_eq!(pending.loser(), None);
    }
}
