use crate::{MatchRecord, SwissStandings, TBD};
use std::collections::HashMap;

/// Fold a swiss round's matches into `"wins-losses"` standings.
///
/// Undecided matches still register both teams. A winner naming neither team is
/// a data inconsistency and the match is skipped. The `TBD` placeholder never
/// appears in the output.
pub fn score_swiss(records: &[MatchRecord]) -> SwissStandings {
    let mut teams: Vec<&str> = Vec::new();
    let mut wins: HashMap<&str, u32> = HashMap::new();
    let mut losses: HashMap<&str, u32> = HashMap::new();

    for record in records {
        for team in [record.team1.as_str(), record.team2.as_str()] {
            if !teams.contains(&team) {
                teams.push(team);
            }
        }

        if !record.is_decided() {
            continue;
        }
        let Some(loser) = record.loser() else {
            continue;
        };
        *wins.entry(record.winner.as_str()).or_default() += 1;
        *losses.entry(loser).or_default() += 1;
    }

    teams
        .into_iter()
        .filter(|team| *team != TBD)
        .map(|team| {
            let w = wins.get(team).copied().unwrap_or(0);
            let l = losses.get(team).copied().unwrap_or(0);
            (team, format!("{w}-{l}"))
        })
        .collect()
}
