use crate::error::EngineError;
use crate::identifier::decode_identifier;
use crate::{EliminationProgress, MatchRecord, ProgressStatus, RoundName, TBD, TeamProgress};

/// Rounds needed for a single-elimination bracket of `match_count` matches:
/// `ceil(log2(match_count + 1))`, since n teams play n - 1 matches.
pub fn bracket_depth(match_count: usize) -> usize {
    (usize::BITS - match_count.leading_zeros()) as usize
}

/// Stage names for a bracket of the given depth, final first.
pub fn round_ladder(depth: usize) -> Result<&'static [RoundName], EngineError> {
    let ladder: &'static [RoundName] = &RoundName::LADDER;
    ladder.get(..depth).ok_or(EngineError::UnsupportedDepth {
        depth,
        supported: RoundName::LADDER.len(),
    })
}

/// Map a match to its stage. Round 1 is the grand final; the highest round
/// number is the first round played.
pub fn round_of(record: &MatchRecord, ladder: &[RoundName]) -> Result<RoundName, EngineError> {
    let (round, _) = decode_identifier(&record.id)?;
    (round as usize)
        .checked_sub(1)
        .and_then(|index| ladder.get(index))
        .copied()
        .ok_or_else(|| EngineError::UnmappedRound {
            id: record.id.clone(),
            round,
            depth: ladder.len(),
        })
}

/// Resolve every team's furthest stage and status from an unordered match list.
///
/// The result does not depend on input order: a later stage always replaces an
/// earlier one, and within a stage a decided result replaces `pending`.
pub fn resolve_elimination(records: &[MatchRecord]) -> Result<EliminationProgress, EngineError> {
    if records.is_empty() {
        return Err(EngineError::NoMatchData);
    }
    let ladder = round_ladder(bracket_depth(records.len()))?;

    let mut progress = EliminationProgress::new();
    for record in records {
        let round = round_of(record, ladder)?;

        for team in [&record.team1, &record.team2] {
            merge(&mut progress, team, TeamProgress::new(round, ProgressStatus::Pending));
        }

        if !record.is_decided() {
            continue;
        }
        let loser = record.loser().ok_or_else(|| EngineError::InconsistentWinner {
            id: record.id.clone(),
            winner: record.winner.clone(),
        })?;
        merge(&mut progress, &record.winner, TeamProgress::new(round, ProgressStatus::Advanced));
        merge(&mut progress, loser, TeamProgress::new(round, ProgressStatus::Eliminated));
    }
    Ok(progress)
}

fn merge(progress: &mut EliminationProgress, team: &str, candidate: TeamProgress) {
    if team.is_empty() || team == TBD {
        return;
    }
    let replace = match progress.get(team) {
        None => true,
        Some(existing) if candidate.round.is_later_than(existing.round) => true,
        Some(existing) => {
            candidate.round == existing.round && candidate.status != ProgressStatus::Pending
        }
    };
    if replace {
        progress.insert(team.to_owned(), candidate);
    }
}
