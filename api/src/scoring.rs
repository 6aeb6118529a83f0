use crate::error::EngineError;
use crate::{
    CanonicalState, EliminationProgress, Prediction, ProgressStatus, RoundName, ScoreResult,
    SwissStandings,
};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Succeeded,
    Pending,
    Failed,
}

impl Verdict {
    pub fn tag(&self) -> &'static str {
        match self {
            Verdict::Succeeded => "[Succeeded]",
            Verdict::Pending => "[Pending]",
            Verdict::Failed => "[Failed]",
        }
    }

    fn tally(&self, score: &mut ScoreResult) {
        match self {
            Verdict::Succeeded => score.successes += 1,
            Verdict::Pending => score.pending += 1,
            Verdict::Failed => score.failed += 1,
        }
    }
}

/// Score a stored prediction against the current state of the same round.
/// Returns the tally and a line-per-pick report.
pub fn score_prediction(
    prediction: &Prediction,
    state: &CanonicalState,
) -> Result<(ScoreResult, String), EngineError> {
    match (prediction, state) {
        (Prediction::Swiss { win, advance, lose }, CanonicalState::Swiss(standings)) => {
            score_swiss(win, advance, lose, standings)
        }
        (Prediction::Elimination { progression }, CanonicalState::Elimination(progress)) => {
            score_elimination(progression, progress)
        }
        _ => Err(EngineError::FormatMismatch {
            prediction: prediction.format(),
            state: state.format(),
        }),
    }
}

/// Parse a `"wins-losses"` standing.
pub fn parse_standing(team: &str, standing: &str) -> Result<(u32, u32), EngineError> {
    let invalid = || EngineError::InvalidStanding {
        team: team.to_owned(),
        standing: standing.to_owned(),
    };
    let (wins, losses) = standing.split_once('-').ok_or_else(invalid)?;
    let wins = wins.trim().parse().map_err(|_| invalid())?;
    let losses = losses.trim().parse().map_err(|_| invalid())?;
    Ok((wins, losses))
}

fn undefeated(wins: u32, losses: u32) -> Verdict {
    if losses >= 1 {
        Verdict::Failed
    } else if wins != 3 {
        Verdict::Pending
    } else {
        Verdict::Succeeded
    }
}

fn advancing(wins: u32, losses: u32) -> Verdict {
    if losses == 3 || (wins == 3 && losses == 0) {
        Verdict::Failed
    } else if wins < 3 {
        Verdict::Pending
    } else {
        Verdict::Succeeded
    }
}

fn winless(wins: u32, losses: u32) -> Verdict {
    if wins >= 1 {
        Verdict::Failed
    } else if losses != 3 {
        Verdict::Pending
    } else {
        Verdict::Succeeded
    }
}

fn score_swiss(
    win: &[String],
    advance: &[String],
    lose: &[String],
    standings: &SwissStandings,
) -> Result<(ScoreResult, String), EngineError> {
    let categories: [(&str, &[String], fn(u32, u32) -> Verdict); 3] = [
        ("[3-0]", win, undefeated),
        ("[3-1, 3-2]", advance, advancing),
        ("[0-3]", lose, winless),
    ];

    let mut score = ScoreResult::default();
    let mut report = String::new();
    for (header, teams, rule) in categories {
        let _ = writeln!(report, "{header}");
        for team in teams {
            let Some(standing) = standings.get(team) else {
                Verdict::Failed.tally(&mut score);
                let _ = writeln!(report, "{team}: [Missing score] [Failed]");
                continue;
            };
            let (wins, losses) = parse_standing(team, standing)?;
            let verdict = rule(wins, losses);
            verdict.tally(&mut score);
            let _ = writeln!(report, "{team}: {standing} {}", verdict.tag());
        }
    }
    Ok((score, report))
}

fn score_elimination(
    predicted: &EliminationProgress,
    actual: &EliminationProgress,
) -> Result<(ScoreResult, String), EngineError> {
    if predicted.is_empty() || actual.is_empty() {
        return Err(EngineError::EmptyInput);
    }

    let mut score = ScoreResult::default();
    let mut report = String::new();
    for (team, pick) in predicted {
        let verdict = match actual.get(team) {
            None => Verdict::Pending,
            Some(result) if result.status == ProgressStatus::Pending => Verdict::Pending,
            Some(result) if result == pick => Verdict::Succeeded,
            Some(_) => Verdict::Failed,
        };
        verdict.tally(&mut score);

        if pick.round == RoundName::GrandFinal && pick.status == ProgressStatus::Advanced {
            let _ = writeln!(report, "- {team} to win the {} {}", pick.round, verdict.tag());
        } else {
            let _ = writeln!(report, "- {team} to make it to the {} {}", pick.round, verdict.tag());
        }
    }
    Ok((score, report))
}

/// Stable sort by `successes - failed`, best first. Equal scores keep their input order.
pub fn rank<T>(entries: &mut [(T, ScoreResult)]) {
    entries.sort_by(|a, b| b.1.net().cmp(&a.1.net()));
}
