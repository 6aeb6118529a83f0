use crate::error::EngineError;
use crate::{EliminationProgress, Format, Prediction, ProgressStatus, RoundName, TeamProgress};

/// Bucket sizes for a swiss pick: undefeated, qualified with losses, winless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwissLayout {
    pub win: usize,
    pub advance: usize,
    pub lose: usize,
}

impl Default for SwissLayout {
    fn default() -> Self {
        Self { win: 2, advance: 6, lose: 2 }
    }
}

impl SwissLayout {
    pub fn total(&self) -> usize {
        self.win + self.advance + self.lose
    }
}

/// How many picks a submission needs. An elimination pick covers the top half
/// of the field: champion, runner-up, semifinal losers, and so on.
pub fn required_teams(format: Format, team_count: usize) -> usize {
    match format {
        Format::Swiss => SwissLayout::default().total(),
        Format::SingleElimination => team_count / 2,
    }
}

/// Turn an ordered, already-normalized team list into a prediction.
pub fn encode_prediction(
    format: Format,
    teams: &[String],
    required: usize,
) -> Result<Prediction, EngineError> {
    if teams.len() != required {
        return Err(EngineError::WrongTeamCount { expected: required, actual: teams.len() });
    }
    match format {
        Format::Swiss => encode_swiss(teams, SwissLayout::default()),
        Format::SingleElimination => encode_elimination(teams),
    }
}

/// Split positionally: the first `win` teams, the next `advance`, the last `lose`.
pub fn encode_swiss(teams: &[String], layout: SwissLayout) -> Result<Prediction, EngineError> {
    if teams.len() != layout.total() {
        return Err(EngineError::WrongTeamCount { expected: layout.total(), actual: teams.len() });
    }
    let (win, rest) = teams.split_at(layout.win);
    let (advance, lose) = rest.split_at(layout.advance);
    Ok(Prediction::Swiss { win: win.to_vec(), advance: advance.to_vec(), lose: lose.to_vec() })
}

/// Picks run from the earliest eliminations up to the champion, who is last.
///
/// The list is walked from the end. The champion is the only `advanced` entry.
/// Every other team is `eliminated` at a stage whose group size doubles going
/// backwards: 1 loses the final, 2 lose semifinals, 4 lose quarterfinals, and
/// so on.
pub fn encode_elimination(teams: &[String]) -> Result<Prediction, EngineError> {
    let (champion, rest) = teams.split_last().ok_or(EngineError::EmptyInput)?;

    let mut progression = EliminationProgress::new();
    progression.insert(
        champion.clone(),
        TeamProgress::new(RoundName::GrandFinal, ProgressStatus::Advanced),
    );

    let mut stage = 0;
    let mut stage_size = 1;
    let mut placed = 0;
    for team in rest.iter().rev() {
        let round = RoundName::from_depth(stage).ok_or(EngineError::UnsupportedDepth {
            depth: stage + 1,
            supported: RoundName::LADDER.len(),
        })?;
        progression.insert(team.clone(), TeamProgress::new(round, ProgressStatus::Eliminated));

        placed += 1;
        if placed == stage_size {
            stage += 1;
            stage_size *= 2;
            placed = 0;
        }
    }
    Ok(Prediction::Elimination { progression })
}
