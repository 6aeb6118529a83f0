use log::{error, warn};
use pickems_api::User;
use pickems_api::client::MatchSource;
use pickems_api::service::{Pickems, PickemsError};
use pickems_api::store::Store;

const OPENING_QUOTES: [char; 2] = ['"', '\u{201C}'];
const CLOSING_QUOTES: [char; 2] = ['"', '\u{201D}'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Details,
    Set(Vec<String>),
    Check,
    Leaderboard,
    Teams,
    Upcoming,
}

/// Split on whitespace, keeping anything inside straight or curly double quotes
/// together. The quotes themselves are dropped.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut open_token = false;

    for c in input.chars() {
        if quoted && CLOSING_QUOTES.contains(&c) {
            quoted = false;
        } else if !quoted && OPENING_QUOTES.contains(&c) {
            quoted = true;
            open_token = true;
        } else if c.is_whitespace() && !quoted {
            if open_token {
                tokens.push(std::mem::take(&mut current));
                open_token = false;
            }
        } else {
            current.push(c);
            open_token = true;
        }
    }
    if open_token {
        tokens.push(current);
    }
    tokens
}

/// `None` for anything that is not one of the bot's commands.
pub fn parse(input: &str) -> Option<Command> {
    let mut tokens = tokenize(input.trim()).into_iter();
    let command = match tokens.next()?.to_lowercase().as_str() {
        "$help" => Command::Help,
        "$details" => Command::Details,
        "$set" => Command::Set(tokens.collect()),
        "$check" => Command::Check,
        "$leaderboard" => Command::Leaderboard,
        "$teams" => Command::Teams,
        "$upcoming" => Command::Upcoming,
        _ => return None,
    };
    Some(command)
}

pub fn help_text() -> String {
    [
        concat!("PickEms Bot v", env!("CARGO_PKG_VERSION")),
        "`$details`: tournament name, round, format and the number of teams a prediction needs",
        "`$set team1 ... teamN`: sets your Pick'Ems",
        "For a swiss round, 10 teams are required: 1 & 2 are the 3-0 teams, 3-8 are the 3-1 / 3-2 teams and 9-10 are the 0-3 teams.",
        "For a single-elimination round, list half the field with the earliest exits first and the champion last. With 4 teams, 1 & 2 lose in the semifinals, 3 is the runner-up and 4 is the champion.",
        "Names are fuzzy matched, but close spellings work best. Names with spaces need quotes (e.g. \"The MongolZ\").",
        "`$check`: shows the current status of your Pick'Ems",
        "`$teams`: lists the teams in the current stage. Use these names to set your Pick'Ems",
        "`$leaderboard`: ranks users by successful minus failed picks. Ties are not broken",
        "`$upcoming`: upcoming matches in this round with confirmed teams",
    ]
    .join("\n")
}

/// Run a command for `user` and produce the reply. Failures become a short
/// message for the user and are logged.
pub async fn respond<S: Store, M: MatchSource>(
    command: &Command,
    user: &User,
    service: &Pickems<S, M>,
    now: i64,
) -> String {
    match command {
        Command::Help => help_text(),
        Command::Details => match service.tournament_info().await {
            Ok(lines) => lines.join("\n"),
            Err(e) => failure("getting tournament details", &e),
        },
        Command::Set(teams) => match service.set_prediction(user, teams).await {
            Ok(_) => format!("{}'s Pickems have been updated", user.name),
            Err(e) => {
                warn!("rejected prediction from {}: {e}", user.name);
                format!("An error occurred setting {}'s Pickems: {e}", user.name)
            }
        },
        Command::Check => match service.check_prediction(user).await {
            Ok((_, report)) => report,
            Err(PickemsError::NoPrediction(_)) => format!(
                "{} does not have any Pickems stored. Use $set to set your predictions",
                user.name
            ),
            Err(e) => failure(&format!("checking {}'s Pickems", user.name), &e),
        },
        Command::Leaderboard => match service.leaderboard().await {
            Ok(board) => board,
            Err(e) => failure("getting the leaderboard", &e),
        },
        Command::Teams => match service.valid_teams().await {
            Ok((teams, _)) => {
                let mut out = String::from("Valid teams for this stage are:");
                for team in teams {
                    out.push_str(&format!("\n- {team}"));
                }
                out
            }
            Err(e) => failure("getting the teams list", &e),
        },
        Command::Upcoming => match service.upcoming_matches(now).await {
            Ok(matches) if matches.is_empty() => "No upcoming matches".to_owned(),
            Ok(matches) => format!("Upcoming matches:\n{}", matches.join("\n")),
            Err(e) => failure("getting upcoming matches", &e),
        },
    }
}

fn failure(action: &str, e: &PickemsError) -> String {
    error!("{action} failed: {e}");
    format!("An error occurred {action}: {e}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pickems_api::client::ApiResult;
    use pickems_api::store::MemoryStore;
    use pickems_api::{Format, MatchRecord, RoundData, ScheduledMatch, TBD};

    const NOW: i64 = 1_750_000_000;

    struct FixedRound(RoundData);

    #[async_trait]
    impl MatchSource for FixedRound {
        async fn fetch_round(&self) -> ApiResult<RoundData> {
            Ok(self.0.clone())
        }
    }

    fn service() -> Pickems<MemoryStore, FixedRound> {
        let names = ["Vitality", "MOUZ", "Spirit", "FaZe", "G2", "NAVI", "Liquid", "Astralis", "The MongolZ", "Falcons"];
        let records = names
            .chunks(2)
            .enumerate()
            .map(|(i, pair)| MatchRecord::new(format!("s_R01-M{:03}", i + 1), pair[0], pair[1], pair[0]))
            .collect();
        let schedule = vec![ScheduledMatch {
            team1: "G2".into(),
            team2: "NAVI".into(),
            start: NOW + 60,
            best_of: "1".into(),
            stream: Some("BLAST".into()),
            finished: false,
        }];
        Pickems::new(
            MemoryStore::new(),
            FixedRound(RoundData { format: Format::Swiss, records, schedule }),
            "AustinMajor2025",
            "Stage_1",
        )
        .with_clock(|| NOW)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn tokenizer_groups_quoted_names() {
        assert_eq!(
            tokenize("$set \"The MongolZ\" Vitality \u{201C}Team Spirit\u{201D}  G2"),
            strings(&["$set", "The MongolZ", "Vitality", "Team Spirit", "G2"])
        );
        assert_eq!(tokenize("   "), Vec::<String>::new());
        assert_eq!(tokenize("a \"\" b"), strings(&["a", "", "b"]));
    }

    #[test]
    fn parses_known_commands_only() {
        assert_eq!(parse("$help"), Some(Command::Help));
        assert_eq!(parse("  $LEADERBOARD please"), Some(Command::Leaderboard));
        assert_eq!(parse("$set A \"B C\""), Some(Command::Set(strings(&["A", "B C"]))));
        assert_eq!(parse("$settings"), None);
        assert_eq!(parse("hello $help"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn help_describes_both_formats() {
        let help = help_text();
        assert!(help.contains("10 teams are required"));
        assert!(help.contains("the champion last"));
    }

    #[tokio::test]
    async fn unpopulated_round_reports_a_sentence() {
        let svc = service();
        let user = User::new("1", "zach");
        let reply = respond(&Command::Teams, &user, &svc, NOW).await;
        assert_eq!(
            reply,
            "An error occurred getting the teams list: no scheduled matches found for round Stage_1"
        );
    }

    #[tokio::test]
    async fn set_then_check_round_trip() {
        let svc = service();
        svc.populate(false).await.unwrap();
        let user = User::new("1", "zach");

        let check = respond(&Command::Check, &user, &svc, NOW).await;
        assert_eq!(check, "zach does not have any Pickems stored. Use $set to set your predictions");

        let Some(set) = parse(
            "$set Vitality Spirit G2 Liquid \"The MongolZ\" MOUZ FaZe NAVI Astralis Falcons",
        ) else {
            panic!("expected a command");
        };
        assert_eq!(respond(&set, &user, &svc, NOW).await, "zach's Pickems have been updated");

        let report = respond(&Command::Check, &user, &svc, NOW).await;
        assert!(report.starts_with("[3-0]\nVitality: 1-0 [Pending]"));
        assert!(report.contains("Astralis: 0-1 [Pending]"));

        let wrong = respond(&Command::Set(strings(&["Vitality"])), &user, &svc, NOW).await;
        assert_eq!(
            wrong,
            "An error occurred setting zach's Pickems: this tournament requires 10 teams but input was 1"
        );
    }

    #[tokio::test]
    async fn listings() {
        let svc = service();
        svc.populate(false).await.unwrap();
        let user = User::new("1", "zach");

        let teams = respond(&Command::Teams, &user, &svc, NOW).await;
        assert!(teams.starts_with("Valid teams for this stage are:\n- Vitality\n- MOUZ"));
        assert!(!teams.contains(TBD));

        assert_eq!(
            respond(&Command::Upcoming, &user, &svc, NOW).await,
            format!("Upcoming matches:\n- G2 VS NAVI (bo1): <t:{}>: https://www.twitch.tv/blast", NOW + 60)
        );
        assert_eq!(respond(&Command::Upcoming, &user, &svc, NOW + 120).await, "No upcoming matches");

        let details = respond(&Command::Details, &user, &svc, NOW).await;
        assert!(details.contains("Format: swiss\nNumber of required teams: 10"));
        assert_eq!(
            respond(&Command::Leaderboard, &user, &svc, NOW).await,
            "There are no user predictions currently stored"
        );
    }
}
