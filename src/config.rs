use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Pick'Em bot for Liquipedia-tracked tournaments.
#[derive(Debug, Clone, Parser)]
#[command(name = "pickems", version, about)]
pub struct Args {
    /// Round (stage) page name under the tournament page
    #[arg(long, env = "PICKEMS_ROUND", default_value = "Stage_1")]
    pub round: String,

    /// Display name of the tournament
    #[arg(long, env = "PICKEMS_TOURNAMENT_NAME", default_value = "AustinMajor2025")]
    pub tournament_name: String,

    /// Liquipedia page of the tournament, without the round
    #[arg(long, env = "PICKEMS_TOURNAMENT_PAGE", default_value = "BLAST/Major/2025/Austin")]
    pub tournament_page: String,

    /// Extra query parameters appended to the wikitext request
    #[arg(long, env = "PICKEMS_OPTIONAL_PARAMS", default_value = "")]
    pub optional_params: String,

    /// Liquipedia wiki the tournament lives on
    #[arg(long, env = "PICKEMS_WIKI", default_value = "counterstrike")]
    pub wiki: String,

    #[arg(long, env = "LIQUIPEDIADB_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// SQLite database holding results, schedules and predictions
    #[arg(long, env = "PICKEMS_STORE", default_value = "pickems.db")]
    pub store: PathBuf,

    /// Address for the Liquipedia webhook listener
    #[arg(long, env = "PICKEMS_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    #[arg(long, env = "PICKEMS_CHAT_WS", default_value = "ws://127.0.0.1:8787")]
    pub chat_url: String,

    #[arg(long, env = "PICKEMS_CHAT_ROOM", default_value = "pickems")]
    pub chat_room: String,

    /// Author name the bot posts under. Its own messages are ignored.
    #[arg(long, env = "PICKEMS_BOT_NAME", default_value = "pickems-bot")]
    pub bot_name: String,

    /// Overrides RUST_LOG
    #[arg(long)]
    pub log_level: Option<log::LevelFilter>,

    /// Only store the schedule at startup. For rounds whose results cannot be
    /// resolved yet.
    #[arg(long)]
    pub schedule_only: bool,
}

impl Args {
    /// Liquipedia page of the configured round.
    pub fn page(&self) -> String {
        format!("{}/{}", self.tournament_page.trim_end_matches('/'), self.round)
    }
}
