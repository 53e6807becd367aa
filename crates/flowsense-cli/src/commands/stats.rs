use clap::Subcommand;
use flowsense_core::Database;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Totals across all stored sessions
    Summary,
    /// Most recent sessions
    List {
        /// Maximum number of sessions to print
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// One stored session
    Show {
        /// Session id
        id: String,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        StatsAction::Summary => {
            let stats = db.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::List { limit } => {
            let sessions = db.list_sessions(limit)?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        StatsAction::Show { id } => match db.get_session(&id)? {
            Some(session) => println!("{}", serde_json::to_string_pretty(&session)?),
            None => return Err(format!("session not found: {id}").into()),
        },
    }
    Ok(())
}
