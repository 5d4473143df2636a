use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "jotter", version, about = "Notes manager for a remote notes API")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Base URL of the notes API (overrides JOTTER_API_URL / NOTES_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,
    /// Comma-separated feature flags, e.g. "fallback"
    #[arg(long, global = true)]
    pub features: Option<String>,
    /// Log level: trace, debug, info, warn or error
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List notes
    List {
        /// Only show notes whose title or content contains this text
        #[arg(long, short = 's')]
        search: Option<String>,
    },
    /// Show a single note
    Show {
        /// Note id
        note_id: String,
    },
    /// Create a note
    Add {
        /// Title of the note (blank becomes "Untitled")
        title: String,
        /// Note content
        #[arg(long, short = 'c')]
        content: Option<String>,
    },
    /// Edit an existing note
    Edit {
        /// Note id to edit
        note_id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New content
        #[arg(long, short = 'c')]
        content: Option<String>,
    },
    /// Delete a note
    Delete {
        /// Note id to delete
        note_id: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Launch the interactive TUI
    Tui,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_tui() {
        let cli = Cli::try_parse_from(["jotter"]).expect("parse");
        assert!(cli.command.is_none());
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::try_parse_from([
            "jotter",
            "list",
            "--search",
            "milk",
            "--features",
            "fallback",
        ])
        .expect("parse");
        assert_eq!(cli.global.features.as_deref(), Some("fallback"));
        match cli.command {
            Some(Command::List { search }) => assert_eq!(search.as_deref(), Some("milk")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn delete_accepts_yes_flag() {
        let cli = Cli::try_parse_from(["jotter", "delete", "abc", "-y"]).expect("parse");
        match cli.command {
            Some(Command::Delete { note_id, yes }) => {
                assert_eq!(note_id, "abc");
                assert!(yes);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
