use anyhow::{Context, Result};
use clap::Parser;
use jotter::cli::{self, Command};
use jotter::commands;
use jotter::config::{Config, Overrides};
use jotter::logging;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let overrides = Overrides {
        api_url: args.global.api_url,
        features: args.global.features,
        log_level: args.global.log_level,
    };
    let config = Config::load(&overrides).context("loading configuration")?;
    if let Some(dir) = logging::default_log_dir() {
        if let Err(err) = logging::init_logging(&config.log_level, &dir) {
            eprintln!("warning: file logging disabled: {}", err);
        }
    }

    let command = args.command.unwrap_or(Command::Tui);
    match command {
        Command::List { search } => commands::list(&config, search),
        Command::Show { note_id } => commands::show(&config, note_id),
        Command::Add { title, content } => commands::add(&config, title, content),
        Command::Edit {
            note_id,
            title,
            content,
        } => commands::edit(&config, note_id, title, content),
        Command::Delete { note_id, yes } => commands::delete(&config, note_id, yes),
        Command::Tui => commands::tui(&config),
    }
}
