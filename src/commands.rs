use crate::api::{NotesApi, NotesClient};
use crate::config::Config;
use crate::model::{Note, NoteDraft, NotePatch};
use crate::search::{empty_placeholder, filter_notes};
use crate::ui;
use anyhow::{bail, Context, Result};
use std::io::{self, BufRead, Write};

pub fn list(config: &Config, search: Option<String>) -> Result<()> {
    let mut client = NotesClient::from_config(config);
    let notes = client.list().context("listing notes")?;
    let query = search.unwrap_or_default();
    let filtered = filter_notes(&notes, &query);
    if filtered.is_empty() {
        println!("{}", empty_placeholder(&query));
        return Ok(());
    }
    for note in filtered {
        print_summary(note);
    }
    Ok(())
}

pub fn show(config: &Config, note_id: String) -> Result<()> {
    let mut client = NotesClient::from_config(config);
    let note = client
        .get(&note_id)
        .with_context(|| format!("fetching note {}", note_id))?;
    print_note(&note);
    Ok(())
}

pub fn add(config: &Config, title: String, content: Option<String>) -> Result<()> {
    let mut client = NotesClient::from_config(config);
    let draft = NoteDraft::new(title, content.unwrap_or_default());
    let note = client.create(&draft).context("creating note")?;
    println!("Added note {} ({})", note.id, note.title);
    Ok(())
}

pub fn edit(
    config: &Config,
    note_id: String,
    title: Option<String>,
    content: Option<String>,
) -> Result<()> {
    let patch = NotePatch::new(title, content);
    if patch.is_empty() {
        bail!("nothing to change: pass --title and/or --content");
    }
    let mut client = NotesClient::from_config(config);
    let note = client
        .update(&note_id, &patch)
        .with_context(|| format!("updating note {}", note_id))?;
    println!("Updated note {} ({})", note.id, note.title);
    Ok(())
}

pub fn delete(config: &Config, note_id: String, yes: bool) -> Result<()> {
    if !yes {
        let stdin = io::stdin();
        if !confirm(&mut stdin.lock(), &format!("Delete note {}?", note_id))? {
            println!("Delete canceled");
            return Ok(());
        }
    }
    let mut client = NotesClient::from_config(config);
    client
        .delete(&note_id)
        .with_context(|| format!("deleting note {}", note_id))?;
    println!("Deleted note {}", note_id);
    Ok(())
}

pub fn tui(config: &Config) -> Result<()> {
    let client = NotesClient::from_config(config);
    ui::run(client, config)
}

fn confirm(input: &mut impl BufRead, prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn print_summary(note: &Note) {
    println!(
        "  - {}: {}  ({})",
        note.id,
        note.title,
        note.updated_at.format("%Y-%m-%d %H:%M")
    );
}

fn print_note(note: &Note) {
    println!("{}", note.title);
    println!("id: {}", note.id);
    println!("updated: {}", note.updated_at.to_rfc3339());
    if !note.content.is_empty() {
        println!();
        println!("{}", note.content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn confirm_accepts_only_yes() {
        assert!(confirm(&mut Cursor::new("y\n"), "Delete?").expect("read"));
        assert!(confirm(&mut Cursor::new("YES\n"), "Delete?").expect("read"));
        assert!(!confirm(&mut Cursor::new("\n"), "Delete?").expect("read"));
        assert!(!confirm(&mut Cursor::new("nope\n"), "Delete?").expect("read"));
    }
}
