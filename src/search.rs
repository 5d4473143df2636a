use crate::model::Note;

pub const NO_MATCHES: &str = "No notes match your search";
pub const NO_NOTES: &str = "No notes yet. Press n to create one";

/// Notes whose title or content contains `query`, ignoring case.
/// A blank query matches everything.
pub fn filter_notes<'a>(notes: &'a [Note], query: &str) -> Vec<&'a Note> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return notes.iter().collect();
    }
    notes
        .iter()
        .filter(|n| {
            n.title.to_lowercase().contains(&needle) || n.content.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Text shown in the sidebar when the filtered list is empty.
pub fn empty_placeholder(query: &str) -> &'static str {
    if query.trim().is_empty() {
        NO_NOTES
    } else {
        NO_MATCHES
    }
}
