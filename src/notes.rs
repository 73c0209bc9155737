//! Quotes captured from the page, kept in one global list.
//!
//! Notes live under a single store key as a JSON array in insertion order
//! (oldest first). Every add or delete rewrites the whole list and emits
//! [`NotesUpdated`].

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::signal::{NotesUpdated, Signal, Subscription};
use crate::storage::LocalStore;

pub const NOTES_KEY: &str = "user_notes";
const NOTES_MAX_AGE_DAYS: i64 = 365 * 5;
const ID_SUFFIX_LEN: usize = 6;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub book_title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNote {
    pub book_title: String,
    pub author: String,
    pub text: String,
}

fn generate_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}_{suffix}", now.timestamp_millis())
}

#[derive(Default)]
pub struct NotesStore {
    updated: Signal<NotesUpdated>,
}

impl NotesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Subscription<NotesUpdated> {
        self.updated.subscribe()
    }

    /// Unreadable data reads as an empty list.
    pub fn get_notes(&self, store: &LocalStore) -> Vec<Note> {
        let Some(raw) = store.get(NOTES_KEY) else {
            return Vec::new();
        };
        serde_json::from_str(raw).unwrap_or_else(|e| {
            warn!("Ignoring unreadable notes: {e}");
            Vec::new()
        })
    }

    pub fn add_note(&mut self, store: &mut LocalStore, note: NewNote) -> Note {
        let now = Utc::now();
        let item = Note {
            id: generate_id(now),
            created_at: now,
            book_title: note.book_title,
            author: note.author,
            text: note.text,
        };
        let mut notes = self.get_notes(store);
        notes.push(item.clone());
        self.write(store, &notes);
        info!("Saved note {} ({} chars)", item.id, item.text.chars().count());
        item
    }

    /// Returns whether a note with `id` existed.
    pub fn delete_note(&mut self, store: &mut LocalStore, id: &str) -> bool {
        let mut notes = self.get_notes(store);
        let before = notes.len();
        notes.retain(|n| n.id != id);
        if notes.len() == before {
            return false;
        }
        self.write(store, &notes);
        true
    }

    fn write(&mut self, store: &mut LocalStore, notes: &[Note]) {
        match serde_json::to_string(notes) {
            Ok(json) => {
                store.set_with_max_age(NOTES_KEY, json, Duration::days(NOTES_MAX_AGE_DAYS));
                self.updated.emit(NotesUpdated { count: notes.len() });
            }
            Err(e) => warn!("Failed to encode notes: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(text: &str) -> NewNote {
        NewNote {
            book_title: "T".into(),
            author: "A".into(),
            text: text.into(),
        }
    }

    #[test]
    fn add_then_get_returns_new_entry() {
        let mut store = LocalStore::ephemeral();
        let mut notes = NotesStore::new();

        let note = notes.add_note(&mut store, quote("Q"));
        let all = notes.get_notes(&store);

        assert_eq!(all.len(), 1);
        assert_eq!(all[0].text, "Q");
        assert_eq!(all[0].id, note.id);
        assert!(all[0].created_at <= Utc::now());
    }

    #[test]
    fn ids_have_millis_and_base36_suffix() {
        let id = generate_id(Utc::now());
        let (millis, suffix) = id.split_once('_').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), ID_SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| BASE36.contains(&b)));
    }

    #[test]
    fn delete_keeps_the_others_in_order() {
        let mut store = LocalStore::ephemeral();
        let mut notes = NotesStore::new();
        let a = notes.add_note(&mut store, quote("a"));
        let b = notes.add_note(&mut store, quote("b"));
        let c = notes.add_note(&mut store, quote("c"));

        assert!(notes.delete_note(&mut store, &b.id));
        assert!(!notes.delete_note(&mut store, "missing"));

        let ids: Vec<String> = notes.get_notes(&store).into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
    }

    #[test]
    fn changes_are_signalled() {
        let mut store = LocalStore::ephemeral();
        let mut notes = NotesStore::new();
        let updates = notes.subscribe();

        let note = notes.add_note(&mut store, quote("x"));
        notes.delete_note(&mut store, &note.id);

        assert_eq!(updates.latest(), Some(NotesUpdated { count: 0 }));
    }

    #[test]
    fn corrupt_list_reads_as_empty() {
        let mut store = LocalStore::ephemeral();
        store.set(NOTES_KEY, "{not json");
        assert!(NotesStore::new().get_notes(&store).is_empty());
    }

    #[test]
    fn stored_shape_uses_camel_case() {
        let mut store = LocalStore::ephemeral();
        NotesStore::new().add_note(&mut store, quote("q"));
        let raw = store.get(NOTES_KEY).unwrap();
        assert!(raw.contains("\"bookTitle\":\"T\""));
        assert!(raw.contains("\"createdAt\""));
    }
}
