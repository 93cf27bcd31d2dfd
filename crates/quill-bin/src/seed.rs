//! Note files on disk.
//!
//! Each `*.json` file under the notes directory holds one note:
//! `{"uuid": "...", "title": "...", "body": {"root": {...}}}`. `uuid` and
//! `body` are optional.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use quill_core::model::{Note, NoteId};
use quill_core::{Document, MemoryBackend};

#[derive(Debug, Serialize, Deserialize)]
struct NoteFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uuid: Option<NoteId>,
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<serde_json::Value>,
}

/// Note files found under one directory, keyed by note id
#[derive(Debug, Default)]
pub struct NoteFiles {
    dir: PathBuf,
    paths: HashMap<NoteId, PathBuf>,
    notes: Vec<Note>,
}

impl NoteFiles {
    /// Notes in load order
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// File a note was loaded from or last written to
    pub fn path_of(&self, uuid: &NoteId) -> Option<&Path> {
        self.paths.get(uuid).map(PathBuf::as_path)
    }

    /// Write `note` back to the file it came from, or to `<dir>/<uuid>.json`
    /// for a note without one.
    pub fn write(&mut self, note: &Note) -> Result<PathBuf> {
        let path = match self.paths.get(&note.uuid) {
            Some(path) => path.clone(),
            None => self.dir.join(file_name(&note.uuid)?),
        };
        write_note(&path, note)?;
        self.paths.insert(note.uuid.clone(), path.clone());
        Ok(path)
    }
}

/// Load every note file under `dir` into `backend`. Unreadable files are
/// skipped with a warning, as are later files repeating a note id.
pub fn load_notes(dir: &Path, backend: &MemoryBackend) -> Result<NoteFiles> {
    let mut files = NoteFiles {
        dir: dir.to_path_buf(),
        ..NoteFiles::default()
    };

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || path.extension().map_or(true, |ext| ext != "json") {
            continue;
        }

        match read_note(path) {
            Ok(note) => {
                if let Some(first) = files.paths.get(&note.uuid) {
                    warn!(
                        "skipping {}: note {} already loaded from {}",
                        path.display(),
                        note.uuid,
                        first.display()
                    );
                    continue;
                }
                backend.seed_note(note.clone());
                files.paths.insert(note.uuid.clone(), path.to_path_buf());
                files.notes.push(note);
            }
            Err(err) => warn!("skipping {}: {:#}", path.display(), err),
        }
    }

    info!("loaded {} notes from {}", files.notes.len(), dir.display());
    Ok(files)
}

fn read_note(path: &Path) -> Result<Note> {
    let text = fs::read_to_string(path)?;
    let file: NoteFile = serde_json::from_str(&text).context("not a note file")?;
    let document = match &file.body {
        Some(body) => Document::from_value(body)?,
        None => Document::new(),
    };

    let now = Utc::now();
    Ok(Note {
        uuid: file.uuid.unwrap_or_default(),
        title: file.title,
        body: document.to_json()?,
        created_at: now,
        updated_at: now,
    })
}

/// `<uuid>.json`, refusing ids that would leave the notes directory
fn file_name(uuid: &NoteId) -> Result<String> {
    let id = uuid.as_str();
    let mut components = Path::new(id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name == id && !id.contains('\\') => {
            Ok(format!("{}.json", id))
        }
        _ => bail!("note id {:?} cannot be used as a file name", id),
    }
}

fn write_note(path: &Path, note: &Note) -> Result<()> {
    let body: serde_json::Value =
        serde_json::from_str(&note.body).context("note body is not JSON")?;
    let file = NoteFile {
        uuid: Some(note.uuid.clone()),
        title: note.title.clone(),
        body: Some(body),
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&file)?)
        .with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_skips_broken_files() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("projects");
        fs::create_dir_all(&nested).unwrap();

        fs::write(
            temp_dir.path().join("a.json"),
            r#"{"uuid": "abc-123", "title": "Alpha"}"#,
        )
        .unwrap();
        fs::write(
            nested.join("b.json"),
            r#"{"title": "Beta", "body": {"root": {"type": "root", "children": []}}}"#,
        )
        .unwrap();
        fs::write(temp_dir.path().join("broken.json"), "{").unwrap();
        fs::write(
            temp_dir.path().join("bad-body.json"),
            r#"{"title": "Bad", "body": {"root": {"type": "paragraph"}}}"#,
        )
        .unwrap();
        fs::write(temp_dir.path().join("readme.md"), "# not a note").unwrap();

        let backend = MemoryBackend::new();
        let files = load_notes(temp_dir.path(), &backend).unwrap();
        let notes = files.notes();

        let titles: Vec<&str> = notes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Beta"]);
        assert_eq!(notes[0].uuid, NoteId::from("abc-123"));
        assert!(Document::from_json(&notes[0].body).is_ok());
    }

    #[test]
    fn test_written_note_loads_back() {
        let temp_dir = TempDir::new().unwrap();
        let backend = MemoryBackend::new();
        let note = backend.insert_note("Roadmap", &Document::new().to_json().unwrap());

        let mut files = load_notes(temp_dir.path(), &MemoryBackend::new()).unwrap();
        let path = files.write(&note).unwrap();
        assert!(path.ends_with(format!("{}.json", note.uuid)));

        let loaded = load_notes(temp_dir.path(), &MemoryBackend::new()).unwrap();
        let loaded = loaded.notes();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].uuid, note.uuid);
        assert_eq!(loaded[0].title, "Roadmap");
        assert_eq!(loaded[0].body, note.body);
    }

    #[test]
    fn test_rewrite_goes_to_source_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("zeta.json"),
            r#"{"uuid": "abc", "title": "Old"}"#,
        )
        .unwrap();

        let mut files = load_notes(temp_dir.path(), &MemoryBackend::new()).unwrap();
        let mut note = files.notes()[0].clone();
        note.title = "New".to_string();
        let path = files.write(&note).unwrap();
        assert_eq!(path, temp_dir.path().join("zeta.json"));

        let reloaded = load_notes(temp_dir.path(), &MemoryBackend::new()).unwrap();
        let titles: Vec<(&str, &str)> = reloaded
            .notes()
            .iter()
            .map(|n| (n.uuid.as_str(), n.title.as_str()))
            .collect();
        assert_eq!(titles, vec![("abc", "New")], "One file per note");
    }

    #[test]
    fn test_duplicate_ids_keep_first_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.json"), r#"{"uuid": "abc", "title": "First"}"#).unwrap();
        fs::write(temp_dir.path().join("b.json"), r#"{"uuid": "abc", "title": "Second"}"#).unwrap();

        let backend = MemoryBackend::new();
        let files = load_notes(temp_dir.path(), &backend).unwrap();
        assert_eq!(files.notes().len(), 1);
        assert_eq!(files.notes()[0].title, "First");
        assert_eq!(
            files.path_of(&NoteId::from("abc")),
            Some(temp_dir.path().join("a.json").as_path())
        );
    }

    #[test]
    fn test_unsafe_ids_are_not_written() {
        let temp_dir = TempDir::new().unwrap();
        let notes_dir = temp_dir.path().join("notes");
        let backend = MemoryBackend::new();
        let mut files = load_notes(&notes_dir, &backend).unwrap();

        for id in ["../x", "a/b", "..", ""] {
            let mut note = backend.insert_note("Escape", &Document::new().to_json().unwrap());
            note.uuid = NoteId::from(id);
            assert!(files.write(&note).is_err(), "{:?} should be refused", id);
        }
        assert!(!temp_dir.path().join("x.json").exists());
    }
}
