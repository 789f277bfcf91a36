//! Macro store - one JSON document mapping name to macro
//!
//! Every mutation rewrites the whole file (temp file + rename), so the file on
//! disk always matches memory once a call returns. The store does not lock the
//! file: run one process per store file.

use crate::actions::{ActionRecord, Macro};
use crate::error::{MacroError, Result};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct MacroStore {
    path: PathBuf,
    macros: BTreeMap<String, Macro>,
}

impl MacroStore {
    /// Open the store at `path`, best effort.
    ///
    /// A missing file starts an empty store. A malformed or unreadable file is
    /// logged and also starts empty; the bad file is left untouched until the
    /// next successful mutation replaces it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self {
            path: path.into(),
            macros: BTreeMap::new(),
        };
        match store.load() {
            Ok(0) => {}
            Ok(n) => log::info!("Loaded {} macros from {}", n, store.path.display()),
            Err(e) => log::warn!("Starting with an empty macro store: {}", e),
        }
        store
    }

    /// Replace the in-memory macros with the file contents
    pub fn load(&mut self) -> Result<usize> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.macros.clear();
                return Ok(0);
            }
            Err(e) => return Err(MacroError::io(&self.path, e)),
        };

        let mut macros: BTreeMap<String, Macro> =
            serde_json::from_str(&text).map_err(|e| MacroError::format(&self.path, e))?;
        for (key, m) in macros.iter_mut() {
            if m.name != *key {
                log::warn!("Macro stored under '{}' was named '{}', using the key", key, m.name);
                m.name = key.clone();
            }
            let (count, duration_ms) = (m.action_count, m.duration_ms);
            m.refresh();
            if (count, duration_ms) != (m.action_count, m.duration_ms) {
                log::warn!(
                    "Macro '{}' had stale totals ({} actions, {}ms), recomputed",
                    key,
                    count,
                    duration_ms
                );
            }
        }

        self.macros = macros;
        Ok(self.macros.len())
    }

    /// Write the whole store to disk
    pub fn save(&self) -> Result<()> {
        write_json_atomic(&self.path, &self.macros)?;
        log::debug!("Saved {} macros to {}", self.macros.len(), self.path.display());
        Ok(())
    }

    /// Build a macro from `actions` and persist it. Existing names are never overwritten.
    pub fn create(
        &mut self,
        name: &str,
        description: &str,
        actions: Vec<ActionRecord>,
    ) -> Result<&Macro> {
        self.insert(Macro::new(name, description, actions))
    }

    /// Persist an already-built macro, keeping its creation time
    pub fn insert(&mut self, mut m: Macro) -> Result<&Macro> {
        if m.name.trim().is_empty() {
            return Err(MacroError::EmptyName);
        }
        if self.macros.contains_key(&m.name) {
            return Err(MacroError::DuplicateName(m.name));
        }
        m.validate()
            .map_err(|(index, reason)| MacroError::InvalidAction { index, reason })?;
        m.refresh();

        let name = m.name.clone();
        self.macros.insert(name.clone(), m);
        if let Err(e) = self.save() {
            self.macros.remove(&name);
            log::error!("Failed to save macro '{}': {}", name, e);
            return Err(e);
        }

        let m = &self.macros[&name];
        log::info!("Stored macro '{}' with {} actions", name, m.action_count);
        Ok(m)
    }

    pub fn get(&self, name: &str) -> Result<&Macro> {
        self.macros
            .get(name)
            .ok_or_else(|| MacroError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Remove and persist; returns the removed macro
    pub fn delete(&mut self, name: &str) -> Result<Macro> {
        let removed = self
            .macros
            .remove(name)
            .ok_or_else(|| MacroError::NotFound(name.to_string()))?;

        if let Err(e) = self.save() {
            log::error!("Failed to save after deleting '{}': {}", name, e);
            self.macros.insert(name.to_string(), removed);
            return Err(e);
        }

        log::info!("Deleted macro '{}'", name);
        Ok(removed)
    }

    /// Macro names, sorted
    pub fn list_names(&self) -> Vec<String> {
        self.macros.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Macro> {
        self.macros.values()
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one macro as a standalone document
    pub fn export(&self, name: &str, to: impl AsRef<Path>) -> Result<()> {
        let m = self.get(name)?;
        write_json_atomic(to.as_ref(), m)?;
        log::info!("Exported macro '{}' to {}", name, to.as_ref().display());
        Ok(())
    }

    /// Read a standalone macro document and add it to the store
    pub fn import(&mut self, from: impl AsRef<Path>) -> Result<&Macro> {
        let m = read_macro_file(from)?;
        self.insert(m)
    }
}

/// Parse a standalone macro document as written by [`MacroStore::export`]
pub fn read_macro_file(from: impl AsRef<Path>) -> Result<Macro> {
    let from = from.as_ref();
    let text = fs::read_to_string(from).map_err(|e| MacroError::io(from, e))?;
    let m: Macro = serde_json::from_str(&text).map_err(|e| MacroError::format(from, e))?;
    log::info!("Read macro '{}' from {}", m.name, from.display());
    Ok(m)
}

/// Serialize to a sibling temp file, then rename it over `path`
fn write_json_atomic<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| MacroError::io(dir, e))?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let write = || -> io::Result<()> {
        let file = File::create(&tmp)?;
        let mut w = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut w, value)?;
        writeln!(w)?;
        w.flush()?;
        w.get_ref().sync_all()?;
        Ok(())
    };
    if let Err(e) = write() {
        let _ = fs::remove_file(&tmp);
        return Err(MacroError::io(&tmp, e));
    }

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        MacroError::io(path, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Action;
    use macrobot_input::{MouseButton, Point};
    use std::time::Duration;

    fn loot_run() -> Vec<ActionRecord> {
        vec![
            ActionRecord::new(Action::move_to(Point::new(100, 100)), Duration::ZERO),
            ActionRecord::new(Action::move_to(Point::new(200, 150)), Duration::from_millis(500)),
            ActionRecord::new(
                Action::click(Point::new(200, 150), MouseButton::Left, 1),
                Duration::from_millis(40),
            ),
            ActionRecord::new(Action::combo(["ctrl", "e"]), Duration::from_millis(7)),
            ActionRecord::new(Action::scroll(-2, None), Duration::from_millis(3)),
            ActionRecord::new(Action::wait(Duration::from_millis(250)), Duration::ZERO),
        ]
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macros.json");

        let mut store = MacroStore::open(&path);
        let created = store.create("loot_run", "farm chests", loot_run()).unwrap().clone();
        store.create("empty", "", Vec::new()).unwrap();

        let reopened = MacroStore::open(&path);
        assert_eq!(reopened.len(), 2);
        let loaded = reopened.get("loot_run").unwrap();
        assert_eq!(loaded, &created);
        assert_eq!(loaded.action_count, 6);
        assert_eq!(loaded.actions[5].action, Action::wait(Duration::from_millis(250)));
        assert_eq!(reopened.get("empty").unwrap().action_count, 0);
    }

    #[test]
    fn save_of_load_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macros.json");

        let mut store = MacroStore::open(&path);
        store.create("a", "first", loot_run()).unwrap();
        store.create("b", "", loot_run()).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        MacroStore::open(&path).save().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn stale_totals_are_recomputed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macros.json");
        fs::write(
            &path,
            r#"{"m": {"name": "m", "description": "", "actions": [],
                "duration_ms": 999, "created_at": "2024-01-01T00:00:00Z", "action_count": 7}}"#,
        )
        .unwrap();

        let mut store = MacroStore::open(&path);
        assert_eq!(store.get("m").unwrap().action_count, 0);
        assert_eq!(store.get("m").unwrap().duration_ms, 0);
        store.create("other", "", loot_run()).unwrap();

        let reopened: BTreeMap<String, Macro> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reopened["m"].action_count, 0);
        assert_eq!(reopened["m"].duration_ms, 0);
        assert_eq!(reopened["other"].action_count, 6);
    }

    #[test]
    fn duplicate_name_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MacroStore::open(dir.path().join("macros.json"));
        store.create("loot_run", "original", loot_run()).unwrap();

        let err = store.create("loot_run", "impostor", Vec::new()).unwrap_err();
        assert!(matches!(err, MacroError::DuplicateName(ref n) if n == "loot_run"));

        let kept = store.get("loot_run").unwrap();
        assert_eq!(kept.description, "original");
        assert_eq!(kept.action_count, 6);
    }

    #[test]
    fn deleting_missing_macro_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macros.json");
        let mut store = MacroStore::open(&path);
        store.create("keep", "", loot_run()).unwrap();
        let names = store.list_names();
        let on_disk = fs::read_to_string(&path).unwrap();

        assert!(matches!(store.delete("ghost"), Err(MacroError::NotFound(_))));
        assert_eq!(store.list_names(), names);
        assert_eq!(fs::read_to_string(&path).unwrap(), on_disk);
    }

    #[test]
    fn delete_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macros.json");
        let mut store = MacroStore::open(&path);
        store.create("gone", "", loot_run()).unwrap();
        store.delete("gone").unwrap();

        assert!(MacroStore::open(&path).is_empty());
    }

    #[test]
    fn malformed_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macros.json");
        fs::write(&path, "{\"broken\": ").unwrap();

        let mut store = MacroStore::open(&path);
        assert!(store.is_empty());
        assert!(matches!(store.load(), Err(MacroError::Format { .. })));
    }

    #[test]
    fn failed_save_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "").unwrap();

        let mut store = MacroStore::open(blocker.join("macros.json"));
        let err = store.create("x", "", loot_run()).unwrap_err();
        assert!(matches!(err, MacroError::Io { .. }));
        assert!(!store.contains("x"));
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MacroStore::open(dir.path().join("macros.json"));
        store.create("x", "", loot_run()).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["macros.json".to_string()]);
    }

    #[test]
    fn invalid_actions_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MacroStore::open(dir.path().join("macros.json"));
        let mut actions = loot_run();
        actions.push(ActionRecord::new(Action::key(""), Duration::ZERO));

        let err = store.create("bad", "", actions).unwrap_err();
        assert!(matches!(err, MacroError::InvalidAction { index: 6, .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn export_then_import_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = MacroStore::open(dir.path().join("a.json"));
        let original = a.create("loot_run", "shared", loot_run()).unwrap().clone();
        let exported = dir.path().join("loot_run.json");
        a.export("loot_run", &exported).unwrap();

        let mut b = MacroStore::open(dir.path().join("b.json"));
        assert_eq!(b.import(&exported).unwrap(), &original);
        assert!(matches!(b.import(&exported), Err(MacroError::DuplicateName(_))));
        assert!(matches!(a.export("ghost", &exported), Err(MacroError::NotFound(_))));
    }
}
