//! Local preference store.
//!
//! Durable key-value state for the client: the session token pair, the
//! deadline display mode, the "show yesterday" prompt flag and the
//! installation id. Backed by a JSON file under the config dir with file
//! locking around reads and writes, or kept purely in memory.
//!
//! Values that screens react to are exposed through `tokio::sync::watch`.

use crate::data::TokenPair;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredPrefs {
    access_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(default)]
    deadline_date_mode: bool,
    should_show_yesterday: Option<bool>,
    last_checked_date: Option<NaiveDate>,
    installation_id: Option<String>,
}

impl StoredPrefs {
    fn token_pair(&self) -> Option<TokenPair> {
        match (&self.access_token, &self.refresh_token) {
            (Some(access), Some(refresh)) => Some(TokenPair::new(access, refresh)),
            _ => None,
        }
    }
}

pub struct PreferenceStore {
    path: Option<PathBuf>,
    state: Mutex<StoredPrefs>,
    deadline_date_mode: watch::Sender<bool>,
    signed_in: watch::Sender<bool>,
}

impl PreferenceStore {
    /// Open (or lazily create) a file-backed store.
    pub fn open(path: &Path) -> Result<Self> {
        let state = read_prefs(path)?;
        Ok(Self::with_state(Some(path.to_path_buf()), state))
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self::with_state(None, StoredPrefs::default())
    }

    fn with_state(path: Option<PathBuf>, state: StoredPrefs) -> Self {
        let (deadline_date_mode, _) = watch::channel(state.deadline_date_mode);
        let (signed_in, _) = watch::channel(state.token_pair().is_some());
        Self {
            path,
            state: Mutex::new(state),
            deadline_date_mode,
            signed_in,
        }
    }

    pub fn token_pair(&self) -> Option<TokenPair> {
        self.lock().token_pair()
    }

    pub fn save_token_pair(&self, pair: &TokenPair) -> Result<()> {
        self.update(|prefs| {
            prefs.access_token = Some(pair.access_token.clone());
            prefs.refresh_token = Some(pair.refresh_token.clone());
        })?;
        self.signed_in.send_replace(true);
        Ok(())
    }

    pub fn clear_token_pair(&self) -> Result<()> {
        self.update(|prefs| {
            prefs.access_token = None;
            prefs.refresh_token = None;
        })?;
        self.signed_in.send_replace(false);
        Ok(())
    }

    pub fn watch_signed_in(&self) -> watch::Receiver<bool> {
        self.signed_in.subscribe()
    }

    pub fn deadline_date_mode(&self) -> bool {
        self.lock().deadline_date_mode
    }

    pub fn set_deadline_date_mode(&self, enabled: bool) -> Result<()> {
        self.update(|prefs| prefs.deadline_date_mode = enabled)?;
        self.deadline_date_mode.send_replace(enabled);
        Ok(())
    }

    pub fn watch_deadline_date_mode(&self) -> watch::Receiver<bool> {
        self.deadline_date_mode.subscribe()
    }

    /// Whether the yesterday review should be offered. Resets to `true` on
    /// the first check of a new day.
    pub fn should_show_yesterday(&self, today: NaiveDate) -> bool {
        let prefs = self.lock();
        let last_checked = prefs.last_checked_date.unwrap_or(today);
        if last_checked != today {
            true
        } else {
            prefs.should_show_yesterday.unwrap_or(true)
        }
    }

    pub fn set_should_show_yesterday(&self, value: bool, today: NaiveDate) -> Result<()> {
        self.update(|prefs| {
            prefs.should_show_yesterday = Some(value);
            prefs.last_checked_date = Some(today);
        })
    }

    /// Stable per-installation identifier sent along with token reissue.
    /// Generated on first use.
    pub fn installation_id(&self) -> Result<String> {
        if let Some(id) = self.lock().installation_id.clone() {
            return Ok(id);
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.update(|prefs| {
            prefs.installation_id.get_or_insert_with(|| id.clone());
        })?;
        Ok(self.lock().installation_id.clone().unwrap_or(id))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoredPrefs> {
        // A poisoned lock still holds consistent data: updates are applied
        // to a clone and swapped in whole.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut StoredPrefs)) -> Result<()> {
        let mut guard = self.lock();
        let mut next = guard.clone();
        f(&mut next);
        if let Some(path) = &self.path {
            write_prefs(path, &next)?;
        }
        *guard = next;
        Ok(())
    }
}

fn read_prefs(path: &Path) -> Result<StoredPrefs> {
    if !path.exists() {
        return Ok(StoredPrefs::default());
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open preferences at {}", path.display()))?;
    file.lock_shared()?;

    let mut content = String::new();
    let mut reader = std::io::BufReader::new(&file);
    reader.read_to_string(&mut content)?;

    file.unlock()?;

    if content.trim().is_empty() {
        return Ok(StoredPrefs::default());
    }

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse preferences at {}", path.display()))
}

fn write_prefs(path: &Path, prefs: &StoredPrefs) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to write preferences to {}", path.display()))?;
    file.lock_exclusive()?;

    let content = serde_json::to_string_pretty(prefs)?;
    let mut writer = std::io::BufWriter::new(&file);
    writer.write_all(content.as_bytes())?;
    writer.flush()?;
    drop(writer);

    file.unlock()?;

    // Tokens live in this file.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}
