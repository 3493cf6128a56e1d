//! Parental settings: PIN, banned words, and question history
//!
//! A single owned [`Settings`] value is shared between the voice session and
//! the parent surface through [`SharedSettings`]. Every mutation is written
//! to the key-value store before it becomes visible in memory.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::history::{HistoryEntry, HistoryLog};
use crate::store::{BANNED_WORDS_KEY, HISTORY_KEY, KeyValueStore, PIN_KEY};
use crate::{Error, Result};

/// PIN used until a parent changes it
pub const DEFAULT_PIN: &str = "1234";

/// Whether `pin` is exactly four ASCII digits
#[must_use]
pub fn is_valid_pin(pin: &str) -> bool {
    pin.len() == 4 && pin.bytes().all(|b| b.is_ascii_digit())
}

/// Parental settings backed by a key-value store
pub struct Settings {
    store: Arc<dyn KeyValueStore>,
    pin: String,
    banned_words: Vec<String>,
    history: HistoryLog,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("banned_words", &self.banned_words.len())
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Load settings from the store, falling back to defaults for missing
    /// or unreadable values
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let pin = match store.get(PIN_KEY)? {
            Some(pin) if is_valid_pin(&pin) => pin,
            Some(_) => {
                tracing::warn!("stored PIN is malformed, using default");
                DEFAULT_PIN.to_string()
            }
            None => DEFAULT_PIN.to_string(),
        };

        let banned_words: Vec<String> = load_json(store.as_ref(), BANNED_WORDS_KEY)?;
        let history = HistoryLog::from_entries(load_json(store.as_ref(), HISTORY_KEY)?);

        tracing::debug!(
            banned_words = banned_words.len(),
            history = history.len(),
            "settings loaded"
        );

        Ok(Self {
            store,
            pin,
            banned_words,
            history,
        })
    }

    /// Check an entered PIN by exact comparison
    #[must_use]
    pub fn verify_pin(&self, entered: &str) -> bool {
        self.pin == entered
    }

    /// Replace the PIN
    ///
    /// # Errors
    ///
    /// Returns error if the PIN is not four digits or cannot be persisted
    pub fn set_pin(&mut self, pin: &str) -> Result<()> {
        if !is_valid_pin(pin) {
            return Err(Error::Settings("PIN must be exactly 4 digits".to_string()));
        }
        self.store.set(PIN_KEY, pin)?;
        self.pin = pin.to_string();
        tracing::info!("parent PIN changed");
        Ok(())
    }

    /// Banned words in insertion order
    #[must_use]
    pub fn banned_words(&self) -> &[String] {
        &self.banned_words
    }

    /// Add a banned word
    ///
    /// The word is trimmed; empty words and case-insensitive duplicates are
    /// ignored. Returns whether the list changed.
    ///
    /// # Errors
    ///
    /// Returns error if the list cannot be persisted
    pub fn add_banned_word(&mut self, word: &str) -> Result<bool> {
        let word = word.trim();
        if word.is_empty() {
            return Ok(false);
        }

        let lower = word.to_lowercase();
        if self.banned_words.iter().any(|w| w.to_lowercase() == lower) {
            tracing::debug!(word, "banned word already present");
            return Ok(false);
        }

        let mut updated = self.banned_words.clone();
        updated.push(word.to_string());
        save_json(self.store.as_ref(), BANNED_WORDS_KEY, &updated)?;
        self.banned_words = updated;

        tracing::info!(word, "banned word added");
        Ok(true)
    }

    /// Remove a banned word (case-insensitive). Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns error if the list cannot be persisted
    pub fn remove_banned_word(&mut self, word: &str) -> Result<bool> {
        let lower = word.trim().to_lowercase();
        let Some(index) = self
            .banned_words
            .iter()
            .position(|w| w.to_lowercase() == lower)
        else {
            return Ok(false);
        };

        let mut updated = self.banned_words.clone();
        let removed = updated.remove(index);
        save_json(self.store.as_ref(), BANNED_WORDS_KEY, &updated)?;
        self.banned_words = updated;

        tracing::info!(word = %removed, "banned word removed");
        Ok(true)
    }

    /// Question history, most recent first
    #[must_use]
    pub const fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Append an answered question to the history
    ///
    /// # Errors
    ///
    /// Returns error if the history cannot be persisted
    pub fn record(&mut self, entry: HistoryEntry) -> Result<()> {
        let mut updated = self.history.clone();
        updated.push(entry);
        save_json(self.store.as_ref(), HISTORY_KEY, updated.entries())?;
        self.history = updated;
        Ok(())
    }

    /// Remove all history entries
    ///
    /// # Errors
    ///
    /// Returns error if the history cannot be persisted
    pub fn clear_history(&mut self) -> Result<()> {
        save_json::<[HistoryEntry]>(self.store.as_ref(), HISTORY_KEY, &[])?;
        self.history.clear();
        tracing::info!("history cleared");
        Ok(())
    }
}

/// Settings handle shared by the voice session and the parent surface
#[derive(Debug, Clone)]
pub struct SharedSettings {
    inner: Arc<Mutex<Settings>>,
}

impl SharedSettings {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(settings)),
        }
    }

    /// Load settings from a store and wrap them for sharing
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Settings::load(store).map(Self::new)
    }

    /// Lock the settings for reading or mutation
    ///
    /// # Errors
    ///
    /// Returns error if a previous holder panicked
    pub fn lock(&self) -> Result<MutexGuard<'_, Settings>> {
        self.inner
            .lock()
            .map_err(|_| Error::Settings("settings lock poisoned".to_string()))
    }

    /// Snapshot of the banned-word list
    ///
    /// # Errors
    ///
    /// Returns error if the settings lock is poisoned
    pub fn banned_words(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.banned_words().to_vec())
    }

    /// Append an answered question to the history
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned or persistence fails
    pub fn record(&self, entry: HistoryEntry) -> Result<()> {
        self.lock()?.record(entry)
    }
}

fn load_json<T>(store: &dyn KeyValueStore, key: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(raw) = store.get(key)? else {
        return Ok(T::default());
    };

    Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(key, error = %e, "stored value is malformed, using default");
        T::default()
    }))
}

fn save_json<T>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}
