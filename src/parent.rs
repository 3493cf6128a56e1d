//! PIN-gated parent dashboard
//!
//! The gate shares [`SharedSettings`] with the voice session, so banned
//! words added here apply to the next question immediately.

use crate::history::HistoryEntry;
use crate::settings::{SharedSettings, is_valid_pin};

/// Confirmation shown after a successful PIN change
pub const PIN_UPDATED: &str = "PIN updated successfully!";

/// Parent surface failures
#[derive(Debug, thiserror::Error)]
pub enum ParentError {
    /// Entered PIN does not match; retry is always allowed
    #[error("Wrong PIN, try again!")]
    PinMismatch,

    /// New PIN is not four digits or differs from its confirmation
    #[error("PINs don't match or not 4 digits!")]
    InvalidNewPin,

    /// Dashboard operation attempted before unlocking
    #[error("parent dashboard is locked")]
    Locked,

    /// Settings could not be read or persisted
    #[error(transparent)]
    Settings(#[from] crate::Error),
}

/// Parent access to the shared settings
#[derive(Debug, Clone)]
pub struct ParentGate {
    settings: SharedSettings,
    unlocked: bool,
}

impl ParentGate {
    /// A locked gate over `settings`
    #[must_use]
    pub const fn new(settings: SharedSettings) -> Self {
        Self {
            settings,
            unlocked: false,
        }
    }

    #[must_use]
    pub const fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Open the dashboard with the parent PIN
    ///
    /// # Errors
    ///
    /// Returns `PinMismatch` for a wrong PIN
    pub fn unlock(&mut self, pin: &str) -> Result<(), ParentError> {
        if self.settings.lock()?.verify_pin(pin) {
            self.unlocked = true;
            tracing::info!("parent dashboard unlocked");
            Ok(())
        } else {
            tracing::info!("wrong parent PIN entered");
            Err(ParentError::PinMismatch)
        }
    }

    /// Close the dashboard
    pub fn lock(&mut self) {
        self.unlocked = false;
    }

    /// Current banned words
    ///
    /// # Errors
    ///
    /// Returns `Locked` unless unlocked
    pub fn banned_words(&self) -> Result<Vec<String>, ParentError> {
        self.ensure_unlocked()?;
        Ok(self.settings.banned_words()?)
    }

    /// Ban a word; returns whether the list changed
    ///
    /// # Errors
    ///
    /// Returns `Locked` unless unlocked, or a settings error on persistence failure
    pub fn add_banned_word(&self, word: &str) -> Result<bool, ParentError> {
        self.ensure_unlocked()?;
        Ok(self.settings.lock()?.add_banned_word(word)?)
    }

    /// Unban a word; returns whether it was present
    ///
    /// # Errors
    ///
    /// Returns `Locked` unless unlocked, or a settings error on persistence failure
    pub fn remove_banned_word(&self, word: &str) -> Result<bool, ParentError> {
        self.ensure_unlocked()?;
        Ok(self.settings.lock()?.remove_banned_word(word)?)
    }

    /// Change the PIN after confirmation
    ///
    /// # Errors
    ///
    /// Returns `InvalidNewPin` unless `new_pin` is four digits and equals
    /// `confirm`; the stored PIN is untouched on any error
    pub fn change_pin(&self, new_pin: &str, confirm: &str) -> Result<(), ParentError> {
        self.ensure_unlocked()?;
        if new_pin != confirm || !is_valid_pin(new_pin) {
            return Err(ParentError::InvalidNewPin);
        }
        self.settings.lock()?.set_pin(new_pin)?;
        Ok(())
    }

    /// Question history, most recent first
    ///
    /// # Errors
    ///
    /// Returns `Locked` unless unlocked
    pub fn history(&self) -> Result<Vec<HistoryEntry>, ParentError> {
        self.ensure_unlocked()?;
        Ok(self.settings.lock()?.history().entries().to_vec())
    }

    /// Remove all history
    ///
    /// # Errors
    ///
    /// Returns `Locked` unless unlocked, or a settings error on persistence failure
    pub fn clear_history(&self) -> Result<(), ParentError> {
        self.ensure_unlocked()?;
        self.settings.lock()?.clear_history()?;
        Ok(())
    }

    fn ensure_unlocked(&self) -> Result<(), ParentError> {
        if self.unlocked {
            Ok(())
        } else {
            Err(ParentError::Locked)
        }
    }
}
