//! Shopper preferences
//!
//! The selected display currency survives between sessions. A store that has never
//! been written to has no preference, and callers fall back to USD.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::currency::CurrencyCode;

/// Errors raised by a preference store.
#[derive(Debug, Error)]
pub enum PreferenceError {
    /// The preferences file could not be read or written.
    #[error("Failed to access preferences: {0}")]
    Io(#[from] io::Error),

    /// The preferences file is malformed.
    #[error("Failed to parse preferences: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// The in-memory store was poisoned by a panicking writer.
    #[error("preference store lock poisoned")]
    Poisoned,
}

impl<T> From<PoisonError<T>> for PreferenceError {
    fn from(_error: PoisonError<T>) -> Self {
        PreferenceError::Poisoned
    }
}

/// Persisted shopper preferences
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Last display currency the shopper picked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_currency: Option<CurrencyCode>,
}

/// Somewhere to keep the selected display currency.
#[automock]
pub trait PreferenceStore: Send + Sync {
    /// The stored currency, if one was ever saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_currency(&self) -> Result<Option<CurrencyCode>, PreferenceError>;

    /// Remember `currency` for later sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn save_currency(&self, currency: CurrencyCode) -> Result<(), PreferenceError>;
}

/// Process-local store, mostly useful in tests.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    currency: Mutex<Option<CurrencyCode>>,
}

impl MemoryPreferenceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load_currency(&self) -> Result<Option<CurrencyCode>, PreferenceError> {
        Ok(*self.currency.lock()?)
    }

    fn save_currency(&self, currency: CurrencyCode) -> Result<(), PreferenceError> {
        *self.currency.lock()? = Some(currency);

        Ok(())
    }
}

/// Preferences kept in a small YAML file.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    /// Use the file at `path`. It does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the preferences file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Preferences, PreferenceError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_norway::from_str(&contents)?),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(Preferences::default()),
            Err(error) => Err(error.into()),
        }
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn load_currency(&self) -> Result<Option<CurrencyCode>, PreferenceError> {
        Ok(self.read()?.selected_currency)
    }

    fn save_currency(&self, currency: CurrencyCode) -> Result<(), PreferenceError> {
        let mut preferences = self.read()?;

        preferences.selected_currency = Some(currency);

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.path, serde_norway::to_string(&preferences)?)?;

        debug!(path = %self.path.display(), %currency, "saved currency preference");

        Ok(())
    }
}
