use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSettings {
    pub enabled: bool,
    pub hour: u32,
    pub minute: u32,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            hour: 20,
            minute: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserPrefs {
    pub dark_mode: bool,
    pub notifications_enabled: bool,
    pub location_enabled: bool,
    pub reminder: ReminderSettings,
}

impl Default for UserPrefs {
    fn default() -> Self {
        Self {
            dark_mode: false,
            notifications_enabled: true,
            location_enabled: false,
            reminder: ReminderSettings::default(),
        }
    }
}

/// Scalar user preferences, persisted as a JSON file next to the database.
/// An unreadable or missing file falls back to defaults.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserPrefs>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserPrefs::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn prefs(&self) -> UserPrefs {
        self.data.read().unwrap().clone()
    }

    pub fn notifications_enabled(&self) -> bool {
        self.data.read().unwrap().notifications_enabled
    }

    pub fn set_dark_mode(&self, enabled: bool) -> Result<()> {
        self.update(|prefs| prefs.dark_mode = enabled)
    }

    pub fn set_notifications_enabled(&self, enabled: bool) -> Result<()> {
        self.update(|prefs| prefs.notifications_enabled = enabled)
    }

    pub fn set_location_enabled(&self, enabled: bool) -> Result<()> {
        self.update(|prefs| prefs.location_enabled = enabled)
    }

    pub fn update_reminder(&self, reminder: ReminderSettings) -> Result<()> {
        self.update(|prefs| prefs.reminder = reminder)
    }

    fn update(&self, mutate: impl FnOnce(&mut UserPrefs)) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        mutate(&mut guard);
        self.persist(&guard)
    }

    fn persist(&self, data: &UserPrefs) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
