use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use fs4::tokio::AsyncFileExt;
use serde::{de::DeserializeOwned, Serialize};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::warn;

use crate::{classifier::Settings, daemon::accounting::DomainLedger, timer::TimerState};

const TIMER_FILE: &str = "timer.json";
const SETTINGS_FILE: &str = "settings.json";
const BREAKDOWN_FILE: &str = "breakdown.json";

/// Handle to the shared JSON documents. Cheap to clone; every operation opens
/// the file anew so multiple processes can interleave freely
/// (last-write-wins).
#[derive(Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The persisted timer record, or a fresh one when nothing usable is on
    /// disk. Callers decide whether to apply [TimerState::restore].
    pub async fn load_timer(&self, now: DateTime<Utc>) -> TimerState {
        self.read_json(TIMER_FILE)
            .await
            .unwrap_or_else(|| TimerState::fresh(now))
    }

    /// Persists the timer record. The record is checkpointed and `last_saved`
    /// stamped first, so a later restore knows the size of the gap.
    pub async fn save_timer(&self, timer: &mut TimerState, now: DateTime<Utc>) -> Result<()> {
        timer.checkpoint(now);
        timer.last_saved = now;
        self.write_json(TIMER_FILE, timer).await
    }

    /// User configuration; first use yields the seeded defaults.
    pub async fn load_settings(&self) -> Settings {
        self.read_json(SETTINGS_FILE).await.unwrap_or_default()
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.write_json(SETTINGS_FILE, settings).await
    }

    pub async fn load_breakdown(&self, today: NaiveDate) -> DomainLedger {
        self.read_json(BREAKDOWN_FILE)
            .await
            .unwrap_or_else(|| DomainLedger::new(today))
    }

    pub async fn save_breakdown(&self, ledger: &DomainLedger) -> Result<()> {
        self.write_json(BREAKDOWN_FILE, ledger).await
    }

    async fn read_json<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.dir.join(name);
        match read_locked(&path).await {
            Ok(Some(contents)) => match serde_json::from_str(&contents) {
                Ok(value) => Some(value),
                Err(e) => {
                    // Might happen after a shutdown cut a write short. The
                    // record degrades to its default instead of failing.
                    warn!("Corrupt document {path:?}, falling back to default: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read {path:?}: {e}");
                None
            }
        }
    }

    async fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let buffer = serde_json::to_vec(value)?;

        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await?;

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = write_with_file(&mut file, &buffer).await;
        file.unlock_async().await?;
        result
    }
}

async fn read_locked(path: &Path) -> Result<Option<String>> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    file.lock_shared()?;
    let mut contents = String::new();
    let result = file.read_to_string(&mut contents).await;
    file.unlock_async().await?;
    result?;
    Ok(Some(contents))
}

async fn write_with_file(file: &mut File, buffer: &[u8]) -> Result<()> {
    file.set_len(0).await?;
    file.write_all(buffer).await?;
    file.flush().await?;
    Ok(())
}
