//! Donation storage.
//!
//! Best effort: records are kept in memory and, for [`JsonlStore`],
//! appended to a JSON-lines file.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::error::StoreError;
use crate::common::messages::Donation;

/// A stored donation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationRecord {
    pub user: String,
    pub channel: String,
    pub send_from: String,
    pub amount: u64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl DonationRecord {
    pub fn new(donation: &Donation, created_at: DateTime<Utc>) -> Self {
        Self {
            user: donation.user.clone(),
            channel: donation.channel.clone(),
            send_from: donation.send_from.clone(),
            amount: donation.amount,
            text: donation.text.clone(),
            created_at,
        }
    }
}

/// Donation sum for one channel over a date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelTotal {
    pub channel: String,
    pub amount: u64,
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
}

/// Append/query interface used by ingestion and console commands.
pub trait DonationStore: Send + Sync {
    /// Append an already timestamped record.
    fn append(&self, record: DonationRecord) -> Result<(), StoreError>;

    /// Per-channel totals for records in `[from, to]`, sorted by channel.
    fn totals_by_channel(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ChannelTotal>, StoreError>;

    /// Record a donation stamped with the current time.
    fn insert(&self, donation: &Donation) -> Result<DonationRecord, StoreError> {
        let record = DonationRecord::new(donation, Utc::now());
        self.append(record.clone())?;
        Ok(record)
    }
}

fn totals(
    records: &[DonationRecord],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<ChannelTotal> {
    let mut by_channel: BTreeMap<&str, ChannelTotal> = BTreeMap::new();

    for record in records
        .iter()
        .filter(|r| r.created_at >= from && r.created_at <= to)
    {
        by_channel
            .entry(record.channel.as_str())
            .and_modify(|total| {
                total.amount = total.amount.saturating_add(record.amount);
                total.first = total.first.min(record.created_at);
                total.last = total.last.max(record.created_at);
            })
            .or_insert_with(|| ChannelTotal {
                channel: record.channel.clone(),
                amount: record.amount,
                first: record.created_at,
                last: record.created_at,
            });
    }

    by_channel.into_values().collect()
}

/// In-process store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<DonationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn records(&self) -> Vec<DonationRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DonationStore for MemoryStore {
    fn append(&self, record: DonationRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }

    fn totals_by_channel(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ChannelTotal>, StoreError> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(totals(&records, from, to))
    }
}

struct JsonlInner {
    records: Vec<DonationRecord>,
    file: File,
}

/// JSON-lines file store: one record per line, loaded fully at open.
pub struct JsonlStore {
    path: PathBuf,
    inner: Mutex<JsonlInner>,
}

impl JsonlStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        };

        let mut records = Vec::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path).map_err(io_err)?);
            for (index, line) in reader.lines().enumerate() {
                let line = line.map_err(io_err)?;
                if line.trim().is_empty() {
                    continue;
                }
                let record = serde_json::from_str(&line).map_err(|source| StoreError::Corrupt {
                    line: index + 1,
                    source,
                })?;
                records.push(record);
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        info!(
            "Opened donation store {} ({} records)",
            path.display(),
            records.len()
        );

        Ok(Self {
            path,
            inner: Mutex::new(JsonlInner { records, file }),
        })
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }
}

impl DonationStore for JsonlStore {
    fn append(&self, record: DonationRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .file
            .write_all(line.as_bytes())
            .map_err(|source| StoreError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        inner.records.push(record);
        Ok(())
    }

    fn totals_by_channel(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ChannelTotal>, StoreError> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(totals(&inner.records, from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    fn record(channel: &str, amount: u64, day: u32) -> DonationRecord {
        let donation = Donation::new("streamelements", channel, amount, "Alice donated");
        DonationRecord::new(&donation, at(day))
    }

    #[test]
    fn test_totals_group_and_filter() {
        let store = MemoryStore::new();
        store.append(record("bar", 100, 1)).unwrap();
        store.append(record("bar", 50, 5)).unwrap();
        store.append(record("alpha", 7, 3)).unwrap();
        store.append(record("bar", 1000, 20)).unwrap();

        let totals = store.totals_by_channel(at(1), at(10)).unwrap();
        assert_eq!(
            totals,
            vec![
                ChannelTotal {
                    channel: "alpha".to_string(),
                    amount: 7,
                    first: at(3),
                    last: at(3),
                },
                ChannelTotal {
                    channel: "bar".to_string(),
                    amount: 150,
                    first: at(1),
                    last: at(5),
                },
            ]
        );
    }

    #[test]
    fn test_insert_stamps_now() {
        let store = MemoryStore::new();
        let before = Utc::now();
        let saved = store
            .insert(&Donation::new("bot", "bar", 5, "Bob donated $5"))
            .unwrap();
        assert!(saved.created_at >= before);
        assert_eq!(saved.send_from, "Bob");
        assert_eq!(store.records().len(), 1);
    }

    #[test]
    fn test_jsonl_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("donations.jsonl");

        {
            let store = JsonlStore::open(&path).unwrap();
            store.append(record("bar", 10, 2)).unwrap();
            store.append(record("bar", 15, 3)).unwrap();
        }

        let reopened = JsonlStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        let totals = reopened.totals_by_channel(at(1), at(4)).unwrap();
        assert_eq!(totals[0].amount, 25);
    }

    #[test]
    fn test_jsonl_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("donations.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();

        assert!(matches!(
            JsonlStore::open(&path),
            Err(StoreError::Corrupt { line: 1, .. })
        ));
    }
}
