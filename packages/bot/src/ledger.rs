//! Flat file ledger of contacted offers.
//!
//! WG-Gesucht returns the same offers across search cycles, so every
//! successful contact is recorded here and checked before messaging.
//! The ledger is a JSON array on disk, loaded once at startup and
//! rewritten after each new entry.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

/// One contacted offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactedOffer {
    pub offer_id: String,
    pub title: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

/// Ledger of offers that have already been messaged.
#[derive(Debug)]
pub struct ContactLedger {
    path: PathBuf,
    entries: Vec<ContactedOffer>,
    seen: HashSet<String>,
}

impl ContactLedger {
    /// Load the ledger from disk. A missing file is an empty ledger. A
    /// corrupt file is an error, since losing the ledger would mean
    /// re-contacting every offer in it.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries: Vec<ContactedOffer> = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("Corrupt contact ledger at {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read contact ledger at {}", path.display())
                })
            }
        };
        let seen = entries.iter().map(|entry| entry.offer_id.clone()).collect();
        Ok(Self { path, entries, seen })
    }

    /// Whether an offer has already been contacted.
    pub fn contains(&self, offer_id: &str) -> bool {
        self.seen.contains(offer_id)
    }

    /// Record a contacted offer and persist the whole ledger.
    pub fn record(&mut self, entry: ContactedOffer) -> Result<()> {
        self.seen.insert(entry.offer_id.clone());
        self.entries.push(entry);
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, json).with_context(|| {
            format!("Failed to write contact ledger at {}", self.path.display())
        })?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(offer_id: &str) -> ContactedOffer {
        ContactedOffer {
            offer_id: offer_id.to_string(),
            title: "Zimmer in Kreuzberg".to_string(),
            url: format!("https://www.wg-gesucht.de/{offer_id}.html"),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_missing_file_is_empty_ledger() {
        let dir = tempdir().unwrap();
        let ledger = ContactLedger::load(dir.path().join("contacted_offers.json")).unwrap();
        assert!(ledger.is_empty());
        assert!(!ledger.contains("11369772"));
    }

    #[test]
    fn test_record_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("contacted_offers.json");

        let mut ledger = ContactLedger::load(&path).unwrap();
        ledger.record(sample("11369772")).unwrap();
        ledger.record(sample("11369773")).unwrap();
        assert!(ledger.contains("11369772"));

        let reloaded = ContactLedger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("11369772"));
        assert!(reloaded.contains("11369773"));
        assert!(!reloaded.contains("11369774"));
    }

    #[test]
    fn test_corrupt_ledger_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("contacted_offers.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(ContactLedger::load(&path).is_err());
    }
}
