//! Per-address points ledger (`address,rank,clicks,points`)

use crate::error::{Result, TapfleetError};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const HEADER: &str = "address,rank,clicks,points";

#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsRecord {
    pub address: String,
    pub rank: u64,
    pub clicks: u64,
    pub points: f64,
}

impl StatisticsRecord {
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split(',').map(str::trim);
        let address = parts.next()?.to_string();
        let rank = parts.next()?.parse().ok()?;
        let clicks = parts.next()?.parse().ok()?;
        let points = parts.next()?.parse().ok()?;
        if address.is_empty() {
            return None;
        }
        Some(Self {
            address,
            rank,
            clicks,
            points,
        })
    }

    fn to_line(&self) -> String {
        format!("{},{},{},{}", self.address, self.rank, self.clicks, self.points)
    }
}

/// Upserts records by address, rewriting the whole file each time
pub struct StatisticsLedger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl StatisticsLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn records(&self) -> Result<Vec<StatisticsRecord>> {
        read_records(&self.path).await
    }

    pub async fn upsert(&self, record: StatisticsRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = read_records(&self.path).await?;

        match records.iter_mut().find(|r| r.address == record.address) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }

        let mut body = String::from(HEADER);
        body.push('\n');
        for r in &records {
            body.push_str(&r.to_line());
            body.push('\n');
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, body).await.map_err(|e| {
            TapfleetError::Storage(format!("failed to write {}: {}", self.path.display(), e))
        })?;
        debug!(path = %self.path.display(), rows = records.len(), "Statistics updated");
        Ok(())
    }
}

async fn read_records(path: &Path) -> Result<Vec<StatisticsRecord>> {
    let data = match tokio::fs::read_to_string(path).await {
        Ok(v) => v,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(TapfleetError::Io(e)),
    };

    let mut records = Vec::new();
    for line in data.lines().skip(1).map(str::trim).filter(|l| !l.is_empty()) {
        match StatisticsRecord::parse(line) {
            Some(r) => records.push(r),
            None => warn!(line, "Skipping malformed statistics row"),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(address: &str, points: f64) -> StatisticsRecord {
        StatisticsRecord {
            address: address.into(),
            rank: 10,
            clicks: 5,
            points,
        }
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_replaces() {
        let path = std::env::temp_dir().join(format!(
            "tapfleet_stats_{}_{}.csv",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
        ));
        let ledger = StatisticsLedger::new(&path);

        ledger.upsert(record("A", 1.0)).await.unwrap();
        ledger.upsert(record("B", 2.0)).await.unwrap();
        ledger.upsert(record("A", 3.5)).await.unwrap();

        let records = ledger.records().await.unwrap();
        assert_eq!(records, vec![record("A", 3.5), record("B", 2.0)]);

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(raw.starts_with("address,rank,clicks,points\n"));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[test]
    fn test_parse_rejects_short_rows() {
        assert!(StatisticsRecord::parse("A,1,2").is_none());
        assert_eq!(
            StatisticsRecord::parse("A, 1, 2, 3.5"),
            Some(StatisticsRecord {
                address: "A".into(),
                rank: 1,
                clicks: 2,
                points: 3.5
            })
        );
    }
}
