//! In-process status log

use crate::events::StatusEvent;
use crate::store::StatusLog;
use satchel_core::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

type Shard = Arc<Mutex<Vec<StatusEvent>>>;

/// Status log held in memory, one locked shard per identifier
#[derive(Debug, Default)]
pub struct MemoryStatusLog {
    shards: RwLock<HashMap<String, Shard>>,
}

impl MemoryStatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, identifier: &str) -> Shard {
        if let Some(shard) = self
            .shards
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(identifier)
        {
            return Arc::clone(shard);
        }

        let mut shards = self.shards.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(shards.entry(identifier.to_string()).or_default())
    }
}

impl StatusLog for MemoryStatusLog {
    fn append(&self, event: StatusEvent) -> Result<()> {
        let shard = self.shard(&event.bag_identifier);
        shard.lock().unwrap_or_else(|e| e.into_inner()).push(event);
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<StatusEvent>> {
        let shards: Vec<Shard> = self
            .shards
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();

        let mut events = Vec::new();
        for shard in shards {
            events.extend(shard.lock().unwrap_or_else(|e| e.into_inner()).iter().cloned());
        }
        Ok(events)
    }

    fn get_all_for(&self, identifier: &str) -> Result<Vec<StatusEvent>> {
        let shard = self
            .shards
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(identifier)
            .cloned();
        Ok(match shard {
            Some(shard) => shard.lock().unwrap_or_else(|e| e.into_inner()).clone(),
            None => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BagStatus;
    use chrono::{Duration, Utc};
    use std::thread;

    #[test]
    fn test_same_semantics_as_file_store() {
        let log = MemoryStatusLog::new();
        let now = Utc::now();
        log.create("rac.1", "depositing", now, None).unwrap();
        log.create("rac.1", "deposited", now, None).unwrap();
        log.create("rac.2", "failed", now - Duration::days(1), Some("TransportError: 503"))
            .unwrap();

        assert!(log.create("rac.1", "nope", now, None).is_err());
        assert_eq!(log.get_all().unwrap().len(), 3);
        assert_eq!(
            log.get_latest_for("rac.1").unwrap().unwrap().status,
            BagStatus::Deposited
        );

        let recent = log.get_latest_for_all(Some(now - Duration::hours(1))).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].bag_identifier, "rac.1");
    }

    #[test]
    fn test_concurrent_appends() {
        let log = Arc::new(MemoryStatusLog::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for _ in 0..100 {
                        log.record(&format!("rac.{}", i % 4), BagStatus::Packing, None)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.get_all().unwrap().len(), 800);
        assert_eq!(log.get_all_for("rac.0").unwrap().len(), 200);
    }
}
