//! The status log interface shared by every store

use crate::events::{BagStatus, StatusEvent};
use chrono::{DateTime, Utc};
use satchel_core::Result;
use std::collections::BTreeMap;

/// Append-only audit trail keyed by bag identifier
///
/// Appends for different identifiers must never contend. Queries order
/// events by their caller-supplied timestamp; among equal timestamps the
/// later append wins.
pub trait StatusLog: Send + Sync {
    /// Append an already-built event
    fn append(&self, event: StatusEvent) -> Result<()>;

    /// Every event for every identifier, in no particular order
    fn get_all(&self) -> Result<Vec<StatusEvent>>;

    /// Every event for one identifier, in no particular order
    fn get_all_for(&self, identifier: &str) -> Result<Vec<StatusEvent>>;

    /// Validate `status` and append a new event
    fn create(
        &self,
        identifier: &str,
        status: &str,
        timestamp: DateTime<Utc>,
        note: Option<&str>,
    ) -> Result<StatusEvent> {
        let status: BagStatus = status.parse()?;
        let event = StatusEvent::new(identifier, status, timestamp, note.map(str::to_string));
        self.append(event.clone())?;
        Ok(event)
    }

    /// Append an event stamped with the current time
    fn record(
        &self,
        identifier: &str,
        status: BagStatus,
        note: Option<&str>,
    ) -> Result<StatusEvent> {
        let event = StatusEvent::new(identifier, status, Utc::now(), note.map(str::to_string));
        self.append(event.clone())?;
        Ok(event)
    }

    /// Most recent event for `identifier`
    fn get_latest_for(&self, identifier: &str) -> Result<Option<StatusEvent>> {
        Ok(latest(self.get_all_for(identifier)?))
    }

    /// Latest event of every identifier that has an event at or after `since`
    ///
    /// Without `since` every identifier is included. Results are sorted by identifier.
    fn get_latest_for_all(&self, since: Option<DateTime<Utc>>) -> Result<Vec<StatusEvent>> {
        Ok(latest_per_identifier(self.get_all()?, since))
    }
}

/// Most recent event of a sequence given in append order
pub fn latest(events: impl IntoIterator<Item = StatusEvent>) -> Option<StatusEvent> {
    events.into_iter().fold(None, |current, event| match current {
        Some(current) if current.timestamp > event.timestamp => Some(current),
        _ => Some(event),
    })
}

/// Reduce events (in append order per identifier) to the latest per identifier
pub fn latest_per_identifier(
    events: impl IntoIterator<Item = StatusEvent>,
    since: Option<DateTime<Utc>>,
) -> Vec<StatusEvent> {
    let mut latest_by_id: BTreeMap<String, StatusEvent> = BTreeMap::new();
    for event in events {
        match latest_by_id.get(&event.bag_identifier) {
            Some(current) if current.timestamp > event.timestamp => {}
            _ => {
                latest_by_id.insert(event.bag_identifier.clone(), event);
            }
        }
    }

    latest_by_id
        .into_values()
        .filter(|event| since.map_or(true, |since| event.timestamp >= since))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(id: &str, status: BagStatus, at: DateTime<Utc>) -> StatusEvent {
        StatusEvent::new(id, status, at, None)
    }

    #[test]
    fn test_latest_by_timestamp_not_append_order() {
        let now = Utc::now();
        let events = vec![
            event("a", BagStatus::Packed, now),
            event("a", BagStatus::Bagging, now - Duration::seconds(10)),
        ];
        assert_eq!(latest(events).unwrap().status, BagStatus::Packed);
    }

    #[test]
    fn test_latest_tie_goes_to_later_append() {
        let now = Utc::now();
        let events = vec![
            event("a", BagStatus::Depositing, now),
            event("a", BagStatus::Deposited, now),
        ];
        assert_eq!(latest(events).unwrap().status, BagStatus::Deposited);
        assert!(latest(Vec::new()).is_none());
    }

    #[test]
    fn test_latest_per_identifier_window() {
        let now = Utc::now();
        let old = now - Duration::hours(2);
        let events = vec![
            event("old", BagStatus::Deposited, old),
            event("fresh", BagStatus::Bagging, old),
            event("fresh", BagStatus::Deposited, now),
        ];

        let all = latest_per_identifier(events.clone(), None);
        assert_eq!(all.len(), 2);

        let recent = latest_per_identifier(events, Some(now - Duration::minutes(5)));
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].bag_identifier, "fresh");
        assert_eq!(recent[0].status, BagStatus::Deposited);
    }
}
