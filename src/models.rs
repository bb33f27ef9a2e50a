use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: String,
    pub title: String,
    pub category: String,
    pub minutes: u32,
}

/// All activities logged by one user on one date.
///
/// `total_minutes` is kept equal to the sum of the activities' minutes and
/// never exceeds [`crate::ledger::DAILY_BUDGET_MINUTES`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayLedger {
    pub total_minutes: u32,
    #[serde(default)]
    pub activities: BTreeMap<String, ActivityRecord>,
    pub updated_at: DateTime<Utc>,
}

impl DayLedger {
    pub fn remaining_minutes(&self) -> u32 {
        crate::ledger::DAILY_BUDGET_MINUTES.saturating_sub(self.total_minutes)
    }
}

/// Partition key of a ledger. The date is an opaque `YYYY-MM-DD` string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey {
    pub user_id: String,
    pub date: String,
}

impl DayKey {
    pub fn new(user_id: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            date: date.into(),
        }
    }
}

/// Unvalidated input for a new activity, as sent by the browser.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub minutes: Option<i64>,
}

/// Unvalidated partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDay {
    pub version: u64,
    pub ledger: DayLedger,
}

/// On-disk layout: user id -> date -> ledger.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LedgerData {
    pub users: BTreeMap<String, BTreeMap<String, StoredDay>>,
}

impl LedgerData {
    pub fn get(&self, key: &DayKey) -> Option<&StoredDay> {
        self.users.get(&key.user_id)?.get(&key.date)
    }

    pub fn insert(&mut self, key: &DayKey, day: StoredDay) {
        self.users
            .entry(key.user_id.clone())
            .or_default()
            .insert(key.date.clone(), day);
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DayResponse {
    pub user_id: String,
    pub date: String,
    pub ledger: Option<DayLedger>,
    pub remaining_minutes: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: String,
    pub ledger: DayLedger,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EditedResponse {
    pub activity: ActivityRecord,
    pub ledger: DayLedger,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub ledger: DayLedger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub minutes: u32,
    pub share_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub total_minutes: u32,
    pub hours: u32,
    pub minutes: u32,
    pub remaining_minutes: u32,
    pub activity_count: usize,
    pub categories: Vec<CategoryTotal>,
}
