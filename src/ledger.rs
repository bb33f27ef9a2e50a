//! Pure ledger transitions.
//!
//! Every function here computes the next [`DayLedger`] from the current one
//! and never touches storage, so the client can rerun them against a freshly
//! loaded value whenever a commit loses a race.

use crate::errors::{LedgerError, Mutation};
use crate::models::{ActivityDraft, ActivityPatch, ActivityRecord, DayLedger};
use chrono::{DateTime, Utc};

pub const DAILY_BUDGET_MINUTES: u32 = 1440;
pub const DEFAULT_CATEGORY: &str = "Other";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub title: String,
    pub category: String,
    pub minutes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityChanges {
    pub title: Option<String>,
    pub category: Option<String>,
    pub minutes: Option<u32>,
}

pub fn validate_draft(draft: &ActivityDraft) -> Result<NewActivity, LedgerError> {
    let title = validate_title(&draft.title)?;
    let minutes = match draft.minutes {
        Some(minutes) => validate_minutes(minutes)?,
        None => return Err(LedgerError::validation("minutes", "minutes are required")),
    };

    Ok(NewActivity {
        title,
        category: normalize_category(draft.category.as_deref()),
        minutes,
    })
}

pub fn validate_patch(patch: &ActivityPatch) -> Result<ActivityChanges, LedgerError> {
    let title = patch.title.as_deref().map(validate_title).transpose()?;
    let minutes = patch.minutes.map(validate_minutes).transpose()?;
    let category = patch
        .category
        .as_deref()
        .map(|category| normalize_category(Some(category)));

    Ok(ActivityChanges {
        title,
        category,
        minutes,
    })
}

fn validate_title(title: &str) -> Result<String, LedgerError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(LedgerError::validation("title", "title must not be empty"));
    }
    Ok(title.to_string())
}

// Values beyond the budget are left for the budget check so the caller learns
// how many minutes are still available.
fn validate_minutes(minutes: i64) -> Result<u32, LedgerError> {
    if minutes <= 0 {
        return Err(LedgerError::validation(
            "minutes",
            "minutes must be greater than zero",
        ));
    }
    Ok(u32::try_from(minutes).unwrap_or(u32::MAX))
}

fn normalize_category(category: Option<&str>) -> String {
    match category.map(str::trim) {
        Some(category) if !category.is_empty() => category.to_string(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}

/// Inserts `activity` under `id`, creating the ledger if the day is empty.
pub fn add_activity(
    current: Option<&DayLedger>,
    id: String,
    activity: &NewActivity,
    now: DateTime<Utc>,
) -> Result<DayLedger, LedgerError> {
    let current_total = current.map_or(0, |ledger| ledger.total_minutes);
    let new_total = u64::from(current_total) + u64::from(activity.minutes);
    if new_total > u64::from(DAILY_BUDGET_MINUTES) {
        return Err(LedgerError::BudgetExceeded {
            mutation: Mutation::Add,
            remaining: DAILY_BUDGET_MINUTES.saturating_sub(current_total),
        });
    }

    let mut activities = current
        .map(|ledger| ledger.activities.clone())
        .unwrap_or_default();
    activities.insert(
        id.clone(),
        ActivityRecord {
            id,
            title: activity.title.clone(),
            category: activity.category.clone(),
            minutes: activity.minutes,
        },
    );

    Ok(DayLedger {
        total_minutes: new_total as u32,
        activities,
        updated_at: now,
    })
}

/// Applies `changes` to an existing activity. The id never changes.
pub fn edit_activity(
    current: Option<&DayLedger>,
    activity_id: &str,
    changes: &ActivityChanges,
    now: DateTime<Utc>,
) -> Result<(DayLedger, ActivityRecord), LedgerError> {
    let current = current.ok_or(LedgerError::DayNotFound)?;
    let existing = current
        .activities
        .get(activity_id)
        .ok_or(LedgerError::ActivityNotFound)?;

    let old_minutes = existing.minutes;
    let new_minutes = changes.minutes.unwrap_or(old_minutes);
    let without_old = u64::from(current.total_minutes.saturating_sub(old_minutes));
    let tentative_total = without_old + u64::from(new_minutes);
    if tentative_total > u64::from(DAILY_BUDGET_MINUTES) {
        return Err(LedgerError::BudgetExceeded {
            mutation: Mutation::Update,
            remaining: DAILY_BUDGET_MINUTES.saturating_sub(without_old as u32),
        });
    }

    let updated = ActivityRecord {
        id: existing.id.clone(),
        title: changes.title.clone().unwrap_or_else(|| existing.title.clone()),
        category: changes
            .category
            .clone()
            .unwrap_or_else(|| existing.category.clone()),
        minutes: new_minutes,
    };

    let mut next = current.clone();
    next.activities.insert(activity_id.to_string(), updated.clone());
    next.total_minutes = tentative_total as u32;
    next.updated_at = now;
    Ok((next, updated))
}

/// Removes an activity. The ledger is kept even when it ends up empty.
pub fn delete_activity(
    current: Option<&DayLedger>,
    activity_id: &str,
    now: DateTime<Utc>,
) -> Result<DayLedger, LedgerError> {
    let current = current.ok_or(LedgerError::DayNotFound)?;
    let mut next = current.clone();
    let removed = next
        .activities
        .remove(activity_id)
        .ok_or(LedgerError::ActivityNotFound)?;

    next.total_minutes = next.total_minutes.saturating_sub(removed.minutes);
    next.updated_at = now;
    Ok(next)
}

#[cfg(test)]
pub(crate) fn assert_consistent(ledger: &DayLedger) {
    let sum: u32 = ledger.activities.values().map(|activity| activity.minutes).sum();
    assert_eq!(ledger.total_minutes, sum, "total must equal the sum of activities");
    assert!(ledger.total_minutes <= DAILY_BUDGET_MINUTES);
    for (id, activity) in &ledger.activities {
        assert_eq!(id, &activity.id);
        assert!(activity.minutes > 0);
        assert!(!activity.title.is_empty());
    }
}
