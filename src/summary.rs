use crate::ledger::DAILY_BUDGET_MINUTES;
use crate::models::{CategoryTotal, DayLedger, DaySummary};
use std::collections::BTreeMap;

/// Category breakdown of a day, as shown on the dashboard.
pub fn build_summary(ledger: Option<&DayLedger>) -> DaySummary {
    let Some(ledger) = ledger else {
        return DaySummary {
            total_minutes: 0,
            hours: 0,
            minutes: 0,
            remaining_minutes: DAILY_BUDGET_MINUTES,
            activity_count: 0,
            categories: Vec::new(),
        };
    };

    let mut per_category: BTreeMap<&str, u32> = BTreeMap::new();
    for activity in ledger.activities.values() {
        let sum = per_category.entry(activity.category.as_str()).or_default();
        *sum = sum.saturating_add(activity.minutes);
    }

    let total = ledger.total_minutes;
    let mut categories: Vec<CategoryTotal> = per_category
        .into_iter()
        .map(|(category, minutes)| CategoryTotal {
            category: category.to_string(),
            minutes,
            share_percent: share_percent(minutes, total),
        })
        .collect();
    // BTreeMap order already breaks ties by name; the sort is stable.
    categories.sort_by(|a, b| b.minutes.cmp(&a.minutes));

    DaySummary {
        total_minutes: total,
        hours: total / 60,
        minutes: total % 60,
        remaining_minutes: ledger.remaining_minutes(),
        activity_count: ledger.activities.len(),
        categories,
    }
}

fn share_percent(minutes: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let share = f64::from(minutes) / f64::from(total) * 100.0;
    (share * 10.0).round() / 10.0
}
