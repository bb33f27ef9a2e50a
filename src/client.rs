use crate::config::RetryPolicy;
use crate::errors::LedgerError;
use crate::ledger::{self, ActivityChanges, NewActivity};
use crate::models::{ActivityDraft, ActivityPatch, ActivityRecord, DayKey, DayLedger};
use crate::store::{CasOutcome, LedgerStore};
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Entry point for everything that reads or changes a day ledger.
///
/// Each mutation is a load, a pure computation and a compare-and-swap. When
/// another writer commits in between, the whole cycle starts over from a
/// fresh load, so budget and existence checks always see the latest total.
pub struct LedgerClient<S> {
    store: S,
    retry: RetryPolicy,
}

impl<S: LedgerStore> LedgerClient<S> {
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub async fn read_day(&self, key: &DayKey) -> Result<Option<DayLedger>, LedgerError> {
        Ok(self.store.load(key).await?.map(|stored| stored.value))
    }

    /// Returns the id of the new activity and the ledger it was committed in.
    pub async fn add_activity(
        &self,
        key: &DayKey,
        draft: &ActivityDraft,
    ) -> Result<(String, DayLedger), LedgerError> {
        let activity: NewActivity = ledger::validate_draft(draft)?;

        let (ledger, id) = self
            .update(key, "add", |current| {
                let id = Uuid::new_v4().to_string();
                let next = ledger::add_activity(current, id.clone(), &activity, Utc::now())?;
                Ok((next, id))
            })
            .await?;
        Ok((id, ledger))
    }

    pub async fn edit_activity(
        &self,
        key: &DayKey,
        activity_id: &str,
        patch: &ActivityPatch,
    ) -> Result<(ActivityRecord, DayLedger), LedgerError> {
        let changes: ActivityChanges = ledger::validate_patch(patch)?;

        let (ledger, activity) = self
            .update(key, "edit", |current| {
                ledger::edit_activity(current, activity_id, &changes, Utc::now())
            })
            .await?;
        Ok((activity, ledger))
    }

    pub async fn delete_activity(
        &self,
        key: &DayKey,
        activity_id: &str,
    ) -> Result<DayLedger, LedgerError> {
        let (ledger, ()) = self
            .update(key, "delete", |current| {
                Ok((ledger::delete_activity(current, activity_id, Utc::now())?, ()))
            })
            .await?;
        Ok(ledger)
    }

    async fn update<T, F>(
        &self,
        key: &DayKey,
        operation: &'static str,
        mut compute: F,
    ) -> Result<(DayLedger, T), LedgerError>
    where
        F: FnMut(Option<&DayLedger>) -> Result<(DayLedger, T), LedgerError>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let current = self.store.load(key).await?;
            let expected_version = current.as_ref().map(|stored| stored.version);
            let (next, output) = compute(current.as_ref().map(|stored| &stored.value))?;

            match self
                .store
                .compare_and_swap(key, expected_version, next.clone())
                .await?
            {
                CasOutcome::Committed { version } => {
                    debug!(
                        operation,
                        user_id = %key.user_id,
                        date = %key.date,
                        version,
                        attempt,
                        total_minutes = next.total_minutes,
                        "ledger updated"
                    );
                    return Ok((next, output));
                }
                CasOutcome::Conflict => {
                    warn!(
                        operation,
                        user_id = %key.user_id,
                        date = %key.date,
                        attempt,
                        "concurrent write detected, retrying"
                    );
                    if attempt < max_attempts && !self.retry.backoff.is_zero() {
                        tokio::time::sleep(self.retry.backoff * attempt).await;
                    }
                }
            }
        }

        Err(LedgerError::Conflict {
            attempts: max_attempts,
        })
    }
}
