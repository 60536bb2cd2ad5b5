use super::entities::{Activity, ActivityDraft, ActivityId};

/// Full capacity of a calendar day in minutes. No persisted ledger admitted
/// through [admit] ever totals more than this.
pub const DAY_CAPACITY_MINUTES: u32 = 1440;

/// Rejection reasons for a proposed activity. Each maps to a precise
/// user-facing message; none of them ever reaches the store.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone, Copy)]
pub enum ValidationError {
    #[error("activity name must not be empty")]
    EmptyName,

    #[error("duration must be between 1 and {DAY_CAPACITY_MINUTES} minutes")]
    InvalidDuration,

    #[error("activity would push the day over {DAY_CAPACITY_MINUTES} minutes")]
    CapacityExceeded,
}

/// Validates a candidate against the current list and, on acceptance,
/// returns the new full list with the candidate appended. The write itself
/// is deferred to the store adapter; the input list is never touched.
pub fn admit(
    existing: &[Activity],
    draft: ActivityDraft,
    id: ActivityId,
) -> Result<Vec<Activity>, ValidationError> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    let duration = match u32::try_from(draft.duration_minutes) {
        Ok(v) if (1..=DAY_CAPACITY_MINUTES).contains(&v) => v,
        _ => return Err(ValidationError::InvalidDuration),
    };

    let spent: u32 = existing.iter().map(|a| a.duration).sum();
    if spent + duration > DAY_CAPACITY_MINUTES {
        return Err(ValidationError::CapacityExceeded);
    }

    let mut activities = existing.to_vec();
    activities.push(Activity {
        id,
        name: name.into(),
        category: draft.category,
        duration,
    });
    Ok(activities)
}

/// Removes an activity by id. Removing can only lower the total, so there
/// is no capacity check, and an unknown id simply leaves the list as it
/// was without an error.
pub fn remove(existing: &[Activity], id: &ActivityId) -> Vec<Activity> {
    existing
        .iter()
        .filter(|activity| activity.id != *id)
        .cloned()
        .collect()
}
