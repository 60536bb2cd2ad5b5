use super::entities::{Activity, Category};
use super::validate::DAY_CAPACITY_MINUTES;

/// Read-only roll-up of the current activity list. Recomputed wholesale on
/// every change; never persisted and never mutates anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySummary {
    pub total_minutes: u32,
    /// `1440 - total`. Reported even when negative, so a peer-written
    /// over-capacity document can be signalled upstream as overage.
    pub remaining_minutes: i32,
    pub activity_count: usize,
    /// Category with the largest subtotal. Ties go to the category that
    /// comes first in [Category::ALL]; an empty day therefore reports the
    /// first category.
    pub top_category: Category,
    by_category: [u32; Category::ALL.len()],
}

impl DaySummary {
    pub fn of(activities: &[Activity]) -> Self {
        let mut by_category = [0u32; Category::ALL.len()];
        for activity in activities {
            by_category[activity.category as usize] += activity.duration;
        }

        let total_minutes: u32 = by_category.iter().sum();

        let mut top_category = Category::ALL[0];
        for category in Category::ALL {
            if by_category[category as usize] > by_category[top_category as usize] {
                top_category = category;
            }
        }

        Self {
            total_minutes,
            remaining_minutes: DAY_CAPACITY_MINUTES as i32 - total_minutes as i32,
            activity_count: activities.len(),
            top_category,
            by_category,
        }
    }

    /// Subtotal for one category. Categories without activities report
    /// zero, not absence.
    pub fn minutes_in(&self, category: Category) -> u32 {
        self.by_category[category as usize]
    }

    pub fn per_category(&self) -> impl Iterator<Item = (Category, u32)> + '_ {
        Category::ALL
            .into_iter()
            .map(|category| (category, self.by_category[category as usize]))
    }

    /// True when the observed day is past capacity, which can only happen
    /// through a peer's writes since local adds are validated first.
    pub fn exceeded(&self) -> bool {
        self.remaining_minutes < 0
    }
}
