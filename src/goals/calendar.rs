use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::warn;

use crate::db::models::GoalRecord;

/// Expand each goal across every calendar day of its inclusive span, for
/// rendering goal markers on a calendar view.
///
/// A goal whose span is inverted is skipped and logged; one bad record must
/// not take down the expansion of the others. (Rows with unparsable dates
/// never get this far; the store isolates those at row decode.)
pub fn expand_to_calendar(goals: &[GoalRecord]) -> BTreeMap<NaiveDate, Vec<GoalRecord>> {
    let mut buckets: BTreeMap<NaiveDate, Vec<GoalRecord>> = BTreeMap::new();

    for goal in goals {
        if goal.end_date < goal.start_date {
            warn!(
                "goal {} ends ({}) before it starts ({}), skipping in calendar",
                goal.id, goal.end_date, goal.start_date
            );
            continue;
        }

        let mut day = goal.start_date;
        while day <= goal.end_date {
            buckets.entry(day).or_default().push(goal.clone());
            let Some(next) = day.succ_opt() else { break };
            day = next;
        }
    }

    buckets
}

/// Goals whose span covers `date`.
pub fn goals_on(goals: &[GoalRecord], date: NaiveDate) -> Vec<GoalRecord> {
    goals
        .iter()
        .filter(|goal| goal.covers(date))
        .cloned()
        .collect()
}
