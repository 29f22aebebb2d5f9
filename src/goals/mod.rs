mod calendar;
mod tracker;

pub use calendar::{expand_to_calendar, goals_on};
pub use tracker::{GoalEvent, GoalTracker};
