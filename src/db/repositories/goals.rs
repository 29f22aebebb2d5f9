use anyhow::Result;
use chrono::{DateTime, Utc};
use log::error;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{date_key, parse_date, parse_datetime, to_i64, to_u64},
    models::GoalRecord,
};

fn row_to_goal(row: &Row) -> Result<GoalRecord> {
    let start_date: String = row.get("start_date")?;
    let end_date: String = row.get("end_date")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let target_steps: i64 = row.get("target_steps")?;
    let current_steps: i64 = row.get("current_steps")?;

    Ok(GoalRecord {
        id: row.get("id")?,
        remote_id: row.get("remote_id")?,
        title: row.get("title")?,
        target_steps: to_u64(target_steps, "target_steps")?,
        current_steps: to_u64(current_steps, "current_steps")?,
        start_date: parse_date(&start_date, "start_date")?,
        end_date: parse_date(&end_date, "end_date")?,
        memo: row.get("memo")?,
        is_done: row.get("is_done")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

const GOAL_COLUMNS: &str = "id, remote_id, title, target_steps, current_steps, \
                            start_date, end_date, memo, is_done, created_at, updated_at";

impl Database {
    pub async fn insert_goal(&self, goal: &GoalRecord) -> Result<()> {
        let record = goal.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO goals (id, remote_id, title, target_steps, current_steps,
                                    start_date, end_date, memo, is_done, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.id,
                    record.remote_id,
                    record.title,
                    to_i64(record.target_steps)?,
                    to_i64(record.current_steps)?,
                    date_key(record.start_date),
                    date_key(record.end_date),
                    record.memo,
                    record.is_done,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_goal(&self, goal_id: &str) -> Result<Option<GoalRecord>> {
        let goal_id = goal_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1"
            ))?;

            let raw = stmt
                .query_row(params![goal_id], |row| {
                    Ok(row_to_goal(row))
                })
                .optional()?;

            raw.transpose()
        })
        .await
    }

    /// All goals, newest first. A row whose stored dates do not parse is
    /// skipped and logged instead of failing the batch, so one corrupt goal
    /// cannot take down every goal view.
    pub async fn list_goals(&self) -> Result<Vec<GoalRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {GOAL_COLUMNS} FROM goals ORDER BY created_at DESC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut goals = Vec::new();
            while let Some(row) = rows.next()? {
                match row_to_goal(row) {
                    Ok(goal) => goals.push(goal),
                    Err(err) => {
                        let id: String = row.get("id").unwrap_or_default();
                        error!("skipping unreadable goal row {id}: {err:#}");
                    }
                }
            }

            Ok(goals)
        })
        .await
    }

    pub async fn update_goal_progress(
        &self,
        goal_id: &str,
        current_steps: u64,
        is_done: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let goal_id = goal_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE goals
                 SET current_steps = ?1,
                     is_done = ?2,
                     updated_at = ?3
                 WHERE id = ?4",
                params![
                    to_i64(current_steps)?,
                    is_done,
                    updated_at.to_rfc3339(),
                    goal_id,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn update_goal_memo(
        &self,
        goal_id: &str,
        memo: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let goal_id = goal_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE goals SET memo = ?1, updated_at = ?2 WHERE id = ?3",
                params![memo, updated_at.to_rfc3339(), goal_id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn set_goal_remote_id(&self, goal_id: &str, remote_id: String) -> Result<()> {
        let goal_id = goal_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE goals SET remote_id = ?1 WHERE id = ?2",
                params![remote_id, goal_id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn delete_goal(&self, goal_id: &str) -> Result<()> {
        let goal_id = goal_id.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM goals WHERE id = ?1", params![goal_id])?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    use crate::db::models::GoalRecord;
    use crate::db::test_support::temp_db;

    fn day(s: &str) -> NaiveDate {
        match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(date) => date,
            Err(err) => panic!("bad test date {s}: {err}"),
        }
    }

    fn goal(title: &str, start: &str, end: &str) -> GoalRecord {
        let now = Utc::now();
        GoalRecord {
            id: Uuid::new_v4().to_string(),
            remote_id: None,
            title: title.to_string(),
            target_steps: 5000,
            current_steps: 0,
            start_date: day(start),
            end_date: day(end),
            memo: None,
            is_done: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn goal_round_trips_through_the_store() {
        let db = temp_db("goals-roundtrip");
        let record = goal("Morning walks", "2025-01-01", "2025-01-31");

        db.insert_goal(&record).await.expect("insert");
        let loaded = db.get_goal(&record.id).await.expect("get").expect("present");

        assert_eq!(loaded.title, "Morning walks");
        assert_eq!(loaded.target_steps, 5000);
        assert_eq!(loaded.start_date, day("2025-01-01"));
        assert_eq!(loaded.end_date, day("2025-01-31"));
        assert!(!loaded.is_done);

        db.set_goal_remote_id(&record.id, "remote-abc".into())
            .await
            .expect("set remote id");
        let synced = db.get_goal(&record.id).await.expect("get").expect("present");
        assert_eq!(synced.remote_id.as_deref(), Some("remote-abc"));
    }

    #[tokio::test]
    async fn progress_update_persists_steps_and_done_flag() {
        let db = temp_db("goals-progress");
        let record = goal("Campus loop", "2025-02-01", "2025-02-07");
        db.insert_goal(&record).await.expect("insert");

        db.update_goal_progress(&record.id, 5200, true, Utc::now())
            .await
            .expect("update");

        let loaded = db.get_goal(&record.id).await.expect("get").expect("present");
        assert_eq!(loaded.current_steps, 5200);
        assert!(loaded.is_done);
    }

    #[tokio::test]
    async fn delete_removes_the_goal() {
        let db = temp_db("goals-delete");
        let record = goal("Short stroll", "2025-02-01", "2025-02-02");
        db.insert_goal(&record).await.expect("insert");

        db.delete_goal(&record.id).await.expect("delete");

        assert!(db.get_goal(&record.id).await.expect("get").is_none());
        assert!(db.list_goals().await.expect("list").is_empty());
    }
}
