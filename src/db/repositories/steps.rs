use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Transaction};

use crate::db::{
    connection::Database,
    helpers::{date_key, parse_date, to_i64, to_u64},
    models::{DailyStepRecord, ReconcileOutcome},
};
use crate::reconcile::{classify, RawCounterSample, ReconcileResult};

impl Database {
    /// Reconcile one raw sensor sample against the stored baseline and, on a
    /// positive delta, credit it to the day row and the lifetime total.
    ///
    /// Classification, baseline advance and credit all commit in a single
    /// transaction: a storage failure rolls the baseline back together with
    /// the credit, so a delta can neither be lost nor double-counted on the
    /// next sample.
    ///
    /// `today` is the caller's current calendar date at call time; the store
    /// itself has no notion of "now".
    pub async fn apply_sample(
        &self,
        sample: RawCounterSample,
        today: NaiveDate,
    ) -> Result<ReconcileOutcome> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let baseline: Option<f64> = tx
                .query_row("SELECT last_value FROM counter_state WHERE id = 1", [], |row| {
                    row.get(0)
                })
                .optional()?;

            let result = classify(baseline, sample.value);

            match result {
                ReconcileResult::Initialized => {
                    tx.execute(
                        "INSERT INTO counter_state (id, last_value) VALUES (1, ?1)",
                        params![sample.value],
                    )?;
                }
                ReconcileResult::Reset | ReconcileResult::NoChange => {
                    tx.execute(
                        "UPDATE counter_state SET last_value = ?1 WHERE id = 1",
                        params![sample.value],
                    )?;
                }
                ReconcileResult::Delta(amount) => {
                    tx.execute(
                        "UPDATE counter_state SET last_value = ?1 WHERE id = 1",
                        params![sample.value],
                    )?;
                    tx.execute(
                        "INSERT INTO daily_steps (date, steps) VALUES (?1, ?2)
                         ON CONFLICT(date) DO UPDATE SET steps = steps + excluded.steps",
                        params![date_key(today), to_i64(amount)?],
                    )?;
                    tx.execute(
                        "INSERT INTO lifetime_total (id, total) VALUES (1, ?1)
                         ON CONFLICT(id) DO UPDATE SET total = total + excluded.total",
                        params![to_i64(amount)?],
                    )?;
                }
            }

            let daily_total = query_daily_total(&tx, today)?;
            let lifetime_total = query_lifetime_total(&tx)?;

            tx.commit()?;

            Ok(ReconcileOutcome {
                result,
                date: today,
                daily_total,
                lifetime_total,
            })
        })
        .await
    }

    pub async fn daily_total(&self, date: NaiveDate) -> Result<u64> {
        self.execute(move |conn| {
            let total: i64 = conn.query_row(
                "SELECT COALESCE(SUM(steps), 0) FROM daily_steps WHERE date = ?1",
                params![date_key(date)],
                |row| row.get(0),
            )?;
            to_u64(total, "daily total")
        })
        .await
    }

    /// Inclusive sum over `[start, end]`; 0 when no rows fall in the range.
    pub async fn sum_steps_range(&self, start: NaiveDate, end: NaiveDate) -> Result<u64> {
        self.execute(move |conn| {
            let total: i64 = conn.query_row(
                "SELECT COALESCE(SUM(steps), 0) FROM daily_steps WHERE date BETWEEN ?1 AND ?2",
                params![date_key(start), date_key(end)],
                |row| row.get(0),
            )?;
            to_u64(total, "range total")
        })
        .await
    }

    pub async fn lifetime_total(&self) -> Result<u64> {
        self.execute(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COALESCE((SELECT total FROM lifetime_total WHERE id = 1), 0)",
                [],
                |row| row.get(0),
            )?;
            to_u64(total, "lifetime total")
        })
        .await
    }

    /// Day rows inside `[start, end]` in calendar order, for history charts.
    /// Days without credited steps have no row and are simply absent.
    pub async fn daily_history(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyStepRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT date, steps FROM daily_steps
                 WHERE date BETWEEN ?1 AND ?2
                 ORDER BY date ASC",
            )?;

            let mut rows = stmt.query(params![date_key(start), date_key(end)])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                let date: String = row.get(0)?;
                let steps: i64 = row.get(1)?;
                records.push(DailyStepRecord {
                    date: parse_date(&date, "date")?,
                    steps: to_u64(steps, "steps")?,
                });
            }

            Ok(records)
        })
        .await
    }

    /// Last raw counter value ever observed; None before the first sample.
    pub async fn counter_baseline(&self) -> Result<Option<f64>> {
        self.execute(|conn| {
            conn.query_row("SELECT last_value FROM counter_state WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(Into::into)
        })
        .await
    }
}

fn query_daily_total(tx: &Transaction<'_>, date: NaiveDate) -> Result<u64> {
    let total: i64 = tx.query_row(
        "SELECT COALESCE(SUM(steps), 0) FROM daily_steps WHERE date = ?1",
        params![date_key(date)],
        |row| row.get(0),
    )?;
    to_u64(total, "daily total")
}

fn query_lifetime_total(tx: &Transaction<'_>) -> Result<u64> {
    let total: i64 = tx.query_row(
        "SELECT COALESCE((SELECT total FROM lifetime_total WHERE id = 1), 0)",
        [],
        |row| row.get(0),
    )?;
    to_u64(total, "lifetime total")
}
