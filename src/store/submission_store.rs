//! Submission store (spec section 6): the judge's read/write side of the
//! `submissions` table, including the atomic PENDING -> JUDGING claim that
//! makes at-least-once queue delivery idempotent (spec section 7).

use async_trait::async_trait;
use sqlx::PgPool;

use crate::model::{JudgeResult, Verdict};

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Attempts to move a submission from PENDING to JUDGING. Returns
    /// `true` if this call performed the transition (the caller should
    /// judge it), `false` if the row was already in JUDGING or a terminal
    /// state (the caller should drop the job silently).
    async fn claim_for_judging(&self, submission_id: i64) -> anyhow::Result<bool>;

    /// Persists the final judged outcome.
    async fn save_result(&self, submission_id: i64, result: &JudgeResult) -> anyhow::Result<()>;

    /// Records a submission as RE with an internal diagnostic message,
    /// without any per-test-case detail (used when the problem cannot be
    /// loaded).
    async fn save_internal_error(&self, submission_id: i64, message: &str) -> anyhow::Result<()>;
}

pub struct PgSubmissionStore {
    pool: PgPool,
}

impl PgSubmissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionStore for PgSubmissionStore {
    async fn claim_for_judging(&self, submission_id: i64) -> anyhow::Result<bool> {
        let updated = sqlx::query(
            "UPDATE submissions SET verdict = 'JUDGING', judged_at = NOW() \
             WHERE id = $1 AND verdict = 'PENDING'",
        )
        .bind(submission_id)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }

    async fn save_result(&self, submission_id: i64, result: &JudgeResult) -> anyhow::Result<()> {
        let judge_output = serde_json::to_value(&result.judge_output)?;

        sqlx::query(
            r#"
            UPDATE submissions
            SET verdict = $1,
                execution_time_ms = $2,
                memory_used_kb = $3,
                test_cases_passed = $4,
                total_test_cases = $5,
                judge_output = $6,
                judged_at = NOW()
            WHERE id = $7
            "#,
        )
        .bind(result.verdict.to_string())
        .bind(result.execution_time_ms as i32)
        .bind(result.memory_used_kb as i32)
        .bind(result.test_cases_passed as i32)
        .bind(result.total_test_cases as i32)
        .bind(judge_output)
        .bind(submission_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_internal_error(&self, submission_id: i64, message: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE submissions
            SET verdict = $1,
                execution_time_ms = 0,
                memory_used_kb = 0,
                test_cases_passed = 0,
                total_test_cases = 0,
                judge_output = $2,
                judged_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(Verdict::Re.to_string())
        .bind(serde_json::json!([{ "error": message }]))
        .bind(submission_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
