//! Problem store: read-only access to `problems(id)` (spec section 6).

use async_trait::async_trait;
use sqlx::PgPool;

use crate::model::{Problem, TestCase};

#[async_trait]
pub trait ProblemStore: Send + Sync {
    async fn get(&self, problem_id: i64) -> anyhow::Result<Option<Problem>>;
}

pub struct PgProblemStore {
    pool: PgPool,
}

impl PgProblemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProblemRow {
    id: i64,
    time_limit_ms: i32,
    memory_limit_mb: i32,
    checker_code: Option<String>,
    checker_language: Option<String>,
}

#[derive(sqlx::FromRow)]
struct TestCaseRow {
    input: String,
    expected_output: String,
    hidden: bool,
}

#[async_trait]
impl ProblemStore for PgProblemStore {
    async fn get(&self, problem_id: i64) -> anyhow::Result<Option<Problem>> {
        let row = sqlx::query_as::<_, ProblemRow>(
            "SELECT id, time_limit_ms, memory_limit_mb, checker_code, checker_language \
             FROM problems WHERE id = $1",
        )
        .bind(problem_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let test_case_rows = sqlx::query_as::<_, TestCaseRow>(
            "SELECT input, expected_output, hidden FROM problem_test_cases \
             WHERE problem_id = $1 ORDER BY ordinal ASC",
        )
        .bind(problem_id)
        .fetch_all(&self.pool)
        .await?;

        let test_cases = test_case_rows
            .into_iter()
            .map(|r| TestCase {
                input: r.input,
                expected_output: r.expected_output,
                hidden: r.hidden,
            })
            .collect();

        Ok(Some(Problem {
            id: row.id,
            time_limit_ms: row.time_limit_ms as u32,
            memory_limit_mb: row.memory_limit_mb as u32,
            checker_code: row.checker_code,
            checker_language: row.checker_language,
            test_cases,
        }))
    }
}
