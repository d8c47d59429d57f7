//! Shared data model: submissions, problems, jobs, and execution results.
//!
//! These types cross every component boundary in the pipeline (C1-C6), so they
//! live in one place rather than being redefined per module.

use serde::{Deserialize, Serialize};

/// Terminal and transient verdict alphabet (spec section 4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pending,
    Judging,
    Ac,
    Wa,
    Tle,
    Mle,
    Re,
    Ce,
}

impl Verdict {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Verdict::Pending | Verdict::Judging)
    }

    /// Priority used to pick the aggregate verdict when a submission does not
    /// pass every test case: CE > TLE > MLE > RE > WA. Lower number wins.
    fn priority(self) -> u8 {
        match self {
            Verdict::Ce => 0,
            Verdict::Tle => 1,
            Verdict::Mle => 2,
            Verdict::Re => 3,
            Verdict::Wa => 4,
            Verdict::Ac | Verdict::Pending | Verdict::Judging => u8::MAX,
        }
    }

    /// Worst verdict among a set of per-test verdicts, per the priority order.
    /// Panics-free on an empty slice (returns `Ac`, the identity of "no failures").
    pub fn worst(verdicts: impl IntoIterator<Item = Verdict>) -> Verdict {
        verdicts
            .into_iter()
            .min_by_key(|v| v.priority())
            .unwrap_or(Verdict::Ac)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::Pending => "PENDING",
            Verdict::Judging => "JUDGING",
            Verdict::Ac => "AC",
            Verdict::Wa => "WA",
            Verdict::Tle => "TLE",
            Verdict::Mle => "MLE",
            Verdict::Re => "RE",
            Verdict::Ce => "CE",
        };
        write!(f, "{}", s)
    }
}

/// One test case as stored on a problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    /// Not consumed by the judge; relevant only to the API surface.
    #[serde(default)]
    pub hidden: bool,
}

/// Problem definition, read-only to the judge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: i64,
    pub time_limit_ms: u32,
    pub memory_limit_mb: u32,
    pub checker_code: Option<String>,
    pub checker_language: Option<String>,
    pub test_cases: Vec<TestCase>,
}

impl Problem {
    pub fn has_checker(&self) -> bool {
        self.checker_code.is_some() && self.checker_language.is_some()
    }
}

/// Transient queue message (spec section 6). At-least-once delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub submission_id: i64,
    pub problem_id: i64,
    pub language: String,
    pub code: String,
}

/// One entry in a submission's `judge_output`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseRecord {
    pub test_case: usize,
    pub verdict: Verdict,
    pub execution_time_ms: u32,
    pub memory_used_kb: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checker_message: Option<String>,
}

/// Final judged outcome for a submission, as persisted to the submission store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeResult {
    pub verdict: Verdict,
    pub execution_time_ms: u32,
    pub memory_used_kb: u32,
    pub test_cases_passed: u32,
    pub total_test_cases: u32,
    pub judge_output: Vec<TestCaseRecord>,
}
