//! Judge pipeline (C5): the per-submission state machine. Claims a
//! submission, loads its problem, runs every test case through the executor
//! (C3) and, where present, the checker runner (C4), and persists the
//! aggregated verdict.
//!
//! Grounded on the teacher's `judger::process_judge_job`, generalized from
//! its MinIO-backed testcase fetch and special-judge branch to the
//! `ProblemStore`/`SubmissionStore` trait split this crate uses instead.

use tracing::{info, warn};

use crate::checker;
use crate::executor::{ExecutionVerdict, Executor};
use crate::model::{Job, JudgeResult, TestCaseRecord, Verdict};
use crate::store::{ProblemStore, SubmissionStore};

pub struct Judge<'a> {
    executor: &'a Executor,
    submission_store: &'a dyn SubmissionStore,
    problem_store: &'a dyn ProblemStore,
}

impl<'a> Judge<'a> {
    pub fn new(
        executor: &'a Executor,
        submission_store: &'a dyn SubmissionStore,
        problem_store: &'a dyn ProblemStore,
    ) -> Self {
        Self {
            executor,
            submission_store,
            problem_store,
        }
    }

    /// Runs one job to completion. Returns `Ok(())` whether the submission
    /// was actually judged or silently dropped as a stale redelivery; judge
    /// and datastore failures surface as `Err` for the caller to log and
    /// back off on (spec section 4.6).
    pub async fn run(&self, job: &Job) -> anyhow::Result<()> {
        if !self
            .submission_store
            .claim_for_judging(job.submission_id)
            .await?
        {
            info!(
                submission_id = job.submission_id,
                "submission already judged or in flight, dropping redelivered job"
            );
            return Ok(());
        }

        let problem = match self.problem_store.get(job.problem_id).await? {
            Some(problem) => problem,
            None => {
                warn!(
                    submission_id = job.submission_id,
                    problem_id = job.problem_id,
                    "problem not found"
                );
                self.submission_store
                    .save_internal_error(job.submission_id, "problem not found")
                    .await?;
                return Ok(());
            }
        };

        let result = self.judge_against(job, &problem).await?;
        self.submission_store
            .save_result(job.submission_id, &result)
            .await?;
        Ok(())
    }

    async fn judge_against(
        &self,
        job: &Job,
        problem: &crate::model::Problem,
    ) -> anyhow::Result<JudgeResult> {
        let total = problem.test_cases.len() as u32;
        let mut records = Vec::with_capacity(problem.test_cases.len());
        let mut max_time_ms = 0u32;
        let mut max_memory_kb = 0u32;
        let mut passed = 0u32;

        for (index, test_case) in problem.test_cases.iter().enumerate() {
            let exec = self
                .executor
                .execute(
                    &job.language,
                    &job.code,
                    &test_case.input,
                    problem.time_limit_ms,
                    problem.memory_limit_mb,
                )
                .await?;

            max_time_ms = max_time_ms.max(exec.time_ms);
            max_memory_kb = max_memory_kb.max(exec.memory_kb);

            if exec.verdict != ExecutionVerdict::Success {
                records.push(TestCaseRecord {
                    test_case: index + 1,
                    verdict: to_verdict(exec.verdict),
                    execution_time_ms: exec.time_ms,
                    memory_used_kb: exec.memory_kb,
                    error: exec.stderr.clone(),
                    checker_message: None,
                });
                break;
            }

            let (accepted, checker_message) = if problem.has_checker() {
                let checker_code = problem.checker_code.as_deref().unwrap_or_default();
                let checker_language = problem.checker_language.as_deref().unwrap_or_default();
                let (accepted, message) = checker::check(
                    self.executor,
                    checker_code,
                    checker_language,
                    &test_case.input,
                    &test_case.expected_output,
                    &exec.stdout,
                )
                .await?;
                (accepted, Some(message))
            } else {
                let accepted = crate::executor::ascii_trim(&exec.stdout)
                    == crate::executor::ascii_trim(&test_case.expected_output);
                (accepted, None)
            };

            let verdict = if accepted { Verdict::Ac } else { Verdict::Wa };
            records.push(TestCaseRecord {
                test_case: index + 1,
                verdict,
                execution_time_ms: exec.time_ms,
                memory_used_kb: exec.memory_kb,
                error: None,
                checker_message,
            });

            if accepted {
                passed += 1;
            } else {
                break;
            }
        }

        let verdict = if passed == total {
            Verdict::Ac
        } else {
            Verdict::worst(records.iter().map(|r| r.verdict))
        };

        Ok(JudgeResult {
            verdict,
            execution_time_ms: max_time_ms,
            memory_used_kb: max_memory_kb,
            test_cases_passed: passed,
            total_test_cases: total,
            judge_output: records,
        })
    }
}

fn to_verdict(exec: ExecutionVerdict) -> Verdict {
    match exec {
        ExecutionVerdict::Success => Verdict::Ac,
        ExecutionVerdict::Ce => Verdict::Ce,
        ExecutionVerdict::Tle => Verdict::Tle,
        ExecutionVerdict::Mle => Verdict::Mle,
        ExecutionVerdict::Re => Verdict::Re,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Mutex, Once};

    use async_trait::async_trait;

    use super::*;
    use crate::model::{Problem, TestCase};
    use crate::sandbox::{RawResult, RunSpec, SandboxDriver};

    static INIT_LANGUAGES: Once = Once::new();

    fn ensure_languages() {
        INIT_LANGUAGES.call_once(|| {
            let _ = crate::languages::init_languages();
        });
    }

    /// Replays a fixed queue of canned `RawResult`s, one per `run()` call, in
    /// the order the judge pipeline is expected to issue them (compile step
    /// first when the language has one, then the run step, then any checker
    /// invocation). Panics on an unexpected extra call so a test's call count
    /// can't silently drift from what it asserts on.
    struct FakeSandboxDriver {
        queue: Mutex<VecDeque<RawResult>>,
    }

    impl FakeSandboxDriver {
        fn new(results: Vec<RawResult>) -> Self {
            Self {
                queue: Mutex::new(results.into()),
            }
        }
    }

    #[async_trait]
    impl SandboxDriver for FakeSandboxDriver {
        async fn run(&self, _spec: &RunSpec) -> anyhow::Result<RawResult> {
            self.queue
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("fake sandbox received an unexpected run() call"))
        }
    }

    fn success(stdout: &str) -> RawResult {
        RawResult {
            exit_code: 0,
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
            wall_time_ms: 10,
            peak_memory_kb: 1024,
            timed_out: false,
        }
    }

    fn failing(exit_code: i32) -> RawResult {
        RawResult {
            exit_code,
            stdout: Vec::new(),
            stderr: b"boom".to_vec(),
            wall_time_ms: 10,
            peak_memory_kb: 1024,
            timed_out: false,
        }
    }

    fn timed_out() -> RawResult {
        RawResult {
            exit_code: -1,
            stdout: Vec::new(),
            stderr: Vec::new(),
            wall_time_ms: 1000,
            peak_memory_kb: 1024,
            timed_out: true,
        }
    }

    struct FakeSubmissionStore {
        claimable: bool,
        result: Mutex<Option<JudgeResult>>,
        internal_error: Mutex<Option<String>>,
    }

    impl FakeSubmissionStore {
        fn new(claimable: bool) -> Self {
            Self {
                claimable,
                result: Mutex::new(None),
                internal_error: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl SubmissionStore for FakeSubmissionStore {
        async fn claim_for_judging(&self, _submission_id: i64) -> anyhow::Result<bool> {
            Ok(self.claimable)
        }

        async fn save_result(
            &self,
            _submission_id: i64,
            result: &JudgeResult,
        ) -> anyhow::Result<()> {
            *self.result.lock().unwrap() = Some(result.clone());
            Ok(())
        }

        async fn save_internal_error(
            &self,
            _submission_id: i64,
            message: &str,
        ) -> anyhow::Result<()> {
            *self.internal_error.lock().unwrap() = Some(message.to_string());
            Ok(())
        }
    }

    struct FakeProblemStore {
        problem: Option<Problem>,
    }

    #[async_trait]
    impl ProblemStore for FakeProblemStore {
        async fn get(&self, _problem_id: i64) -> anyhow::Result<Option<Problem>> {
            Ok(self.problem.clone())
        }
    }

    fn test_case(input: &str, expected: &str) -> TestCase {
        TestCase {
            input: input.to_string(),
            expected_output: expected.to_string(),
            hidden: false,
        }
    }

    fn literal_problem(test_cases: Vec<TestCase>) -> Problem {
        Problem {
            id: 1,
            time_limit_ms: 1000,
            memory_limit_mb: 256,
            checker_code: None,
            checker_language: None,
            test_cases,
        }
    }

    fn job() -> Job {
        Job {
            submission_id: 1,
            problem_id: 1,
            language: "python".to_string(),
            code: "print('hi')".to_string(),
        }
    }

    #[tokio::test]
    async fn early_stop_on_wa_skips_remaining_test_cases() {
        ensure_languages();
        // Three test cases; the first produces output that doesn't match
        // expected. The loop must stop there rather than running the other
        // two -- the fake only has one result queued, so a third `run()`
        // call would panic the test.
        let sandbox = FakeSandboxDriver::new(vec![success("wrong\n")]);
        let executor = Executor::new(Box::new(sandbox), std::env::temp_dir().join("judge-test-scratch"));
        let problem = literal_problem(vec![
            test_case("1", "2"),
            test_case("2", "4"),
            test_case("3", "6"),
        ]);

        let judge = new_judge(&executor);
        let result = judge.judge_against(&job(), &problem).await.unwrap();

        assert_eq!(result.verdict, Verdict::Wa);
        assert_eq!(result.test_cases_passed, 0);
        assert_eq!(result.total_test_cases, 3);
        assert_eq!(result.judge_output.len(), 1);
    }

    #[tokio::test]
    async fn ascii_trim_ignores_surrounding_whitespace_not_internal() {
        ensure_languages();
        let sandbox = FakeSandboxDriver::new(vec![success("  6\n")]);
        let executor = Executor::new(Box::new(sandbox), std::env::temp_dir().join("judge-test-scratch"));
        let problem = literal_problem(vec![test_case("3", "6\n\n")]);

        let judge = new_judge(&executor);
        let result = judge.judge_against(&job(), &problem).await.unwrap();

        assert_eq!(result.verdict, Verdict::Ac);
        assert_eq!(result.test_cases_passed, 1);
    }

    #[tokio::test]
    async fn checker_branch_runs_instead_of_literal_comparison() {
        ensure_languages();
        // One run() call for the submission, one for the checker.
        let sandbox = FakeSandboxDriver::new(vec![success("6\n"), success("ACCEPT\n")]);
        let executor = Executor::new(Box::new(sandbox), std::env::temp_dir().join("judge-test-scratch"));
        let mut problem = literal_problem(vec![test_case("3", "ignored by checker")]);
        problem.checker_code = Some("print('ACCEPT')".to_string());
        problem.checker_language = Some("python".to_string());

        let judge = new_judge(&executor);
        let result = judge.judge_against(&job(), &problem).await.unwrap();

        assert_eq!(result.verdict, Verdict::Ac);
        assert_eq!(result.judge_output[0].checker_message.as_deref(), Some("ACCEPT\n"));
    }

    #[tokio::test]
    async fn compile_failure_aggregates_as_ce() {
        ensure_languages();
        let sandbox = FakeSandboxDriver::new(vec![failing(1)]);
        let executor = Executor::new(Box::new(sandbox), std::env::temp_dir().join("judge-test-scratch"));
        let problem = literal_problem(vec![test_case("1", "1"), test_case("2", "2")]);
        let mut job = job();
        job.language = "c".to_string();

        let judge = new_judge(&executor);
        let result = judge.judge_against(&job, &problem).await.unwrap();

        assert_eq!(result.verdict, Verdict::Ce);
        assert_eq!(result.judge_output.len(), 1);
    }

    #[tokio::test]
    async fn timeout_aggregates_as_tle_over_lower_priority_verdicts() {
        ensure_languages();
        let sandbox = FakeSandboxDriver::new(vec![timed_out()]);
        let executor = Executor::new(Box::new(sandbox), std::env::temp_dir().join("judge-test-scratch"));
        let problem = literal_problem(vec![test_case("1", "1")]);

        let judge = new_judge(&executor);
        let result = judge.judge_against(&job(), &problem).await.unwrap();

        assert_eq!(result.verdict, Verdict::Tle);
        assert_eq!(Verdict::worst([Verdict::Tle, Verdict::Wa]), Verdict::Tle);
    }

    #[tokio::test]
    async fn run_persists_result_through_submission_store() {
        ensure_languages();
        let sandbox = FakeSandboxDriver::new(vec![success("1\n")]);
        let executor = Executor::new(Box::new(sandbox), std::env::temp_dir().join("judge-test-scratch"));
        let submission_store = FakeSubmissionStore::new(true);
        let problem_store = FakeProblemStore {
            problem: Some(literal_problem(vec![test_case("1", "1")])),
        };
        let judge = Judge::new(&executor, &submission_store, &problem_store);

        judge.run(&job()).await.unwrap();

        let saved = submission_store.result.lock().unwrap();
        assert_eq!(saved.as_ref().unwrap().verdict, Verdict::Ac);
    }

    #[tokio::test]
    async fn run_drops_redelivered_job_without_judging() {
        ensure_languages();
        let sandbox = FakeSandboxDriver::new(vec![]);
        let executor = Executor::new(Box::new(sandbox), std::env::temp_dir().join("judge-test-scratch"));
        let submission_store = FakeSubmissionStore::new(false);
        let problem_store = FakeProblemStore {
            problem: Some(literal_problem(vec![test_case("1", "1")])),
        };
        let judge = Judge::new(&executor, &submission_store, &problem_store);

        judge.run(&job()).await.unwrap();

        assert!(submission_store.result.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn run_records_internal_error_when_problem_missing() {
        ensure_languages();
        let sandbox = FakeSandboxDriver::new(vec![]);
        let executor = Executor::new(Box::new(sandbox), std::env::temp_dir().join("judge-test-scratch"));
        let submission_store = FakeSubmissionStore::new(true);
        let problem_store = FakeProblemStore { problem: None };
        let judge = Judge::new(&executor, &submission_store, &problem_store);

        judge.run(&job()).await.unwrap();

        assert_eq!(
            submission_store.internal_error.lock().unwrap().as_deref(),
            Some("problem not found")
        );
        assert!(submission_store.result.lock().unwrap().is_none());
    }

    /// `judge_against` is private, but this test module is a child of
    /// `judge`, so it can call it directly -- no need to go through the full
    /// `run()` claim/persist dance for the pipeline-shape tests above.
    fn new_judge(executor: &Executor) -> Judge<'_> {
        static SUBMISSIONS: FakeSubmissionStore = FakeSubmissionStore {
            claimable: true,
            result: Mutex::new(None),
            internal_error: Mutex::new(None),
        };
        static PROBLEMS: FakeProblemStore = FakeProblemStore { problem: None };
        Judge::new(executor, &SUBMISSIONS, &PROBLEMS)
    }
}
