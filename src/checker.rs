//! Checker runner (C4): routes a custom checker program through the same
//! sandboxed executor (C3) used to judge submissions, under fixed limits.
//!
//! This deliberately diverges from the teacher, whose `CheckerManager` ran
//! compiled testlib checkers as a trusted, unsandboxed process via
//! `execute_trusted`. The checker here is itself untrusted user-supplied
//! code and is judged no differently than a submission (spec section 4.4),
//! so it goes through `Executor::execute` rather than a privileged path.

use serde::Serialize;

use crate::executor::{Executor, ExecutionVerdict};

/// Fixed limits applied to every checker invocation, independent of the
/// problem's own time/memory limits.
const CHECKER_TIME_LIMIT_MS: u32 = 5_000;
const CHECKER_MEMORY_LIMIT_MB: u32 = 64;

#[derive(Serialize)]
struct CheckerPayload<'a> {
    input: &'a str,
    expected: &'a str,
    actual: &'a str,
}

/// Runs `checker_code` against one test case's input/expected/actual triple.
/// Returns `(accepted, message)`; `message` is the checker's stdout verbatim.
pub async fn check(
    executor: &Executor,
    checker_code: &str,
    checker_language: &str,
    test_input: &str,
    expected: &str,
    actual: &str,
) -> anyhow::Result<(bool, String)> {
    let payload = CheckerPayload {
        input: test_input,
        expected,
        actual,
    };
    let stdin = serde_json::to_string(&payload)?;

    let result = executor
        .execute(
            checker_language,
            checker_code,
            &stdin,
            CHECKER_TIME_LIMIT_MS,
            CHECKER_MEMORY_LIMIT_MB,
        )
        .await?;

    if result.verdict != ExecutionVerdict::Success {
        return Ok((false, "Checker execution failed".to_string()));
    }

    let accepted = first_token_upper(&result.stdout)
        .map(|token| token == "ACCEPT")
        .unwrap_or(false);

    Ok((accepted, result.stdout))
}

fn first_token_upper(stdout: &str) -> Option<String> {
    stdout
        .split_whitespace()
        .next()
        .map(|tok| tok.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_token_is_case_insensitive() {
        assert_eq!(first_token_upper("accept\n").as_deref(), Some("ACCEPT"));
        assert_eq!(first_token_upper("  ACCEPT extra").as_deref(), Some("ACCEPT"));
    }

    #[test]
    fn reject_is_anything_else() {
        assert_eq!(first_token_upper("reject: bad format").as_deref(), Some("REJECT:"));
        assert_eq!(first_token_upper(""), None);
    }

    #[test]
    fn payload_serializes_with_exact_keys() {
        let payload = CheckerPayload {
            input: "3\n",
            expected: "6\n",
            actual: "6\n",
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"input":"3\n","expected":"6\n","actual":"6\n"}"#);
    }
}
