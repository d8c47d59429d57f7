//! Datastore adapters: submission store (read/write, atomic state transition)
//! and problem store (read-only). Both are traits so the judge pipeline (C5)
//! can be driven by an in-memory fake in tests, matching the same
//! trait-behind-the-client pattern the teacher uses for storage and the
//! sandbox, grounded more concretely on `In-Saiyan-AlgoJudge`'s `sqlx`/
//! Postgres queries in `crates/minos/src/consumer.rs`.

mod problem_store;
mod submission_store;

pub use problem_store::{PgProblemStore, ProblemStore};
pub use submission_store::{PgSubmissionStore, SubmissionStore};
