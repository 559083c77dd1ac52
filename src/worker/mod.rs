//! Process execution for triggered jobs.
//!
//! [`CommandRunner::run`] spawns the endpoint's configured executable with
//! its configured arguments (no shell in between), drains stdout into a
//! capped buffer, and reports pid, exit code, and output. Stderr is kept out
//! of the captured output and only surfaces in logs and failure diagnostics.
//!
//! Commands run with no stdin and inherit the service's environment. There
//! is no timeout or cancellation for a running child; the trigger request
//! waits for it.

pub mod executor;

pub use executor::{CommandRunner, ExecutionResult};
