//! # Execution
//!
//! Sub-batch execution, retry classification, and throttling for one job run.

mod retry;
mod sub_batch;
mod throttle;

pub use retry::{RetryDecision, RetryPolicy};
pub use sub_batch::{ExecutionOutcome, SubBatchExecutor};
pub use throttle::Throttle;
