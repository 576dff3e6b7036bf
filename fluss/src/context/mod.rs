//! Dependencies handed to operations at execution time.

mod execution;

pub use execution::ExecutionContext;
