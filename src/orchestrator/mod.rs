//! Task lifecycle: the in-memory task registry, invocation workers and
//! the retention sweep for finished tasks.

pub mod invoker;
pub mod retention;
pub mod task_manager;
