//! Domain model module declarations.

pub mod task;
