pub mod dedup;
pub mod schedule;
