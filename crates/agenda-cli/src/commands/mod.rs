pub mod add;
pub mod common;
pub mod dead_letters;
pub mod delete;
pub mod get;
pub mod list;
pub mod queue;
pub mod reset;
pub mod sync;
pub mod update;
