pub mod core;
pub mod forms;
pub mod rules;
pub mod setup;
pub mod submission;
