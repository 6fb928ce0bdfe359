pub mod app;
pub mod escalate;
pub mod prompt;
