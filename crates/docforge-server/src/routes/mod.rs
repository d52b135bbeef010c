pub mod documents;
pub mod events;
pub mod executions;
pub mod export;
pub mod health;
pub mod projects;
pub mod stages;
