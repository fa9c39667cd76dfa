pub mod backlog;
pub mod config;
pub mod notify;
pub mod slack;
