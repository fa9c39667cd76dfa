pub mod backlog;
pub mod emoji;
pub mod http;
pub mod slack;
pub mod web;
