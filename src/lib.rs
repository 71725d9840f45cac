pub mod config;
pub mod dispatch;
pub mod history;
pub mod humanize;
pub mod manager;
pub mod native;
pub mod notify;
pub mod observability;
pub mod task;
pub mod uploaders;
pub mod worker;
