pub mod analytics;
pub mod auth;
pub mod init;
pub mod live;
pub mod notifications;
pub mod sharing;
pub mod tasks;
