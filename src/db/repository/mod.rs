/// Upper bound on ids bound into a single `IN (...)` list, well under
/// SQLite's host parameter limit.
pub const MAX_BATCH_IDS: usize = 500;

pub mod notification;
pub mod task;
pub mod user;

pub use notification::NotificationRepository;
pub use task::{DailyMetric, TaskRepository};
pub use user::UserRepository;
