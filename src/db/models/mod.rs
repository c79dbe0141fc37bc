//! Database models, one file per table family.

pub mod notification;
pub mod task;
pub mod user;

pub use self::notification::*;
pub use self::task::*;
pub use self::user::*;
