pub mod chat;
pub mod message;
pub mod user;

pub use chat::ChatRecord;
pub use message::{MessageKind, MessageRecord};
pub use user::UserRecord;
