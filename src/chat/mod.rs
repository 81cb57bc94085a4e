pub mod channel;
pub mod history;
pub mod message;

pub use channel::{ChatChannel, ChatConnection, ChatHandle, ChatStatus, ChatTransport, WsChatTransport};
pub use history::HistoryClient;
pub use message::{ChatMessage, MessageLog};
