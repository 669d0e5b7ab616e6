mod message;
mod messages_view;

pub use message::*;
pub use messages_view::*;
