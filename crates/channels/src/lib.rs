pub mod events;
pub mod telegram;
pub mod transport;
pub mod vk;

pub use events::{
    parse_telegram_update, parse_vk_update, split_message, InboundMessage, OutboundReply,
    MAX_MESSAGE_CHARS,
};
pub use telegram::TelegramTransport;
pub use transport::{
    ChannelPoller, HandlerError, MessageHandler, NoopTransport, PollTransport, ReconnectPolicy,
    TransportError,
};
pub use vk::VkTransport;
