pub mod websocket_server;

pub use websocket_server::{
    CommandSender, EventSender, create_command_channel, create_event_channel,
    start_websocket_server,
};
