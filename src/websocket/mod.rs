//! WebSocket transport: the connection collaborator for the Broadcast Hub.

mod handler;
mod message;

pub use handler::ws_handler;
pub use message::ClientRequest;
