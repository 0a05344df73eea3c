//! Protocol module containing the message envelope, its validation and the
//! helpers that decide which window is trusted.

pub mod actions;
pub mod codec;
pub mod context;
pub mod ids;
pub mod message;
pub mod origin;

pub use codec::{decode_inbound, validate_message, ProtocolError};
pub use ids::MessageIdGenerator;
pub use message::*;
