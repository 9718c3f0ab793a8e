//! Wire format for master/client messages.
//!
//! Every message starts with a one-byte tag followed by big-endian fields.
//! Messages are split by direction: [`ToMaster`] is what the master accepts,
//! [`ToClient`] is what the client role accepts. Both decoders return
//! `Ok(None)` for tags they don't own so the dispatcher can pass the packet
//! through to the game.

mod codec;
mod message;

pub use codec::DecodeError;
pub use message::{MessageTag, ServerEntry, ToClient, ToMaster, MAX_ADDRESS_LEN};
