//! Event transport between processes
//!
//! Events travel as newline-delimited compact JSON: one serialized
//! [`LogEvent`](crate::core::LogEvent) per line. Compact JSON escapes every
//! newline inside strings, so a receiver can split the byte stream on `\n`
//! and recover whole events even when the sender reconnected mid-stream.

pub mod codec;
pub mod socket_node;

pub use codec::{encode_event, EventReader, EventWriter};
pub use socket_node::SocketNode;
