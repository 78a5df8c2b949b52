//! # Tidelog Transport
//!
//! Wire format for moving entry batches over frame-oriented transports.
//!
//! A batch travels as two frames: a JSON header listing
//! `[log, position, end_offset]` per entry, then one binary buffer holding
//! every payload back to back. The [`framer`] module packs and unpacks that
//! pair; [`protocol`] handles the push-side header variants, the
//! acknowledgment frame and error replies.
//!
//! ## Pull frames
//!
//! ```text
//! frame 1 (text):   [["cam","1650811721065-0",5],["mic","1650811721066-0",12]]
//! frame 2 (binary): <5 bytes cam payload><7 bytes mic payload>
//! ```
//!
//! ## Push frames
//!
//! ```text
//! frame 1 (text):   [] | [5, 12] | [["cam", 5], ...] | [["cam", "*", 5], ...]
//! frame 2 (binary): payload buffer
//! frame 3 (text, server to client, optional): ["1650811721065-0", ...] or {"error": "..."}
//! ```

pub mod framer;
pub mod protocol;

// Re-exports
pub use framer::{FrameHeader, FramedEntry, HeaderEntry, pack, slice_buffer, unpack};
pub use protocol::{
    PushHeader, PushTarget, decode_header, encode_ack, encode_error, encode_header,
    encode_log_error, parse_push_header,
};

pub use tidelog_core::{FramingError, TransportError};
