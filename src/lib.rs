#![cfg_attr(not(any(feature = "std", test)), no_std)]

//! A bidirectional streaming codec for the MIDI 1.0 wire protocol.
//!
//! [`decoder::Decoder`] turns a byte stream into [`message::Message`]s;
//! [`encoder::Encoder`] turns messages back into bytes. Both run in tight,
//! allocation-free loops: all state lives in fixed-capacity fields sized by
//! a const generic, suitable for an ISR-producer / main-loop-consumer split.
//!
//! Out of scope: message pretty-printing, note-name tables, MIDI 2.0/UMP,
//! timestamping, and SMF parsing. This crate consumes bytes and produces
//! messages (or the reverse) with no knowledge of how those bytes reach it.

pub use channel::Channel;
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use message::{
    AftertouchPolyPayload, CodecError, ControlChangePayload, Message, MtcQuarterFramePayload,
    NotePayload, SysexBytePayload, SysexStopPayload,
};
pub use priority::PriorityMode;
pub use ring::{ByteRing, MessageRing, Ring};
pub use types::{Cull, Fill, I14, U14, U3, U4, U7};

mod channel;
mod decoder;
mod encoder;
mod message;
mod priority;
mod ring;
mod status;
mod types;
