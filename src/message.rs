//! The closed MIDI message model and the codec's error taxonomy.

use core::fmt;

use crate::channel::Channel;
use crate::types::{I14, U14, U3, U4, U7};

/// Error taxonomy. Not a string-table crate — `Display` gives a short,
/// fixed message per variant.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// The handle reference was absent. Never occurs under idiomatic Rust
    /// ownership; kept for C-ABI parity.
    NullArgument,
    /// Caller ignored `is_ready_to_receive`/`is_ready` and pushed input that
    /// could overflow the output queues. No state was mutated.
    NotReady,
    /// A message pushed to the Encoder was structurally invalid (bad
    /// channel, bad data value, unknown type).
    InvalidArgument,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            CodecError::NullArgument => "null argument",
            CodecError::NotReady => "not ready to receive",
            CodecError::InvalidArgument => "invalid argument",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CodecError {}

/// Note/velocity-shaped payload (NoteOff, NoteOn).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NotePayload {
    pub note: U7,
    pub velocity: U7,
}

/// Note/value-shaped payload (AftertouchPoly).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AftertouchPolyPayload {
    pub note: U7,
    pub value: U7,
}

/// Control/value-shaped payload (ControlChange).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlChangePayload {
    pub control: U7,
    pub value: U7,
}

/// MTC quarter-frame payload: `0tttvvvv`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MtcQuarterFramePayload {
    pub frame_type: U3,
    pub value: U4,
}

/// Synthetic per-byte sysex payload emitted by the Decoder.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SysexBytePayload {
    pub sequence_number: u32,
    pub byte: U7,
}

/// Synthetic sysex-close payload emitted by the Decoder.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SysexStopPayload {
    pub sequence_length: u16,
    pub is_length_overflowed: bool,
}

/// The closed MIDI 1.0 message model: channel-voice, system-common, system
/// real-time, and the decoder's synthetic sysex variants.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Message {
    // Channel voice
    NoteOff(Channel, NotePayload),
    NoteOn(Channel, NotePayload),
    AftertouchPoly(Channel, AftertouchPolyPayload),
    ControlChange(Channel, ControlChangePayload),
    ProgramChange(Channel, U7),
    AftertouchMono(Channel, U7),
    PitchBend(Channel, I14),

    // System common
    SysexStart,
    MtcQuarterFrame(MtcQuarterFramePayload),
    SongPositionPointer(U14),
    SongSelect(U7),
    TuneRequest,
    SysexStop(SysexStopPayload),

    // System real-time
    TimingClock,
    Start,
    Continue,
    Stop,
    ActiveSensing,
    SystemReset,

    // Synthetic, decoder-only
    SysexByte(SysexBytePayload),
}

impl Message {
    /// True for the six single-byte system real-time messages: they carry
    /// no channel and no payload.
    pub fn is_realtime(&self) -> bool {
        matches!(
            self,
            Message::TimingClock
                | Message::Start
                | Message::Continue
                | Message::Stop
                | Message::ActiveSensing
                | Message::SystemReset
        )
    }

    /// The channel this message is scoped to, if any.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            Message::NoteOff(ch, _)
            | Message::NoteOn(ch, _)
            | Message::AftertouchPoly(ch, _)
            | Message::ControlChange(ch, _)
            | Message::ProgramChange(ch, _)
            | Message::AftertouchMono(ch, _)
            | Message::PitchBend(ch, _) => Some(*ch),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use core::convert::TryFrom;

    #[test]
    fn realtime_classification() {
        assert!(Message::TimingClock.is_realtime());
        assert!(!Message::TuneRequest.is_realtime());
        assert!(!Message::SysexStart.is_realtime());
    }

    #[test]
    fn channel_scoping() {
        let ch = Channel::try_from(2).unwrap();
        let note_on = Message::NoteOn(
            ch,
            NotePayload {
                note: U7(60),
                velocity: U7(100),
            },
        );
        assert_eq!(note_on.channel(), Some(ch));
        assert_eq!(Message::TimingClock.channel(), None);
    }

    #[test]
    fn error_display() {
        assert_eq!(CodecError::NotReady.to_string(), "not ready to receive");
    }
}
