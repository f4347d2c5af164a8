//! Message -> byte-stream state machine: running-status compression and
//! real-time byte priority.

use crate::channel::Channel;
use crate::message::{CodecError, Message};
use crate::priority::PriorityMode;
use crate::ring::ByteRing;
use crate::status::{ChannelVoiceKind, SystemKind};
use crate::types::{I14, U7};

/// A message may produce at most this many bytes: a fresh status byte plus
/// up to two data bytes.
pub const MAX_GENERATED_PER_MESSAGE: usize = 3;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
    Idle,
    RunningStatus { kind: ChannelVoiceKind, channel: u8 },
}

/// Encodes [`Message`]s into a MIDI 1.0 byte stream. Allocation-free: all
/// state and both output queues are embedded fields of fixed capacity `N`
/// (default 32).
#[derive(Debug)]
pub struct Encoder<const N: usize = 32> {
    state: State,
    priority_mode: PriorityMode,
    main: ByteRing<N>,
    prio: ByteRing<N>,
}

impl<const N: usize> Default for Encoder<N> {
    fn default() -> Self {
        Encoder {
            state: State::Idle,
            priority_mode: PriorityMode::default(),
            main: ByteRing::new(),
            prio: ByteRing::new(),
        }
    }
}

impl<const N: usize> Encoder<N> {
    pub fn new(priority_mode: PriorityMode) -> Self {
        let mut encoder = Self::default();
        encoder.priority_mode = priority_mode;
        encoder
    }

    pub fn init(&mut self, priority_mode: PriorityMode) {
        *self = Self::new(priority_mode);
    }

    pub fn set_priority_mode(&mut self, mode: PriorityMode) {
        self.priority_mode = mode;
    }

    pub fn priority_mode(&self) -> PriorityMode {
        self.priority_mode
    }

    /// True iff the main queue has room for [`MAX_GENERATED_PER_MESSAGE`]
    /// more bytes and the real-time queue is not full.
    pub fn is_ready_to_receive(&self) -> bool {
        self.main.space_available() >= MAX_GENERATED_PER_MESSAGE && !self.prio.is_full()
    }

    /// Encode one message, enqueuing 1..=3 bytes. Every `Message` that
    /// exists was built through checked constructors (`Channel::try_from`,
    /// `U7`/`I14` bounds checks), so `InvalidArgument` is unreachable in
    /// practice — it is kept in the error taxonomy for API parity and for
    /// any future, less strongly-typed caller (e.g. a C-ABI front end that
    /// pokes raw fields).
    pub fn push_message(&mut self, message: Message) -> Result<(), CodecError> {
        if !self.is_ready_to_receive() {
            return Err(CodecError::NotReady);
        }

        if message.is_realtime() {
            self.prio.push(realtime_status_byte(&message));
            if let Message::SystemReset = message {
                self.state = State::Idle;
            }
            return Ok(());
        }

        match message {
            Message::NoteOff(channel, payload) => self.push_channel_voice(
                ChannelVoiceKind::NoteOff,
                channel,
                &[payload.note, payload.velocity],
            ),
            Message::NoteOn(channel, payload) => self.push_channel_voice(
                ChannelVoiceKind::NoteOn,
                channel,
                &[payload.note, payload.velocity],
            ),
            Message::AftertouchPoly(channel, payload) => self.push_channel_voice(
                ChannelVoiceKind::AftertouchPoly,
                channel,
                &[payload.note, payload.value],
            ),
            Message::ControlChange(channel, payload) => self.push_channel_voice(
                ChannelVoiceKind::ControlChange,
                channel,
                &[payload.control, payload.value],
            ),
            Message::ProgramChange(channel, program) => {
                self.push_channel_voice(ChannelVoiceKind::ProgramChange, channel, &[program])
            }
            Message::AftertouchMono(channel, value) => {
                self.push_channel_voice(ChannelVoiceKind::AftertouchMono, channel, &[value])
            }
            Message::PitchBend(channel, value) => {
                let (lsb, msb): (U7, U7) = value.into();
                self.push_channel_voice(ChannelVoiceKind::PitchBend, channel, &[lsb, msb])
            }

            Message::SysexStart => {
                self.main.push(SystemKind::SysexStart.status_byte());
                self.state = State::Idle;
            }
            Message::SysexStop(_) => {
                self.main.push(SystemKind::SysexStop.status_byte());
                self.state = State::Idle;
            }
            Message::MtcQuarterFrame(payload) => {
                self.main.push(SystemKind::MtcQuarterFrame.status_byte());
                // frame_type/value are domain-checked (U3/U4) at construction,
                // so no masking is needed here.
                self.main
                    .push((u8::from(payload.frame_type) << 4) | u8::from(payload.value));
                self.state = State::Idle;
            }
            Message::SongPositionPointer(value) => {
                self.main
                    .push(SystemKind::SongPositionPointer.status_byte());
                let (lsb, msb): (U7, U7) = value.into();
                self.main.push(lsb.into());
                self.main.push(msb.into());
                self.state = State::Idle;
            }
            Message::SongSelect(value) => {
                self.main.push(SystemKind::SongSelect.status_byte());
                self.main.push(value.into());
                self.state = State::Idle;
            }
            Message::TuneRequest => {
                self.main.push(SystemKind::TuneRequest.status_byte());
                self.state = State::Idle;
            }

            // Synthetic decoder-only variant. Outside a started sysex
            // context there's nothing to frame; emit the raw byte and leave
            // running status untouched.
            Message::SysexByte(payload) => {
                self.main.push(payload.byte.into());
            }

            Message::TimingClock
            | Message::Start
            | Message::Continue
            | Message::Stop
            | Message::ActiveSensing
            | Message::SystemReset => {
                unreachable!("real-time messages are handled above")
            }
        }

        Ok(())
    }

    pub fn has_output(&self) -> bool {
        !self.prio.is_empty() || !self.main.is_empty()
    }

    pub fn peek_byte(&self) -> Option<&u8> {
        if !self.prio.is_empty() {
            self.prio.peek()
        } else {
            self.main.peek()
        }
    }

    pub fn pop_byte(&mut self) -> Option<u8> {
        if !self.prio.is_empty() {
            self.prio.pop()
        } else {
            self.main.pop()
        }
    }

    fn push_channel_voice(&mut self, kind: ChannelVoiceKind, channel: Channel, data: &[U7]) {
        let channel_nibble = channel.to_nibble();
        let running = matches!(
            self.state,
            State::RunningStatus { kind: k, channel: c } if k == kind && c == channel_nibble
        );
        if !running {
            self.main.push(kind.top_nibble() | channel_nibble);
            self.state = State::RunningStatus {
                kind,
                channel: channel_nibble,
            };
        }
        for byte in data {
            self.main.push((*byte).into());
        }
    }
}

fn realtime_status_byte(message: &Message) -> u8 {
    let kind = match message {
        Message::TimingClock => SystemKind::TimingClock,
        Message::Start => SystemKind::Start,
        Message::Continue => SystemKind::Continue,
        Message::Stop => SystemKind::Stop,
        Message::ActiveSensing => SystemKind::ActiveSensing,
        Message::SystemReset => SystemKind::SystemReset,
        _ => unreachable!("only realtime messages are passed here"),
    };
    kind.status_byte()
}
