//! Byte-stream -> message state machine: running status, real-time
//! interruption, and sysex framing.

use core::convert::TryFrom;

use crate::channel::Channel;
use crate::message::{
    AftertouchPolyPayload, CodecError, ControlChangePayload, Message, MtcQuarterFramePayload,
    NotePayload, SysexBytePayload, SysexStopPayload,
};
use crate::priority::PriorityMode;
use crate::ring::MessageRing;
use crate::status::{ChannelVoiceKind, StatusByte, SystemKind};
use crate::types::{I14, U14, U3, U4, U7};

/// A byte may produce at most this many messages: a stray non-sysex,
/// non-realtime status byte arriving mid-sysex first closes the sequence
/// (synthetic SysexStop) and is then reprocessed.
pub const MAX_GENERATED_PER_BYTE: usize = 2;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
    Idle,
    /// Running-status state: awaiting the next data byte of `kind`/`channel`,
    /// which may repeat indefinitely without a fresh status byte.
    ExpectData1Channel { kind: ChannelVoiceKind, channel: u8 },
    /// Awaiting the second data byte of a two-data-byte channel message.
    ExpectData2Channel {
        kind: ChannelVoiceKind,
        channel: u8,
        data1: U7,
    },
    /// Awaiting the (only, or first) data byte of a system-common message.
    ExpectData1System { kind: SystemKind },
    /// Awaiting the second data byte of SongPositionPointer.
    ExpectData2System { kind: SystemKind, data1: U7 },
}

/// Decodes a MIDI 1.0 byte stream into [`Message`]s. Allocation-free: all
/// state and both output queues are embedded fields of fixed capacity `N`
/// (default 32).
#[derive(Debug)]
pub struct Decoder<const N: usize = 32> {
    state: State,
    in_sysex: bool,
    sysex_counter: u32,
    priority_mode: PriorityMode,
    main: MessageRing<N>,
    prio: MessageRing<N>,
}

impl<const N: usize> Default for Decoder<N> {
    fn default() -> Self {
        Decoder {
            state: State::Idle,
            in_sysex: false,
            sysex_counter: 0,
            priority_mode: PriorityMode::default(),
            main: MessageRing::new(),
            prio: MessageRing::new(),
        }
    }
}

impl<const N: usize> Decoder<N> {
    pub fn new(priority_mode: PriorityMode) -> Self {
        let mut decoder = Self::default();
        decoder.priority_mode = priority_mode;
        decoder
    }

    /// Reset all state: primary state machine, sysex tracking, and both
    /// output queues.
    pub fn init(&mut self, priority_mode: PriorityMode) {
        *self = Self::new(priority_mode);
    }

    pub fn set_priority_mode(&mut self, mode: PriorityMode) {
        self.priority_mode = mode;
    }

    pub fn priority_mode(&self) -> PriorityMode {
        self.priority_mode
    }

    /// True iff the main queue has room for [`MAX_GENERATED_PER_BYTE`] more
    /// messages and the priority queue is not full.
    pub fn is_ready_to_receive(&self) -> bool {
        self.main.space_available() >= MAX_GENERATED_PER_BYTE && !self.prio.is_full()
    }

    /// Feed one byte. May enqueue 0..=2 messages. Fails with `NotReady` if
    /// the caller ignored [`Decoder::is_ready_to_receive`]; never fails on
    /// byte content — unparseable bytes are dropped, not errors.
    pub fn push_byte(&mut self, byte: u8) -> Result<(), CodecError> {
        if !self.is_ready_to_receive() {
            return Err(CodecError::NotReady);
        }

        let mut byte = byte;
        loop {
            if crate::status::is_status_byte(byte) {
                match StatusByte::try_from(byte) {
                    Ok(StatusByte::System(kind)) if kind.is_realtime() => {
                        self.prio.push(realtime_message(kind));
                        if kind == SystemKind::SystemReset {
                            self.state = State::Idle;
                            self.in_sysex = false;
                            self.sysex_counter = 0;
                        }
                        return Ok(());
                    }
                    Ok(StatusByte::System(SystemKind::SysexStop)) if self.in_sysex => {
                        self.close_sysex();
                        return Ok(());
                    }
                    // Any other status byte — including a reserved/undefined
                    // one, which falls to the Err(()) arm below — terminates
                    // an open sysex sequence first, then the same byte is
                    // reprocessed against the primary state.
                    Ok(_) if self.in_sysex => {
                        self.close_sysex();
                        continue;
                    }
                    Ok(sb) => {
                        self.handle_status(sb);
                        return Ok(());
                    }
                    Err(()) if self.in_sysex => {
                        self.close_sysex();
                        continue;
                    }
                    Err(()) => {
                        // Reserved/undefined status byte: ignored.
                        return Ok(());
                    }
                }
            } else if self.in_sysex {
                self.emit_sysex_byte(byte);
                return Ok(());
            } else {
                self.handle_data(byte);
                return Ok(());
            }
        }
    }

    pub fn has_output(&self) -> bool {
        !self.prio.is_empty() || !self.main.is_empty()
    }

    /// Priority queue is drained first whenever it's non-empty, under both
    /// priority modes.
    pub fn peek_msg(&self) -> Option<&Message> {
        if !self.prio.is_empty() {
            self.prio.peek()
        } else {
            self.main.peek()
        }
    }

    pub fn pop_msg(&mut self) -> Option<Message> {
        if !self.prio.is_empty() {
            self.prio.pop()
        } else {
            self.main.pop()
        }
    }

    fn handle_status(&mut self, sb: StatusByte) {
        match sb {
            StatusByte::ChannelVoice(kind, channel) => {
                self.state = State::ExpectData1Channel { kind, channel };
            }
            StatusByte::System(SystemKind::SysexStart) => {
                self.main.push(Message::SysexStart);
                self.in_sysex = true;
                self.sysex_counter = 0;
                self.state = State::Idle;
            }
            StatusByte::System(SystemKind::SysexStop) => {
                // Not in sysex: no-op, but any non-real-time status byte
                // still clears running status.
                self.state = State::Idle;
            }
            StatusByte::System(
                kind @ (SystemKind::MtcQuarterFrame
                | SystemKind::SongSelect
                | SystemKind::SongPositionPointer),
            ) => {
                self.state = State::ExpectData1System { kind };
            }
            StatusByte::System(SystemKind::TuneRequest) => {
                self.main.push(Message::TuneRequest);
                self.state = State::Idle;
            }
            StatusByte::System(
                SystemKind::TimingClock
                | SystemKind::Start
                | SystemKind::Continue
                | SystemKind::Stop
                | SystemKind::ActiveSensing
                | SystemKind::SystemReset,
            ) => {
                // Unreachable: real-time bytes are intercepted in push_byte
                // before handle_status is ever called.
            }
        }
    }

    fn handle_data(&mut self, byte: u8) {
        let data = U7(byte);
        match self.state {
            State::Idle => {
                // Stray data byte outside sysex and outside running status:
                // ignored.
            }
            State::ExpectData1Channel { kind, channel } => match kind.data_len() {
                1 => {
                    let msg = complete_channel_message(kind, channel, data, None);
                    self.main.push(msg);
                    // stays in running status for the next byte
                }
                _ => {
                    self.state = State::ExpectData2Channel {
                        kind,
                        channel,
                        data1: data,
                    };
                }
            },
            State::ExpectData2Channel {
                kind,
                channel,
                data1,
            } => {
                let msg = complete_channel_message(kind, channel, data1, Some(data));
                self.main.push(msg);
                self.state = State::ExpectData1Channel { kind, channel };
            }
            State::ExpectData1System { kind } => match kind {
                SystemKind::MtcQuarterFrame => {
                    // byte is a data byte (bit 7 clear), so byte>>4 <= 7:
                    // both fields are always in range.
                    self.main.push(Message::MtcQuarterFrame(MtcQuarterFramePayload {
                        frame_type: U3((byte >> 4) & 0x07),
                        value: U4(byte & 0x0F),
                    }));
                    self.state = State::Idle;
                }
                SystemKind::SongSelect => {
                    self.main.push(Message::SongSelect(data));
                    self.state = State::Idle;
                }
                SystemKind::SongPositionPointer => {
                    self.state = State::ExpectData2System {
                        kind,
                        data1: data,
                    };
                }
                _ => unreachable!("only MTC/SongSelect/SPP reach ExpectData1System"),
            },
            State::ExpectData2System { kind: _, data1 } => {
                let value = U14::from((data1, data));
                self.main.push(Message::SongPositionPointer(value));
                self.state = State::Idle;
            }
        }
    }

    fn emit_sysex_byte(&mut self, byte: u8) {
        let seq = self.sysex_counter;
        self.sysex_counter = self.sysex_counter.saturating_add(1);
        self.main.push(Message::SysexByte(SysexBytePayload {
            sequence_number: seq,
            byte: U7(byte),
        }));
    }

    fn close_sysex(&mut self) {
        let count = self.sysex_counter;
        let (sequence_length, is_length_overflowed) = if count > 0x7FFF {
            (0x7FFFu16, true)
        } else {
            (count as u16, false)
        };
        self.main.push(Message::SysexStop(SysexStopPayload {
            sequence_length,
            is_length_overflowed,
        }));
        self.in_sysex = false;
        self.sysex_counter = 0;
    }
}

fn realtime_message(kind: SystemKind) -> Message {
    match kind {
        SystemKind::TimingClock => Message::TimingClock,
        SystemKind::Start => Message::Start,
        SystemKind::Continue => Message::Continue,
        SystemKind::Stop => Message::Stop,
        SystemKind::ActiveSensing => Message::ActiveSensing,
        SystemKind::SystemReset => Message::SystemReset,
        _ => unreachable!("only realtime SystemKinds are passed here"),
    }
}

fn complete_channel_message(
    kind: ChannelVoiceKind,
    channel_nibble: u8,
    data1: U7,
    data2: Option<U7>,
) -> Message {
    let channel = Channel::from_nibble(channel_nibble);
    match kind {
        ChannelVoiceKind::NoteOff => Message::NoteOff(
            channel,
            NotePayload {
                note: data1,
                velocity: data2.expect("NoteOff has 2 data bytes"),
            },
        ),
        ChannelVoiceKind::NoteOn => Message::NoteOn(
            channel,
            NotePayload {
                note: data1,
                velocity: data2.expect("NoteOn has 2 data bytes"),
            },
        ),
        ChannelVoiceKind::AftertouchPoly => Message::AftertouchPoly(
            channel,
            AftertouchPolyPayload {
                note: data1,
                value: data2.expect("AftertouchPoly has 2 data bytes"),
            },
        ),
        ChannelVoiceKind::ControlChange => Message::ControlChange(
            channel,
            ControlChangePayload {
                control: data1,
                value: data2.expect("ControlChange has 2 data bytes"),
            },
        ),
        ChannelVoiceKind::ProgramChange => Message::ProgramChange(channel, data1),
        ChannelVoiceKind::AftertouchMono => Message::AftertouchMono(channel, data1),
        ChannelVoiceKind::PitchBend => {
            let msb = data2.expect("PitchBend has 2 data bytes");
            Message::PitchBend(channel, I14::from((data1, msb)))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use core::convert::TryFrom as _;

    fn ch(n: u8) -> Channel {
        Channel::try_from(n).unwrap()
    }

    #[test]
    fn note_on_decode() {
        let mut d: Decoder = Decoder::new(PriorityMode::RealtimeFirst);
        for b in [0x91u8, 60, 100] {
            d.push_byte(b).unwrap();
        }
        assert_eq!(
            d.pop_msg(),
            Some(Message::NoteOn(
                ch(2),
                NotePayload {
                    note: U7(60),
                    velocity: U7(100)
                }
            ))
        );
        assert!(!d.has_output());
    }

    #[test]
    fn running_status_decode() {
        let mut d: Decoder = Decoder::new(PriorityMode::RealtimeFirst);
        for b in [0x91u8, 60, 100, 62, 90, 64, 0] {
            d.push_byte(b).unwrap();
        }
        let expect = |n, v| {
            Message::NoteOn(
                ch(2),
                NotePayload {
                    note: U7(n),
                    velocity: U7(v),
                },
            )
        };
        assert_eq!(d.pop_msg(), Some(expect(60, 100)));
        assert_eq!(d.pop_msg(), Some(expect(62, 90)));
        assert_eq!(d.pop_msg(), Some(expect(64, 0)));
        assert!(!d.has_output());
    }

    #[test]
    fn realtime_mid_message() {
        let mut d: Decoder = Decoder::new(PriorityMode::RealtimeFirst);
        for b in [0x91u8, 60, 0xF8, 100] {
            d.push_byte(b).unwrap();
        }
        // RealtimeFirst: TimingClock (priority queue) pops before NoteOn
        // even though NoteOn's bytes bracketed it on the wire.
        assert_eq!(d.pop_msg(), Some(Message::TimingClock));
        assert_eq!(
            d.pop_msg(),
            Some(Message::NoteOn(
                ch(2),
                NotePayload {
                    note: U7(60),
                    velocity: U7(100)
                }
            ))
        );
    }

    #[test]
    fn pitch_bend_signed() {
        let decode = |bytes: [u8; 3]| {
            let mut d: Decoder = Decoder::new(PriorityMode::RealtimeFirst);
            for b in bytes {
                d.push_byte(b).unwrap();
            }
            d.pop_msg().unwrap()
        };
        assert_eq!(
            decode([0xE0, 0x00, 0x00]),
            Message::PitchBend(ch(1), I14(-8192))
        );
        assert_eq!(
            decode([0xE0, 0x00, 0x40]),
            Message::PitchBend(ch(1), I14(0))
        );
        assert_eq!(
            decode([0xE0, 0x7F, 0x7F]),
            Message::PitchBend(ch(1), I14(8191))
        );
    }

    #[test]
    fn sysex_with_realtime_interruption() {
        let mut d: Decoder = Decoder::new(PriorityMode::RealtimeFirst);
        for b in [0xF0u8, 0x08, 0x19, 0xF8, 0x2A, 0xF7] {
            d.push_byte(b).unwrap();
        }
        assert_eq!(d.pop_msg(), Some(Message::TimingClock)); // priority queue drains first
        assert_eq!(d.pop_msg(), Some(Message::SysexStart));
        assert_eq!(
            d.pop_msg(),
            Some(Message::SysexByte(SysexBytePayload {
                sequence_number: 0,
                byte: U7(0x08)
            }))
        );
        assert_eq!(
            d.pop_msg(),
            Some(Message::SysexByte(SysexBytePayload {
                sequence_number: 1,
                byte: U7(0x19)
            }))
        );
        assert_eq!(
            d.pop_msg(),
            Some(Message::SysexByte(SysexBytePayload {
                sequence_number: 2,
                byte: U7(0x2A)
            }))
        );
        assert_eq!(
            d.pop_msg(),
            Some(Message::SysexStop(SysexStopPayload {
                sequence_length: 3,
                is_length_overflowed: false
            }))
        );
        assert!(!d.has_output());
    }

    #[test]
    fn sysex_truncated_by_status_emits_stop_then_reprocesses() {
        let mut d: Decoder = Decoder::new(PriorityMode::Fifo);
        for b in [0xF0u8, 0x01, 0x91u8, 60, 100] {
            d.push_byte(b).unwrap();
        }
        assert_eq!(d.pop_msg(), Some(Message::SysexStart));
        assert_eq!(
            d.pop_msg(),
            Some(Message::SysexByte(SysexBytePayload {
                sequence_number: 0,
                byte: U7(0x01)
            }))
        );
        assert_eq!(
            d.pop_msg(),
            Some(Message::SysexStop(SysexStopPayload {
                sequence_length: 1,
                is_length_overflowed: false
            }))
        );
        assert_eq!(
            d.pop_msg(),
            Some(Message::NoteOn(
                ch(2),
                NotePayload {
                    note: U7(60),
                    velocity: U7(100)
                }
            ))
        );
    }

    #[test]
    fn stray_sysex_stop_is_ignored() {
        let mut d: Decoder = Decoder::new(PriorityMode::RealtimeFirst);
        d.push_byte(0xF7).unwrap();
        assert!(!d.has_output());
    }

    #[test]
    fn reserved_subtype_ignored() {
        let mut d: Decoder = Decoder::new(PriorityMode::RealtimeFirst);
        d.push_byte(0xF4).unwrap();
        assert!(!d.has_output());
    }

    #[test]
    fn reserved_subtype_mid_sysex_closes_sequence() {
        let mut d: Decoder = Decoder::new(PriorityMode::RealtimeFirst);
        for b in [0xF0u8, 0x01, 0x02, 0xF4, 0x03] {
            d.push_byte(b).unwrap();
        }
        assert_eq!(d.pop_msg(), Some(Message::SysexStart));
        assert_eq!(
            d.pop_msg(),
            Some(Message::SysexByte(SysexBytePayload {
                sequence_number: 0,
                byte: U7(0x01)
            }))
        );
        assert_eq!(
            d.pop_msg(),
            Some(Message::SysexByte(SysexBytePayload {
                sequence_number: 1,
                byte: U7(0x02)
            }))
        );
        assert_eq!(
            d.pop_msg(),
            Some(Message::SysexStop(SysexStopPayload {
                sequence_length: 2,
                is_length_overflowed: false
            }))
        );
        // 0xF4 is reserved and ignored; 0x03 is a stray data byte (no
        // running status survives into/out of a sysex sequence)
        assert!(!d.has_output());
    }

    #[test]
    fn sysex_clears_running_status() {
        let mut d: Decoder = Decoder::new(PriorityMode::Fifo);
        for b in [0x90u8, 60, 100, 0xF0, 0x01, 0xF7, 61, 70] {
            d.push_byte(b).unwrap();
        }
        assert_eq!(
            d.pop_msg(),
            Some(Message::NoteOn(
                ch(1),
                NotePayload {
                    note: U7(60),
                    velocity: U7(100)
                }
            ))
        );
        assert_eq!(d.pop_msg(), Some(Message::SysexStart));
        assert_eq!(
            d.pop_msg(),
            Some(Message::SysexByte(SysexBytePayload {
                sequence_number: 0,
                byte: U7(0x01)
            }))
        );
        assert_eq!(
            d.pop_msg(),
            Some(Message::SysexStop(SysexStopPayload {
                sequence_length: 1,
                is_length_overflowed: false
            }))
        );
        // running status from the NoteOn before the sysex must not survive
        // it; 61/70 are stray data bytes now that state is Idle
        assert!(!d.has_output());
    }

    #[test]
    fn stray_sysex_stop_clears_running_status() {
        let mut d: Decoder = Decoder::new(PriorityMode::RealtimeFirst);
        for b in [0x90u8, 60, 100, 0xF7, 61, 70] {
            d.push_byte(b).unwrap();
        }
        assert_eq!(
            d.pop_msg(),
            Some(Message::NoteOn(
                ch(1),
                NotePayload {
                    note: U7(60),
                    velocity: U7(100)
                }
            ))
        );
        assert!(!d.has_output());
    }

    #[test]
    fn system_reset_clears_running_status() {
        let mut d: Decoder = Decoder::new(PriorityMode::RealtimeFirst);
        for b in [0x91u8, 60, 100] {
            d.push_byte(b).unwrap();
        }
        d.pop_msg();
        d.push_byte(0xFF).unwrap(); // SystemReset
        d.pop_msg(); // drain the SystemReset itself
        // bare data byte after reset should be ignored, not parsed as
        // continued NoteOn running status
        d.push_byte(62).unwrap();
        assert!(!d.has_output());
    }

    #[test]
    fn not_ready_rejected_without_mutation() {
        let mut d: Decoder<2> = Decoder::new(PriorityMode::RealtimeFirst);
        // main queue needs room for MAX_GENERATED_PER_BYTE (2); fill it so a
        // single real-time byte still fits but the precondition can be
        // exercised deterministically via the priority queue being full.
        d.prio.push(Message::TimingClock);
        d.prio.push(Message::TimingClock);
        assert!(!d.is_ready_to_receive());
        assert_eq!(d.push_byte(0xF8), Err(CodecError::NotReady));
    }
}
