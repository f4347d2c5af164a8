//! Output priority mode.
//!
//! Both variants drain the priority (real-time) queue first when it is
//! non-empty — this is the correct semantic under both modes, since
//! real-time events are injected "now" between other bytes regardless. The
//! enum is kept for API shape and to let callers express intent; the
//! behavioral difference between variants is cosmetic.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PriorityMode {
    Fifo,
    RealtimeFirst,
}

impl Default for PriorityMode {
    fn default() -> Self {
        PriorityMode::RealtimeFirst
    }
}
