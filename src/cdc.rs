//! CDC-ACM class state and application callbacks
//!
//! The control endpoint answers the ACM class requests on its own. When the
//! host changes something that the application might care about, the
//! driver tells the application through [`Callbacks`]. Callbacks run in the
//! USB interrupt, so keep them short. [`LineEvents`] is a `Callbacks`
//! implementation that latches each event for the main loop to poll.

/// SET_LINE_CODING class request
pub const SET_LINE_CODING: u8 = 0x20;
/// GET_LINE_CODING class request
pub const GET_LINE_CODING: u8 = 0x21;
/// SET_CONTROL_LINE_STATE class request
pub const SET_CONTROL_LINE_STATE: u8 = 0x22;
/// SEND_BREAK class request
pub const SEND_BREAK: u8 = 0x23;

/// Notification endpoint (interrupt IN)
pub const NOTIFICATION_ENDPOINT: usize = 1;
/// Data endpoint for host to device bytes (bulk OUT)
pub const DATA_OUT_ENDPOINT: usize = 2;
/// Data endpoint for device to host bytes (bulk IN)
pub const DATA_IN_ENDPOINT: usize = 3;

/// Serial line settings requested by the host
///
/// Fields hold the raw values from the host, so that GET_LINE_CODING
/// returns exactly what SET_LINE_CODING provided. Use [`stop_bits()`](LineCoding::stop_bits)
/// and [`parity()`](LineCoding::parity) for the decoded settings.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LineCoding {
    /// Data terminal rate, in bits per second
    pub dte_rate: u32,
    /// 0 = 1 stop bit, 1 = 1.5 stop bits, 2 = 2 stop bits
    pub stop_bits: u8,
    /// 0 = none, 1 = odd, 2 = even, 3 = mark, 4 = space
    pub parity: u8,
    /// 5, 6, 7, 8 or 16
    pub data_bits: u8,
}

impl LineCoding {
    /// Size of the line coding structure on the wire
    pub const SIZE: usize = 7;

    /// 115200 baud, 8 data bits, no parity, 1 stop bit
    pub const DEFAULT: Self = LineCoding {
        dte_rate: 115_200,
        stop_bits: 0,
        parity: 0,
        data_bits: 8,
    };

    /// Decode the line coding structure
    ///
    /// Returns `None` if there are fewer than seven bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes: &[u8; Self::SIZE] = bytes.get(..Self::SIZE)?.try_into().ok()?;
        Some(LineCoding {
            dte_rate: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            stop_bits: bytes[4],
            parity: bytes[5],
            data_bits: bytes[6],
        })
    }

    /// Encode the line coding structure
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let rate = self.dte_rate.to_le_bytes();
        [
            rate[0],
            rate[1],
            rate[2],
            rate[3],
            self.stop_bits,
            self.parity,
            self.data_bits,
        ]
    }

    /// Returns `None` if the host sent an unknown stop bit setting
    pub fn stop_bits(&self) -> Option<StopBits> {
        match self.stop_bits {
            0 => Some(StopBits::One),
            1 => Some(StopBits::OnePointFive),
            2 => Some(StopBits::Two),
            _ => None,
        }
    }

    /// Returns `None` if the host sent an unknown parity setting
    pub fn parity(&self) -> Option<Parity> {
        match self.parity {
            0 => Some(Parity::None),
            1 => Some(Parity::Odd),
            2 => Some(Parity::Even),
            3 => Some(Parity::Mark),
            4 => Some(Parity::Space),
            _ => None,
        }
    }
}

impl Default for LineCoding {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StopBits {
    One,
    OnePointFive,
    Two,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

bitflags::bitflags! {
    /// `wValue` of SET_CONTROL_LINE_STATE
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct ControlLines: u16 {
        /// Data terminal ready
        const DTR = 1 << 0;
        /// Request to send
        const RTS = 1 << 1;
    }
}

/// Application hooks for class requests
///
/// Every method has an empty default. `()` implements `Callbacks` if you
/// don't care.
pub trait Callbacks {
    /// The host sent SET_LINE_CODING
    fn on_line_coding_changed(&mut self, line_coding: &LineCoding) {
        let _ = line_coding;
    }
    /// The host sent SET_CONTROL_LINE_STATE
    ///
    /// `value` is the raw `wValue`; see [`ControlLines`].
    fn on_control_line_state(&mut self, value: u16) {
        let _ = value;
    }
    /// The host sent SEND_BREAK
    fn on_break(&mut self) {}
}

impl Callbacks for () {}

/// Latches class events until the application takes them
///
/// Each `take_*` method returns the latest event, if any, and clears it.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct LineEvents {
    line_coding: Option<LineCoding>,
    control_lines: Option<ControlLines>,
    break_requested: bool,
}

impl LineEvents {
    pub const fn new() -> Self {
        LineEvents {
            line_coding: None,
            control_lines: None,
            break_requested: false,
        }
    }

    pub fn take_line_coding(&mut self) -> Option<LineCoding> {
        self.line_coding.take()
    }

    pub fn take_control_line_state(&mut self) -> Option<ControlLines> {
        self.control_lines.take()
    }

    pub fn take_break(&mut self) -> bool {
        core::mem::take(&mut self.break_requested)
    }
}

impl Callbacks for LineEvents {
    fn on_line_coding_changed(&mut self, line_coding: &LineCoding) {
        self.line_coding = Some(*line_coding);
    }
    fn on_control_line_state(&mut self, value: u16) {
        self.control_lines = Some(ControlLines::from_bits_truncate(value));
    }
    fn on_break(&mut self) {
        self.break_requested = true;
    }
}

#[cfg(test)]
mod tests {
    use super::{Callbacks, ControlLines, LineCoding, LineEvents, Parity, StopBits};

    #[test]
    fn default_line_coding() {
        let coding = LineCoding::default();
        assert_eq!(coding.to_bytes(), [0x00, 0xC2, 0x01, 0x00, 0, 0, 8]);
        assert_eq!(coding.stop_bits(), Some(StopBits::One));
        assert_eq!(coding.parity(), Some(Parity::None));
    }

    #[test]
    fn decode_line_coding() {
        let coding = LineCoding::from_bytes(&[0x80, 0x25, 0x00, 0x00, 2, 2, 7, 0xFF]).unwrap();
        assert_eq!(
            coding,
            LineCoding {
                dte_rate: 9600,
                stop_bits: 2,
                parity: 2,
                data_bits: 7,
            }
        );
        assert_eq!(coding.stop_bits(), Some(StopBits::Two));
        assert_eq!(coding.parity(), Some(Parity::Even));

        assert!(LineCoding::from_bytes(&[0x80, 0x25, 0x00, 0x00, 2, 2]).is_none());
    }

    #[test]
    fn unknown_settings_kept_raw() {
        let bytes = [0x40, 0x42, 0x0F, 0x00, 9, 7, 8];
        let coding = LineCoding::from_bytes(&bytes).unwrap();
        assert_eq!(coding.stop_bits(), None);
        assert_eq!(coding.parity(), None);
        assert_eq!(coding.to_bytes(), bytes);
    }

    #[test]
    fn line_events() {
        let mut events = LineEvents::new();
        assert_eq!(events.take_line_coding(), None);
        assert_eq!(events.take_control_line_state(), None);
        assert!(!events.take_break());

        let coding = LineCoding {
            dte_rate: 9600,
            ..LineCoding::DEFAULT
        };
        events.on_line_coding_changed(&coding);
        events.on_control_line_state(0x0003);
        events.on_break();

        assert_eq!(events.take_line_coding(), Some(coding));
        assert_eq!(events.take_line_coding(), None);
        assert_eq!(
            events.take_control_line_state(),
            Some(ControlLines::DTR | ControlLines::RTS)
        );
        assert!(events.take_break());
        assert!(!events.take_break());
    }
}
