use zmq::Message;

// The high 56 bits let an actor tell control frames apart from user
// payload on the same PAIR socket; the low byte carries the tag.
const SIGNAL_PREFIX: u64 = 0x7766_5544_3322_1100;

/// Control message exchanged between an actor and its parent thread.
///
/// A signal travels as exactly eight octets: the little-endian 64-bit
/// word `0x7766554433221100 | tag` with tags 1 (success), 2 (failure)
/// and 3 (stop). Any frame of a different length, or whose high 56
/// bits differ from the prefix, is not a signal and [`Signal::decode`]
/// rejects it.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum Signal {
    Success = 1,
    Failure = 2,
    Stop = 3,
}

impl Signal {
    /// Encodes the signal into its eight-octet wire form.
    pub fn encode(self) -> [u8; 8] {
        (SIGNAL_PREFIX | self as u64).to_le_bytes()
    }

    /// Decodes a frame, returning `None` for anything outside the
    /// encoding's image.
    pub fn decode(data: &[u8]) -> Option<Signal> {
        let word = u64::from_le_bytes(data.try_into().ok()?);
        if word & !0xFF != SIGNAL_PREFIX {
            return None;
        }
        match word & 0xFF {
            1 => Some(Signal::Success),
            2 => Some(Signal::Failure),
            3 => Some(Signal::Stop),
            _ => None,
        }
    }

    /// Ready-to-send success frame.
    pub fn create_success() -> Message {
        Signal::Success.into_message()
    }

    /// Ready-to-send failure frame.
    pub fn create_failure() -> Message {
        Signal::Failure.into_message()
    }

    /// Ready-to-send stop frame.
    pub fn create_stop() -> Message {
        Signal::Stop.into_message()
    }

    /// Wraps the encoded signal into a transport message.
    pub fn into_message(self) -> Message {
        Message::from(&self.encode()[..])
    }

    pub fn is_success(self) -> bool {
        self == Signal::Success
    }

    pub fn is_failure(self) -> bool {
        self == Signal::Failure
    }

    pub fn is_stop(self) -> bool {
        self == Signal::Stop
    }
}
