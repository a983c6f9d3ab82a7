//! Command and response APDUs
//!
//! Commands are serialized as short ISO 7816-4 APDUs. Payloads never exceed
//! [`MAX_PAYLOAD`] bytes and the expected response length never exceeds 256
//! (encoded as `00`).

use crate::error::{ProxyError, Result};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Largest payload a single short command can carry.
pub const MAX_PAYLOAD: usize = 255;

/// Largest expected response length of a short command.
pub const MAX_RESPONSE: u16 = 256;

/// Byte used for unused P1/P2 parameters.
pub const NONE: u8 = 0x00;

/// P2 values of the two halves of a multi-part read.
pub const P2_PART_0: u8 = 0x00;
pub const P2_PART_1: u8 = 0x01;

/// 16-bit status word returned with every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord(pub u16);

impl StatusWord {
    pub const SUCCESS: StatusWord = StatusWord(0x9000);
    pub const CONDITIONS_NOT_SATISFIED: StatusWord = StatusWord(0x6985);
    pub const COMMAND_NOT_ALLOWED: StatusWord = StatusWord(0x6986);

    pub fn is_success(self) -> bool {
        self.class() == StatusClass::Success
    }

    pub fn class(self) -> StatusClass {
        match self {
            Self::SUCCESS => StatusClass::Success,
            Self::CONDITIONS_NOT_SATISFIED => StatusClass::ConditionsNotSatisfied,
            Self::COMMAND_NOT_ALLOWED => StatusClass::CommandNotAllowed,
            _ => StatusClass::Other,
        }
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// Closed classification of status words. Only success and the two business
/// codes carry meaning; the meaning of the latter depends on the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    ConditionsNotSatisfied,
    CommandNotAllowed,
    Other,
}

/// Command payloads carry key shares and are wiped on drop.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Command {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub data: Vec<u8>,
    /// Expected response length, `None` when no data is expected.
    pub le: Option<u16>,
}

impl Command {
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: None,
        }
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    pub fn expecting(mut self, le: u16) -> Self {
        self.le = Some(le);
        self
    }

    /// ISO 7816-4 SELECT by application identifier.
    pub fn select(aid: &[u8]) -> Self {
        Self::new(0x00, 0xA4, 0x04, 0x00).with_data(aid.to_vec())
    }

    /// Serialize as a short APDU (cases 1 to 4).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.data.len() > MAX_PAYLOAD {
            return Err(ProxyError::validation(format!(
                "Command payload of {} bytes exceeds {} bytes.",
                self.data.len(),
                MAX_PAYLOAD
            )));
        }

        let mut out = Vec::with_capacity(6 + self.data.len());
        out.extend_from_slice(&[self.cla, self.ins, self.p1, self.p2]);
        if !self.data.is_empty() {
            out.push(self.data.len() as u8);
            out.extend_from_slice(&self.data);
        }
        if let Some(le) = self.le {
            match le {
                1..=255 => out.push(le as u8),
                256 => out.push(0x00),
                _ => {
                    return Err(ProxyError::validation(format!(
                        "Expected response length {le} is out of range."
                    )))
                }
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Response {
    #[zeroize(skip)]
    pub sw: StatusWord,
    pub data: Vec<u8>,
}

impl Response {
    pub fn new(sw: StatusWord, data: Vec<u8>) -> Self {
        Self { sw, data }
    }

    pub fn success(data: Vec<u8>) -> Self {
        Self::new(StatusWord::SUCCESS, data)
    }

    pub fn status(sw: StatusWord) -> Self {
        Self::new(sw, Vec::new())
    }

    /// Split raw response bytes into data and the trailing status word.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() < 2 {
            return Err(ProxyError::Connect(format!(
                "Malformed response from card: {}",
                hex::encode_upper(raw)
            )));
        }
        let (data, sw) = raw.split_at(raw.len() - 2);
        Ok(Self {
            sw: StatusWord(u16::from_be_bytes([sw[0], sw[1]])),
            data: data.to_vec(),
        })
    }
}
