//! APDU framing for the NEO configuration protocol.
//!
//! Outbound commands are short APDUs:
//!
//! ```text
//! +-----+-----+----+----+----+-------------+
//! | CLA | INS | P1 | P2 | Lc | data[0..Lc] |
//! +-----+-----+----+----+----+-------------+
//! ```
//!
//! Replies start with a 6-byte STATUS record. The SELECT reply carries a
//! 4-byte DEVICE_CONFIG record right after it. Multi-byte fields are
//! little-endian. Anything past the records (the SW1/SW2 trailer) is ignored.

use crate::constants::{
    APDU_DATA_CAPACITY, APDU_HEADER_SIZE, DEVICE_CONFIG_SIZE, INS_SELECT, INS_YK2_REQ, MAX_APDU_DATA, MAX_APDU_SIZE,
    P1_SELECT_BY_NAME, SELECT_RESPONSE_SIZE, STATUS_SIZE,
};
use crate::error::NeoError;
use heapless::Vec;
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// A serialized command frame. Never grows past [`MAX_APDU_SIZE`].
pub type FrameBuffer = Vec<u8, MAX_APDU_SIZE>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    data: Vec<u8, APDU_DATA_CAPACITY>,
}

impl CommandFrame {
    /// Build a frame, rejecting data that does not fit a one-byte Lc.
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8, data: &[u8]) -> Result<Self, NeoError> {
        if data.len() > MAX_APDU_DATA {
            return Err(NeoError::FrameOverflow {
                max: MAX_APDU_DATA,
                actual: data.len(),
            });
        }
        let data = Vec::from_slice(data).map_err(|_| NeoError::FrameOverflow {
            max: MAX_APDU_DATA,
            actual: data.len(),
        })?;
        Ok(Self { cla, ins, p1, p2, data })
    }

    /// Lc, always equal to `data().len()`
    pub fn lc(&self) -> u8 {
        self.data.len() as u8
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Total length on the wire
    pub fn wire_len(&self) -> usize {
        APDU_HEADER_SIZE + self.data.len()
    }

    pub fn to_bytes(&self) -> FrameBuffer {
        let mut frame = FrameBuffer::new();
        // header + at most MAX_APDU_DATA bytes always fits
        frame.extend([self.cla, self.ins, self.p1, self.p2, self.lc()]);
        frame.extend(self.data.iter().copied());
        frame
    }
}

/// STATUS record, present at the start of every reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct StatusRecord {
    pub version_major: u8,
    pub version_minor: u8,
    pub version_build: u8,
    /// Bumped by the device on every effective configuration write
    pub pgm_seq: u8,
    pub touch_level: U16,
}

/// DEVICE_CONFIG record: the USB interface configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct DeviceConfig {
    /// Packed mode byte, see [`crate::mode`]
    pub mode: u8,
    pub cr_timeout: u8,
    pub auto_eject_time: U16,
}

const _: () = assert!(size_of::<StatusRecord>() == STATUS_SIZE);
const _: () = assert!(size_of::<DeviceConfig>() == DEVICE_CONFIG_SIZE);

impl StatusRecord {
    pub fn version(&self) -> (u8, u8, u8) {
        (self.version_major, self.version_minor, self.version_build)
    }
}

impl DeviceConfig {
    pub fn new(mode: u8, cr_timeout: u8, auto_eject_time: u16) -> Self {
        Self {
            mode,
            cr_timeout,
            auto_eject_time: U16::new(auto_eject_time),
        }
    }
}

/// SELECT the application `aid` by name.
pub fn encode_select(aid: &[u8]) -> Result<CommandFrame, NeoError> {
    CommandFrame::new(0, INS_SELECT, P1_SELECT_BY_NAME, 0, aid)
}

/// Write `config` into configuration slot `slot`.
pub fn encode_write_config(slot: u8, config: &DeviceConfig) -> CommandFrame {
    let mut data: Vec<u8, APDU_DATA_CAPACITY> = Vec::new();
    data.extend(config.as_bytes().iter().copied());
    CommandFrame {
        cla: 0,
        ins: INS_YK2_REQ,
        p1: slot,
        p2: 0,
        data,
    }
}

pub fn decode_status(buf: &[u8]) -> Result<StatusRecord, NeoError> {
    let (status, _) = StatusRecord::read_from_prefix(buf).map_err(|_| NeoError::TruncatedResponse {
        expected: STATUS_SIZE,
        actual: buf.len(),
    })?;
    Ok(status)
}

/// Decode the SELECT reply: STATUS immediately followed by DEVICE_CONFIG.
pub fn decode_select_response(buf: &[u8]) -> Result<(StatusRecord, DeviceConfig), NeoError> {
    if buf.len() < SELECT_RESPONSE_SIZE {
        return Err(NeoError::TruncatedResponse {
            expected: SELECT_RESPONSE_SIZE,
            actual: buf.len(),
        });
    }
    let status = decode_status(buf)?;
    let (config, _) = DeviceConfig::read_from_prefix(&buf[STATUS_SIZE..]).map_err(|_| NeoError::TruncatedResponse {
        expected: SELECT_RESPONSE_SIZE,
        actual: buf.len(),
    })?;
    Ok((status, config))
}
