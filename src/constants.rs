// Device constants for the YubiKey NEO OTP applet

/// Application identifier of the NEO OTP applet
pub const NEO_AID: [u8; 7] = [0xa0, 0x00, 0x00, 0x05, 0x27, 0x20, 0x01];

/// GlobalPlatform SELECT instruction
pub const INS_SELECT: u8 = 0xa4;

/// SELECT parameter: select by application name
pub const P1_SELECT_BY_NAME: u8 = 0x04;

/// Vendor instruction carrying a YubiKey 2 style slot request
pub const INS_YK2_REQ: u8 = 0x01;

/// Slot addressed by a device configuration write
pub const SLOT_DEVICE_CONFIG: u8 = 0x11;

/// Challenge-response timeout written along with a new mode, in seconds
pub const DEFAULT_CHAL_TIMEOUT: u8 = 15;

/// Low nibble of the mode byte: the base USB mode
pub const BASE_MODE_MASK: u8 = 0x0f;

/// Mode byte flag: CCID device supports eject (mode 1 only)
pub const MODE_FLAG_EJECT: u8 = 0x80;

/// Size of an APDU header: CLA, INS, P1, P2, Lc (5 bytes)
pub const APDU_HEADER_SIZE: usize = 5;

/// Capacity of the command data buffer (256 bytes)
pub const APDU_DATA_CAPACITY: usize = 0x100;

/// Largest data field a short APDU can announce in its Lc byte
pub const MAX_APDU_DATA: usize = u8::MAX as usize;

/// Upper bound on a serialized command frame (261 bytes)
pub const MAX_APDU_SIZE: usize = APDU_HEADER_SIZE + APDU_DATA_CAPACITY;

/// Size of the STATUS record (6 bytes)
pub const STATUS_SIZE: usize = 6;

/// Size of the DEVICE_CONFIG record (4 bytes)
pub const DEVICE_CONFIG_SIZE: usize = 4;

/// Size of a SELECT reply: STATUS followed by DEVICE_CONFIG (10 bytes)
pub const SELECT_RESPONSE_SIZE: usize = STATUS_SIZE + DEVICE_CONFIG_SIZE;
