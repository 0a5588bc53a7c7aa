use crate::constants::MODE_FLAG_EJECT;
use crate::error::NeoError;
use modular_bitfield::prelude::*;
use num_enum::{FromPrimitive, IntoPrimitive};
use std::fmt;

/// Flag nibble value of [`MODE_FLAG_EJECT`]
pub const FLAG_NIBBLE_EJECT: u8 = MODE_FLAG_EJECT >> 4;

/// Wire layout of the mode byte: base mode in the low nibble, flags in the high one.
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeByte {
    pub base: B4,
    pub flags: B4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum BaseMode {
    Hid = 0,
    Ccid = 1,
    Composite = 2,

    /// Reported by firmware we do not know how to configure
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl BaseMode {
    pub fn is_known(&self) -> bool {
        !matches!(self, BaseMode::Unknown(_))
    }
}

impl fmt::Display for BaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseMode::Hid => write!(f, "HID device only"),
            BaseMode::Ccid => write!(f, "CCID device only"),
            BaseMode::Composite => write!(f, "HID/CCID composite device"),
            BaseMode::Unknown(ordinal) => write!(f, "unknown mode {}", ordinal),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModeSelection {
    pub base_mode: BaseMode,
    /// High nibble of the mode byte
    pub flags: u8,
}

impl ModeSelection {
    pub fn new(base_mode: BaseMode, eject: bool) -> Self {
        let flags = if eject { FLAG_NIBBLE_EJECT } else { 0 };
        Self { base_mode, flags }
    }

    pub fn eject(&self) -> bool {
        self.flags & FLAG_NIBBLE_EJECT != 0
    }
}

impl fmt::Display for ModeSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_mode)?;
        if self.eject() {
            write!(f, " (eject)")?;
        }
        let other = self.flags & !FLAG_NIBBLE_EJECT;
        if other != 0 {
            write!(f, " (flags {:x})", other)?;
        }
        Ok(())
    }
}

fn hex_nibble(token: &str, c: u8) -> Result<u8, NeoError> {
    (c as char)
        .to_digit(16)
        .map(|d| d as u8)
        .ok_or_else(|| NeoError::InvalidMode(format!("'{}' is not a hex digit in \"{}\"", c as char, token)))
}

/// Parse a mode argument: one hex digit for the base mode, or a flag digit followed by it ("81").
pub fn parse_mode_token(token: &str) -> Result<ModeSelection, NeoError> {
    let (flags, ordinal) = match token.as_bytes() {
        [mode] => (0, hex_nibble(token, *mode)?),
        [flags, mode] => (hex_nibble(token, *flags)?, hex_nibble(token, *mode)?),
        _ => {
            return Err(NeoError::InvalidMode(format!(
                "expected one or two hex digits, got \"{}\"",
                token
            )));
        }
    };

    let base_mode = BaseMode::from_primitive(ordinal);
    if !base_mode.is_known() {
        return Err(NeoError::InvalidMode(format!("unknown base mode {}", ordinal)));
    }
    Ok(ModeSelection { base_mode, flags })
}

/// Pack a selection into the mode byte written to the device.
pub fn render_mode_byte(selection: ModeSelection) -> Result<u8, NeoError> {
    if !selection.base_mode.is_known() {
        return Err(NeoError::InvalidMode(format!("cannot write {}", selection.base_mode)));
    }
    if selection.flags & !FLAG_NIBBLE_EJECT != 0 {
        return Err(NeoError::InvalidMode(format!("undefined flags {:#x}", selection.flags)));
    }
    let byte = ModeByte::new()
        .with_base(selection.base_mode.into())
        .with_flags(selection.flags);
    Ok(byte.into_bytes()[0])
}

/// Unpack a mode byte as reported by the device.
pub fn split_mode_byte(mode: u8) -> ModeSelection {
    let byte = ModeByte::from_bytes([mode]);
    ModeSelection {
        base_mode: BaseMode::from_primitive(byte.base()),
        flags: byte.flags(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_digit_token() {
        let selection = parse_mode_token("2").unwrap();
        assert_eq!(selection.base_mode, BaseMode::Composite);
        assert_eq!(selection.flags, 0);
        assert!(!selection.eject());
    }

    #[test]
    fn test_eject_token() {
        let selection = parse_mode_token("81").unwrap();
        assert_eq!(selection.base_mode, BaseMode::Ccid);
        assert_eq!(selection.flags, 8);
        assert!(selection.eject());
        assert_eq!(render_mode_byte(selection).unwrap(), 0x81);
    }

    #[test]
    fn test_out_of_range_ordinal() {
        assert!(matches!(parse_mode_token("9"), Err(NeoError::InvalidMode(_))));
        assert!(matches!(parse_mode_token("83"), Err(NeoError::InvalidMode(_))));
    }

    #[test]
    fn test_malformed_tokens() {
        for token in ["", "g", "1x", "x1", "801", "+1", "é", " 1"] {
            assert!(
                matches!(parse_mode_token(token), Err(NeoError::InvalidMode(_))),
                "token {:?} should be rejected",
                token
            );
        }
    }

    #[test]
    fn test_undefined_flags_rejected_on_render() {
        let selection = parse_mode_token("41").unwrap();
        assert!(matches!(render_mode_byte(selection), Err(NeoError::InvalidMode(_))));

        let selection = ModeSelection {
            base_mode: BaseMode::Unknown(5),
            flags: 0,
        };
        assert!(matches!(render_mode_byte(selection), Err(NeoError::InvalidMode(_))));
    }

    #[test]
    fn test_two_digit_tokens_match_hex_value() {
        let mut accepted = 0;
        for value in 0..=u8::MAX {
            for token in [format!("{:02x}", value), format!("{:02X}", value)] {
                let Ok(selection) = parse_mode_token(&token) else {
                    continue;
                };
                let Ok(byte) = render_mode_byte(selection) else {
                    continue;
                };
                assert_eq!(byte, u8::from_str_radix(&token, 16).unwrap(), "token {}", token);
                accepted += 1;
            }
        }
        // {0, 8} x {0, 1, 2}, lower and upper case
        assert_eq!(accepted, 12);
    }

    #[test]
    fn test_split_render_inverse() {
        for value in 0..=u8::MAX {
            let selection = split_mode_byte(value);
            if let Ok(byte) = render_mode_byte(selection) {
                assert_eq!(byte, value);
            }
        }
        for byte in [0x00, 0x01, 0x02, 0x80, 0x81, 0x82] {
            assert_eq!(render_mode_byte(split_mode_byte(byte)).unwrap(), byte);
        }
    }

    #[test]
    fn test_split_reports_unknown_modes() {
        let selection = split_mode_byte(0x03);
        assert_eq!(selection.base_mode, BaseMode::Unknown(3));
        assert_eq!(selection.to_string(), "unknown mode 3");
        assert_eq!(split_mode_byte(0x81).to_string(), "CCID device only (eject)");
    }
}
