use crate::constants::{INS_SELECT, INS_YK2_REQ};
use crate::error::NeoError;
use crate::frame::CommandFrame;
use crate::transport::Transport;
use bytes::Bytes;
use std::fmt::Write;

const BYTES_PER_ROW: usize = 0x10;

/// Classic hex dump: offset, 16 hex bytes split by '-' after the eighth, printable ASCII.
///
/// ```text
/// reply: 4 bytes
/// 0000: 41 42 90 00                                      <AB..            >
/// ```
pub fn hex_dump(descr: &str, buf: &[u8]) -> String {
    let mut out = format!("{}: {} bytes\n", descr, buf.len());
    let mut rows: Vec<&[u8]> = buf.chunks(BYTES_PER_ROW).collect();
    if rows.is_empty() {
        rows.push(&[]);
    }

    for (i, row) in rows.iter().enumerate() {
        let _ = write!(out, "{:04x}:", i * BYTES_PER_ROW);
        for j in 0..BYTES_PER_ROW {
            match row.get(j) {
                Some(b) => {
                    let sep = if j == 8 { '-' } else { ' ' };
                    let _ = write!(out, "{}{:02x}", sep, b);
                }
                None => out.push_str("   "),
            }
        }
        out.push_str(" <");
        for j in 0..BYTES_PER_ROW {
            out.push(match row.get(j) {
                Some(b) if b.is_ascii_graphic() || *b == b' ' => *b as char,
                Some(_) => '.',
                None => ' ',
            });
        }
        out.push_str(">\n");
    }
    out
}

/// Prints a hex dump of every reply that passes through.
pub struct DumpTransport<T> {
    inner: T,
}

impl<T: Transport> DumpTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn describe(frame: &CommandFrame) -> &'static str {
    match frame.ins {
        INS_SELECT => "Transmit [NEO select aid]",
        INS_YK2_REQ => "Transmit [NEO write config]",
        _ => "Transmit",
    }
}

impl<T: Transport> Transport for DumpTransport<T> {
    fn exchange(&mut self, frame: &CommandFrame) -> Result<Bytes, NeoError> {
        let reply = self.inner.exchange(frame)?;
        print!("\n{}", hex_dump(describe(frame), &reply));
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_short_row() {
        let dump = hex_dump("reply", &[0x41, 0x42, 0x90, 0x00]);
        let expected = format!("reply: 4 bytes\n0000: 41 42 90 00{} <AB..{}>\n", " ".repeat(36), " ".repeat(12));
        assert_eq!(dump, expected);
    }

    #[test]
    fn test_dump_separator_and_second_row() {
        let data: Vec<u8> = (0x30..0x42).collect();
        let dump = hex_dump("x", &data);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "x: 18 bytes");
        assert_eq!(
            lines[1],
            "0000: 30 31 32 33 34 35 36 37-38 39 3a 3b 3c 3d 3e 3f <0123456789:;<=>?>"
        );
        assert!(lines[2].starts_with("0010: 40 41   "));
        assert!(lines[2].ends_with("<@A              >"));
    }

    #[test]
    fn test_dump_empty() {
        let dump = hex_dump("empty", &[]);
        assert_eq!(dump, format!("empty: 0 bytes\n0000:{} <{}>\n", " ".repeat(48), " ".repeat(16)));
    }
}
