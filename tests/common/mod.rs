//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use ykneo::error::NeoError;
#[allow(unused_imports)]
pub use ykneo::frame::{CommandFrame, DeviceConfig, StatusRecord, decode_select_response, decode_status};
#[allow(unused_imports)]
pub use ykneo::mode::{BaseMode, ModeSelection, parse_mode_token, render_mode_byte, split_mode_byte};
#[allow(unused_imports)]
pub use ykneo::protocol::{CommitDecision, FailureReason, ModeSwitch, Outcome, ProtocolState};
#[allow(unused_imports)]
pub use ykneo::transport::Transport;

use std::collections::VecDeque;

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

/// SELECT reply: firmware 3.2.5, seq 3, touch level 0, mode 02, timeout 15, eject 0, SW 9000
#[allow(dead_code)]
pub const SELECT_REPLY_SEQ3: &str = "030205030000020f00009000";

/// STATUS reply with the given sequence counter, followed by SW 9000
#[allow(dead_code)]
pub fn status_reply(pgm_seq: u8) -> Bytes {
    Bytes::from(vec![3, 2, 5, pgm_seq, 0, 0, 0x90, 0x00])
}

/// SELECT reply with the given sequence counter and mode byte
#[allow(dead_code)]
pub fn select_reply(pgm_seq: u8, mode: u8) -> Bytes {
    Bytes::from(vec![3, 2, 5, pgm_seq, 0, 0, mode, 15, 0, 0, 0x90, 0x00])
}

/// Replays canned replies and records every frame it was asked to send.
#[derive(Default)]
#[allow(dead_code)]
pub struct MockTransport {
    pub replies: VecDeque<Result<Bytes, NeoError>>,
    pub sent: Vec<CommandFrame>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new(replies: Vec<Result<Bytes, NeoError>>) -> Self {
        Self {
            replies: replies.into(),
            sent: Vec::new(),
        }
    }

    pub fn with_replies(replies: Vec<Bytes>) -> Self {
        Self::new(replies.into_iter().map(Ok).collect())
    }
}

impl Transport for MockTransport {
    fn exchange(&mut self, frame: &CommandFrame) -> Result<Bytes, NeoError> {
        self.sent.push(frame.clone());
        self.replies
            .pop_front()
            .unwrap_or_else(|| Err(NeoError::TransmitFailure("no more canned replies".into())))
    }
}

/// A transmit failure as the PC/SC layer would report it
#[allow(dead_code)]
pub fn transmit_failure() -> NeoError {
    NeoError::TransmitFailure("card removed".into())
}
