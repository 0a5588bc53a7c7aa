//! # NEO device configuration exchange
//!
//! Switching the USB mode takes two APDUs:
//!
//! 1. SELECT the OTP applet. The reply carries the current STATUS and
//!    DEVICE_CONFIG records.
//! 2. Write a new DEVICE_CONFIG to [`SLOT_DEVICE_CONFIG`]. The reply carries
//!    a fresh STATUS record.
//!
//! The device has no explicit acknowledgement for the write. It bumps the
//! one-byte program sequence counter (`pgm_seq`) whenever a configuration
//! actually takes effect, so the write counts as applied only when the
//! counter read after it is exactly one more than the counter read before.
//!
//! Between the two steps the exchange suspends for a commit decision from
//! the caller. [`ModeSwitch`] tracks where it is in that sequence:
//!
//! ```text
//! Idle -> AwaitingSelectResponse -> ConfigRead -> AwaitingCommitDecision
//!      -> AwaitingWriteResponse -> Verified | Failed
//! ```
//!
//! Nothing is retried. After a failure the caller has to start over with a
//! fresh read, so a write is never applied twice by accident.

use crate::constants::{DEFAULT_CHAL_TIMEOUT, NEO_AID, SLOT_DEVICE_CONFIG};
use crate::error::NeoError;
use crate::frame::{
    CommandFrame, DeviceConfig, StatusRecord, decode_select_response, decode_status, encode_select,
    encode_write_config,
};
use crate::mode::{ModeSelection, render_mode_byte};
use crate::transport::Transport;
use bytes::Bytes;
use std::fmt;
use strum_macros::Display;
use tracing::{debug, info, warn};

/// Why a transaction ended in [`ProtocolState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FailureReason {
    #[strum(to_string = "transport error")]
    Transport,
    #[strum(to_string = "truncated response")]
    TruncatedResponse,
    #[strum(to_string = "sequence mismatch")]
    SequenceMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    Idle,
    AwaitingSelectResponse,
    ConfigRead,
    AwaitingCommitDecision,
    AwaitingWriteResponse,
    Verified,
    Failed(FailureReason),
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolState::Failed(reason) => write!(f, "Failed ({})", reason),
            other => write!(f, "{:?}", other),
        }
    }
}

/// The caller's answer at the suspension point between read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitDecision {
    Commit,
    Abort,
}

impl CommitDecision {
    /// Interpret a prompt answer. Only "y" and "yes" commit.
    pub fn from_answer(answer: &str) -> Self {
        let answer = answer.trim();
        if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
            CommitDecision::Commit
        } else {
            CommitDecision::Abort
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The caller declined; no write frame was sent.
    Cancelled,
    /// The sequence counter advanced by exactly one.
    Verified {
        before: StatusRecord,
        after: StatusRecord,
        written: DeviceConfig,
    },
}

/// Check the sequence rule: `after` must equal `before + 1`, without wrapping.
pub fn verify_sequence(before: u8, after: u8) -> Result<(), NeoError> {
    let expected = u16::from(before) + 1;
    if u16::from(after) == expected {
        Ok(())
    } else {
        Err(NeoError::SequenceMismatch {
            expected,
            observed: after,
        })
    }
}

/// One mode switch transaction over an exclusively borrowed transport.
pub struct ModeSwitch<'t, T: Transport + ?Sized> {
    transport: &'t mut T,
    state: ProtocolState,
    status: Option<StatusRecord>,
}

impl<'t, T: Transport + ?Sized> ModeSwitch<'t, T> {
    pub fn new(transport: &'t mut T) -> Self {
        Self {
            transport,
            state: ProtocolState::Idle,
            status: None,
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    fn transition(&mut self, next: ProtocolState) {
        debug!("{} -> {}", self.state, next);
        self.state = next;
    }

    fn expect_state(&self, expected: ProtocolState, operation: &str) -> Result<(), NeoError> {
        if self.state != expected {
            return Err(NeoError::Protocol(format!(
                "{} called in state {}, expected {}",
                operation, self.state, expected
            )));
        }
        Ok(())
    }

    fn exchange(&mut self, frame: &CommandFrame) -> Result<Bytes, NeoError> {
        self.transport.exchange(frame).inspect_err(|e| {
            warn!("Exchange failed: {}", e);
            self.state = ProtocolState::Failed(FailureReason::Transport);
        })
    }

    /// SELECT the applet and return the current status and configuration.
    ///
    /// On success the transaction waits for [`ModeSwitch::commit`].
    pub fn read_config(&mut self) -> Result<(StatusRecord, DeviceConfig), NeoError> {
        self.expect_state(ProtocolState::Idle, "read_config")?;
        let frame = encode_select(&NEO_AID)?;

        self.transition(ProtocolState::AwaitingSelectResponse);
        let reply = self.exchange(&frame)?;
        let (status, config) = decode_select_response(&reply).inspect_err(|_| {
            self.state = ProtocolState::Failed(FailureReason::TruncatedResponse);
        })?;
        self.transition(ProtocolState::ConfigRead);

        info!(
            "Device version {}.{}.{}, seq {}, mode {:#04x}",
            status.version_major, status.version_minor, status.version_build, status.pgm_seq, config.mode
        );
        self.status = Some(status);
        self.transition(ProtocolState::AwaitingCommitDecision);
        Ok((status, config))
    }

    /// Resume after the commit decision.
    ///
    /// `Abort` returns to `Idle` without touching the device. `Commit` writes
    /// `selection` and verifies the sequence counter. An unrenderable
    /// selection is rejected before anything is sent and the transaction
    /// keeps waiting for a decision.
    pub fn commit(&mut self, decision: CommitDecision, selection: ModeSelection) -> Result<Outcome, NeoError> {
        self.expect_state(ProtocolState::AwaitingCommitDecision, "commit")?;
        let before = self
            .status
            .ok_or_else(|| NeoError::Protocol("no status recorded before commit".to_string()))?;

        if decision == CommitDecision::Abort {
            info!("Commit declined, nothing written.");
            self.status = None;
            self.transition(ProtocolState::Idle);
            return Ok(Outcome::Cancelled);
        }

        let config = DeviceConfig::new(render_mode_byte(selection)?, DEFAULT_CHAL_TIMEOUT, 0);
        let frame = encode_write_config(SLOT_DEVICE_CONFIG, &config);
        info!("Writing mode {:#04x} ({})", config.mode, selection);

        self.transition(ProtocolState::AwaitingWriteResponse);
        let reply = self.exchange(&frame)?;
        let after = decode_status(&reply).inspect_err(|_| {
            self.state = ProtocolState::Failed(FailureReason::TruncatedResponse);
        })?;

        match verify_sequence(before.pgm_seq, after.pgm_seq) {
            Ok(()) => {
                info!("Sequence advanced {} -> {}", before.pgm_seq, after.pgm_seq);
                self.transition(ProtocolState::Verified);
                Ok(Outcome::Verified {
                    before,
                    after,
                    written: config,
                })
            }
            Err(e) => {
                warn!("{}", e);
                self.transition(ProtocolState::Failed(FailureReason::SequenceMismatch));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_rule() {
        assert!(verify_sequence(5, 6).is_ok());
        assert!(matches!(
            verify_sequence(5, 5),
            Err(NeoError::SequenceMismatch { expected: 6, observed: 5 })
        ));
        assert!(matches!(
            verify_sequence(5, 7),
            Err(NeoError::SequenceMismatch { expected: 6, observed: 7 })
        ));
    }

    #[test]
    fn test_sequence_rule_does_not_wrap() {
        assert!(matches!(
            verify_sequence(255, 0),
            Err(NeoError::SequenceMismatch {
                expected: 256,
                observed: 0
            })
        ));
    }

    #[test]
    fn test_commit_answers() {
        for answer in ["y", "Y", "yes", "YES\n", "  yes  \r\n"] {
            assert_eq!(CommitDecision::from_answer(answer), CommitDecision::Commit, "{:?}", answer);
        }
        for answer in ["", "\n", "n", "no", "yess", "ja"] {
            assert_eq!(CommitDecision::from_answer(answer), CommitDecision::Abort, "{:?}", answer);
        }
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ProtocolState::AwaitingCommitDecision.to_string(), "AwaitingCommitDecision");
        assert_eq!(
            ProtocolState::Failed(FailureReason::SequenceMismatch).to_string(),
            "Failed (sequence mismatch)"
        );
    }
}
