pub mod constants;
pub mod dump;
pub mod error;
pub mod frame;
pub mod mode;
pub mod protocol;
pub mod transport;

pub use error::NeoError;
pub use frame::{CommandFrame, DeviceConfig, StatusRecord};
pub use mode::{BaseMode, ModeSelection};
pub use protocol::{CommitDecision, ModeSwitch, Outcome, ProtocolState};
pub use transport::Transport;

#[cfg(feature = "pcsc")]
pub use transport::PcscSession;
