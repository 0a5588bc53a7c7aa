use crate::error::NeoError;
use crate::frame::CommandFrame;
use bytes::Bytes;

/// One request/response exchange with the card.
pub trait Transport {
    /// Send `frame` and block until the reply arrives.
    fn exchange(&mut self, frame: &CommandFrame) -> Result<Bytes, NeoError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn exchange(&mut self, frame: &CommandFrame) -> Result<Bytes, NeoError> {
        (**self).exchange(frame)
    }
}

#[cfg(feature = "pcsc")]
pub use self::pcsc_session::PcscSession;

#[cfg(feature = "pcsc")]
mod pcsc_session {
    use super::Transport;
    use crate::error::NeoError;
    use crate::frame::CommandFrame;
    use bytes::Bytes;
    use pcsc::{Card, Context, Disposition, MAX_BUFFER_SIZE, Protocols, Scope, ShareMode};
    use std::ffi::CString;
    use tracing::{debug, info};

    // Room for the multi-string reader list
    const READER_LIST_SIZE: usize = 1024;

    /// A connection to the card in the first PC/SC reader.
    ///
    /// Dropping the session disconnects the card and releases the context.
    /// [`PcscSession::close`] does the same but reports failures.
    pub struct PcscSession {
        context: Context,
        card: Card,
        reader: CString,
    }

    impl PcscSession {
        pub fn open() -> Result<Self, NeoError> {
            info!("Establishing PC/SC context...");
            let context = Context::establish(Scope::System).map_err(|e| {
                debug!("SCardEstablishContext failed: {:?}", e);
                NeoError::ContextFailure(Box::new(e))
            })?;

            let mut readers_buf = [0u8; READER_LIST_SIZE];
            let reader = match context.list_readers(&mut readers_buf) {
                Ok(mut readers) => readers.next().map(|r| r.to_owned()),
                Err(pcsc::Error::NoReadersAvailable) => None,
                Err(e) => {
                    debug!("SCardListReaders failed: {:?}", e);
                    return Err(NeoError::ReaderListFailure(Box::new(e)));
                }
            };
            let reader = reader.ok_or(NeoError::NoReaderAvailable)?;
            info!("Using reader {:?}", reader);

            let card = context
                .connect(&reader, ShareMode::Shared, Protocols::T1)
                .map_err(|e| {
                    debug!("SCardConnect failed: {:?}", e);
                    NeoError::ConnectFailure(Box::new(e))
                })?;
            info!("Connected to card.");

            Ok(Self { context, card, reader })
        }

        pub fn reader(&self) -> &CString {
            &self.reader
        }

        /// Disconnect (leaving the card powered) and release the context.
        pub fn close(self) -> Result<(), NeoError> {
            let PcscSession { context, card, .. } = self;
            card.disconnect(Disposition::LeaveCard).map_err(|(_, e)| {
                debug!("SCardDisconnect failed: {:?}", e);
                NeoError::ReleaseFailure(Box::new(e))
            })?;
            context.release().map_err(|(_, e)| {
                debug!("SCardReleaseContext failed: {:?}", e);
                NeoError::ReleaseFailure(Box::new(e))
            })?;
            info!("Session closed.");
            Ok(())
        }
    }

    impl Transport for PcscSession {
        fn exchange(&mut self, frame: &CommandFrame) -> Result<Bytes, NeoError> {
            let request = frame.to_bytes();
            debug!("Sending {} bytes: {}", request.len(), hex::encode(&request));

            let mut response_buf = [0u8; MAX_BUFFER_SIZE];
            let response = self.card.transmit(&request, &mut response_buf).map_err(|e| {
                debug!("SCardTransmit failed: {:?}", e);
                NeoError::TransmitFailure(Box::new(e))
            })?;

            debug!("Received {} bytes: {}", response.len(), hex::encode(response));
            Ok(Bytes::copy_from_slice(response))
        }
    }
}
