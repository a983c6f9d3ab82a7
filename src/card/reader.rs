use super::Transport;
use crate::apdu::{Command, Response};
use crate::error::{ProxyError, Result};
use pcsc::{Card, Context, Disposition, Protocols, Scope, ShareMode, MAX_BUFFER_SIZE_EXTENDED};
use tracing::{debug, warn};

/// PC/SC reader transport
pub struct PcscTransport {
    /// Reader name filter, first reader holding a card when unset
    reader: Option<String>,
    card: Option<Card>,
}

impl PcscTransport {
    pub fn new(reader: Option<String>) -> Self {
        Self { reader, card: None }
    }

    fn open(&self) -> std::result::Result<Option<Card>, pcsc::Error> {
        let ctx = Context::establish(Scope::User)?;
        let readers = ctx.list_readers_owned()?;
        debug!(count = readers.len(), "listed readers");

        for name in readers {
            let label = name.to_string_lossy();
            if let Some(filter) = &self.reader {
                if !label.contains(filter.as_str()) {
                    continue;
                }
            }
            match ctx.connect(&name, ShareMode::Shared, Protocols::ANY) {
                Ok(card) => {
                    debug!(reader = %label, "card found");
                    return Ok(Some(card));
                }
                Err(pcsc::Error::NoSmartcard) => continue,
                Err(e) => {
                    warn!(reader = %label, error = %e, "cannot connect");
                    continue;
                }
            }
        }
        Ok(None)
    }

    fn exchange(card: &Card, command: &Command) -> Result<Response> {
        let apdu = command.to_bytes()?;
        let mut buf = [0u8; MAX_BUFFER_SIZE_EXTENDED];
        let raw = card
            .transmit(&apdu, &mut buf)
            .map_err(|e| ProxyError::Connect(format!("Card communication failed: {e}")))?;
        Response::from_bytes(raw)
    }
}

impl Transport for PcscTransport {
    fn connect(&mut self, applet_id: &[u8]) -> bool {
        let card = match self.open() {
            Ok(Some(card)) => card,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "PC/SC unavailable");
                return false;
            }
        };

        match Self::exchange(&card, &Command::select(applet_id)) {
            Ok(resp) if resp.sw.is_success() => {
                self.card = Some(card);
                true
            }
            Ok(resp) => {
                warn!(status = %resp.sw, "applet selection refused");
                let _ = card.disconnect(Disposition::LeaveCard);
                false
            }
            Err(e) => {
                warn!(error = %e, "applet selection failed");
                let _ = card.disconnect(Disposition::LeaveCard);
                false
            }
        }
    }

    fn transmit(&mut self, command: &Command) -> Result<Response> {
        let card = self
            .card
            .as_ref()
            .ok_or_else(|| ProxyError::Connect("No card channel is open.".to_string()))?;
        Self::exchange(card, command)
    }

    fn disconnect(&mut self) {
        if let Some(card) = self.card.take() {
            if let Err((_, e)) = card.disconnect(Disposition::LeaveCard) {
                warn!(error = %e, "disconnect failed");
            }
        }
    }
}
