//! Message signing shared by both client roles

use super::engine::{decode_bounded, Engine, Outcome};
use super::Report;
use crate::apdu::{Command, StatusWord, MAX_RESPONSE, NONE};
use crate::card::Transport;
use crate::codec::chunk::fragment_commands;
use crate::codec::number::encode_hex;
use crate::error::{ProxyError, Result};
use crate::storage::{read_record, ShareStore, Slot};

/// Instructions a client applet uses for signing.
#[derive(Debug, Clone, Copy)]
pub struct SigningCodes {
    pub cla: u8,
    pub ins_set_message: u8,
    pub ins_sign: u8,
}

/// Send the message to the card, sign it with the client share and store
/// the message with the signature share for the server.
pub fn sign_message<T: Transport>(
    engine: &mut Engine<T>,
    store: &dyn ShareStore,
    codes: &SigningCodes,
    report: &mut Report,
) -> Result<()> {
    let message = read_record(store, Slot::Message, 1)?.remove(0);
    let value = decode_bounded(&message, "Message")?;
    let cmds = fragment_commands(&value, codes.cla, codes.ins_set_message, NONE)?;
    report.step("Loading message...");

    let outcome = engine.send_batch_tolerating(
        &cmds,
        "Set message",
        StatusWord::CONDITIONS_NOT_SATISFIED,
    )?;
    if let Outcome::Tolerated { status, .. } = outcome {
        return Err(ProxyError::Refused {
            operation: "Set message".to_string(),
            status,
            reason: "The client keys share has not been set!",
        });
    }
    report.step("Transmitting message...");

    let sign = Command::new(codes.cla, codes.ins_sign, NONE, NONE).expecting(MAX_RESPONSE);
    let resp = engine.send(&sign, "Signing")?;
    report.step("Signing...");

    store.write(Slot::ClientSignature, &[message, encode_hex(&resp.data)])?;
    report.wrote(Slot::ClientSignature);
    report.step("Storing signature...");
    Ok(())
}
