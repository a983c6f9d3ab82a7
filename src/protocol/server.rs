//! Server role
//!
//! The server card generates its own share, imports the server part of the
//! client keys (d''1, N1) and publishes the joint public modulus. At signing
//! time it takes the message and the client signature share and returns the
//! final signature.

use super::engine::{decode_bounded, load_paired_share, Engine, Outcome};
use super::{keys_already_set, Report};
use crate::apdu::{Command, StatusWord, NONE};
use crate::card::Transport;
use crate::codec::chunk::fragment_commands;
use crate::codec::number::encode_hex;
use crate::error::{ProxyError, Result};
use crate::storage::{read_record, ShareStore, Slot};

pub const APPLET_AID: [u8; 11] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x01, 0x04,
];

pub const CLA: u8 = 0x80;

/// Instruction codes
pub const INS_GENERATE_KEYS: u8 = 0x10;
pub const INS_SET_CLIENT_KEYS: u8 = 0x12;
pub const INS_GET_PUBLIC_MODULUS: u8 = 0x14;
pub const INS_SET_CLIENT_SIGNATURE: u8 = 0x16;
pub const INS_SIGNATURE: u8 = 0x18;
pub const INS_GET_SIGNATURE: u8 = 0x20;
pub const INS_RESET: u8 = 0x22;

/// P1 parameters of INS_SET_CLIENT_KEYS
pub const P1_SET_N1: u8 = 0x00;
pub const P1_SET_D1_SERVER: u8 = 0x01;

/// P1 parameters of INS_SET_CLIENT_SIGNATURE
pub const P1_SET_MESSAGE: u8 = 0x00;
pub const P1_SET_SIGNATURE: u8 = 0x01;

/// Public exponent 65537, written in front of the public modulus.
pub const PUBLIC_EXPONENT: [u8; 3] = [0x01, 0x00, 0x01];

pub fn generate_keys<T: Transport>(
    engine: &mut Engine<T>,
    store: &dyn ShareStore,
    report: &mut Report,
) -> Result<()> {
    let keygen = Command::new(CLA, INS_GENERATE_KEYS, NONE, NONE);
    let outcome = engine.send_tolerating(&keygen, "Keygen", StatusWord::COMMAND_NOT_ALLOWED)?;
    if let Outcome::Tolerated { status, .. } = outcome {
        return Err(keys_already_set("Keygen", status));
    }
    report.step("Generating keys...");

    set_client_keys(engine, store, report)?;

    engine.fetch_and_store(
        store,
        Slot::PublicKey,
        encode_hex(&PUBLIC_EXPONENT),
        "GetModulus",
        CLA,
        INS_GET_PUBLIC_MODULUS,
    )?;
    report.wrote(Slot::PublicKey);
    report.step("Storing public modulus...");
    Ok(())
}

/// Import the server share of the client keys.
fn set_client_keys<T: Transport>(
    engine: &mut Engine<T>,
    store: &dyn ShareStore,
    report: &mut Report,
) -> Result<()> {
    let pair = load_paired_share(
        store,
        Slot::ServerBoundKeys,
        CLA,
        INS_SET_CLIENT_KEYS,
        P1_SET_D1_SERVER,
        P1_SET_N1,
    )?;
    report.step("Loading client keys...");

    engine.send_batch(&pair.exponent, "Set D''1")?;
    engine.send_batch(&pair.modulus, "Set N1")?;
    report.step("Transmitting client keys share...");
    Ok(())
}

pub fn sign_message<T: Transport>(
    engine: &mut Engine<T>,
    store: &dyn ShareStore,
    report: &mut Report,
) -> Result<()> {
    let message = send_client_signature(engine, store, report)?;

    engine.send(&Command::new(CLA, INS_SIGNATURE, NONE, NONE), "Sign")?;
    report.step("Signing...");

    engine.fetch_and_store(
        store,
        Slot::FinalSignature,
        message,
        "GetFinalSig",
        CLA,
        INS_GET_SIGNATURE,
    )?;
    report.wrote(Slot::FinalSignature);
    report.step("Storing final signature...");
    Ok(())
}

/// Load the message and client signature share and hand both to the card.
/// Returns the message line.
fn send_client_signature<T: Transport>(
    engine: &mut Engine<T>,
    store: &dyn ShareStore,
    report: &mut Report,
) -> Result<String> {
    let mut lines = read_record(store, Slot::ClientSignature, 2)?;
    let message = decode_bounded(&lines[0], "Message")?;
    let signature = decode_bounded(&lines[1], "Client signature share")?;

    let cmd_message =
        fragment_commands(&message, CLA, INS_SET_CLIENT_SIGNATURE, P1_SET_MESSAGE)?;
    let cmd_signature =
        fragment_commands(&signature, CLA, INS_SET_CLIENT_SIGNATURE, P1_SET_SIGNATURE)?;
    report.step("Loading client signature...");

    let outcome = engine.send_batch_tolerating(
        &cmd_message,
        "Set message",
        StatusWord::CONDITIONS_NOT_SATISFIED,
    )?;
    if let Outcome::Tolerated { status, .. } = outcome {
        return Err(ProxyError::Refused {
            operation: "Set message".to_string(),
            status,
            reason: "Keys have not been generated/set yet.",
        });
    }
    engine.send_batch(&cmd_signature, "Set client signature share")?;
    report.step("Transmitting client signature...");

    Ok(lines.swap_remove(0))
}
