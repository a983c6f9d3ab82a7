//! Client-full role
//!
//! The card generates the client keys itself and hands out the server's
//! exponent share d''1 together with the partial modulus N1. Both end up in
//! `for_server.key` for the server to import.

use super::client::SigningCodes;
use super::engine::{Engine, Outcome};
use super::{keys_already_set, Report};
use crate::apdu::{Command, StatusWord, MAX_RESPONSE, NONE};
use crate::card::Transport;
use crate::codec::number::encode_hex;
use crate::error::Result;
use crate::storage::{ShareStore, Slot};

pub const APPLET_AID: [u8; 11] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x01, 0x03,
];

pub const CLA: u8 = 0x80;

pub const INS_GENERATE_KEYS: u8 = 0x10;
pub const INS_GET_KEYS: u8 = 0x12;
pub const INS_SET_MESSAGE: u8 = 0x14;
pub const INS_SIGNATURE: u8 = 0x16;
pub const INS_RESET: u8 = 0x18;

pub const P1_GET_D1_SERVER: u8 = 0x00;
pub const P1_GET_N1: u8 = 0x01;

pub const SIGNING: SigningCodes = SigningCodes {
    cla: CLA,
    ins_set_message: INS_SET_MESSAGE,
    ins_sign: INS_SIGNATURE,
};

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

    get_keys(engine, store)?;
    report.wrote(Slot::ServerBoundKeys);
    report.step("Storing the server client keys share...");
    Ok(())
}

/// Read d''1 and N1 from the card and store them for the server.
fn get_keys<T: Transport>(engine: &mut Engine<T>, store: &dyn ShareStore) -> Result<()> {
    let d1_server = engine.send(
        &Command::new(CLA, INS_GET_KEYS, P1_GET_D1_SERVER, NONE).expecting(MAX_RESPONSE),
        "Get D''1",
    )?;
    let n1 = engine.send(
        &Command::new(CLA, INS_GET_KEYS, P1_GET_N1, NONE).expecting(MAX_RESPONSE),
        "Get N1",
    )?;

    store.write(
        Slot::ServerBoundKeys,
        &[encode_hex(&d1_server.data), encode_hex(&n1.data)],
    )
}
