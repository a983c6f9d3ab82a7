//! Client-sign role
//!
//! The card never generates keys here: the client exponent share d'1 and the
//! partial modulus N1 come from the reference implementation through
//! `client_card.key` and are imported as they are.

use super::client::SigningCodes;
use super::engine::{load_paired_share, Engine, Outcome};
use super::{keys_already_set, Report};
use crate::apdu::StatusWord;
use crate::card::Transport;
use crate::error::Result;
use crate::storage::{ShareStore, Slot};

pub const APPLET_AID: [u8; 11] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x01, 0x02,
];

pub const CLA: u8 = 0x80;

pub const INS_SET_KEYS: u8 = 0x10;
pub const INS_SET_MESSAGE: u8 = 0x12;
pub const INS_SIGNATURE: u8 = 0x14;
pub const INS_RESET: u8 = 0x16;

pub const P1_SET_D1_CLIENT: u8 = 0x00;
pub const P1_SET_N1: u8 = 0x01;

pub const SIGNING: SigningCodes = SigningCodes {
    cla: CLA,
    ins_set_message: INS_SET_MESSAGE,
    ins_sign: INS_SIGNATURE,
};

/// Import the client key share into the card.
pub fn set_keys<T: Transport>(
    engine: &mut Engine<T>,
    store: &dyn ShareStore,
    report: &mut Report,
) -> Result<()> {
    let pair = load_paired_share(
        store,
        Slot::ClientKeys,
        CLA,
        INS_SET_KEYS,
        P1_SET_D1_CLIENT,
        P1_SET_N1,
    )?;
    report.step("Loading keys...");

    for (cmds, operation) in [(&pair.exponent, "Set D'1"), (&pair.modulus, "Set N1")] {
        let outcome =
            engine.send_batch_tolerating(cmds, operation, StatusWord::COMMAND_NOT_ALLOWED)?;
        if let Outcome::Tolerated { status, .. } = outcome {
            return Err(keys_already_set(operation, status));
        }
    }
    report.step("Transmitting keys...");
    Ok(())
}
