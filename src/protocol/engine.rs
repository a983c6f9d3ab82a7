//! Command/Response Engine
//!
//! Owns the card channel for one invocation and implements the send contract
//! shared by all roles:
//!
//! - a success word (`9000`) passes,
//! - a tolerated business word is handed back as [`Outcome::Tolerated`] for the
//!   role to interpret,
//! - any other word fails with [`ProxyError::Protocol`].
//!
//! Batches stop at the first non-success word. Fragments already sent are not
//! rolled back.

use crate::apdu::{
    Command, Response, StatusClass, StatusWord, MAX_RESPONSE, NONE, P2_PART_0, P2_PART_1,
};
use crate::card::Transport;
use crate::codec::chunk::fragment_commands;
use crate::codec::number::{compare_unsigned, decode_hex, encode_hex};
use crate::error::{ProxyError, Result};
use crate::storage::{read_record, ShareStore, Slot};
use std::cmp::Ordering;
use std::time::Instant;
use tracing::debug;
use zeroize::Zeroizing;

/// Byte length of a partial modulus.
pub const PARTIAL_MODULUS_LENGTH: usize = 256;

/// Result of a send that tolerates one business status word.
#[derive(Debug)]
#[must_use]
pub enum Outcome<T> {
    Completed(T),
    /// Responses collected so far, the tolerated one last.
    Tolerated {
        status: StatusWord,
        responses: Vec<Response>,
    },
}

impl<T> Outcome<T> {
    pub fn tolerated(&self) -> Option<StatusWord> {
        match self {
            Outcome::Completed(_) => None,
            Outcome::Tolerated { status, .. } => Some(*status),
        }
    }
}

/// Command sequences for an exponent share and its partial modulus.
#[derive(Debug)]
pub struct PairedShare {
    pub exponent: Vec<Command>,
    pub modulus: Vec<Command>,
}

pub struct Engine<T: Transport> {
    transport: T,
}

impl<T: Transport> Engine<T> {
    /// Connect and select the applet. The channel is released when the engine
    /// is dropped.
    pub fn connect(mut transport: T, applet_id: &[u8]) -> Result<Self> {
        debug!(applet = %hex::encode_upper(applet_id), "selecting applet");
        if !transport.connect(applet_id) {
            return Err(ProxyError::Connect(
                "Make sure that the terminal and card are connected \
                 and that the correct applet is installed."
                    .to_string(),
            ));
        }
        Ok(Self { transport })
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn exchange(&mut self, cmd: &Command) -> Result<Response> {
        let raw = cmd.to_bytes()?;
        debug!("--> {} ({})", hex::encode_upper(&raw), raw.len());

        let started = Instant::now();
        let resp = self.transport.transmit(cmd)?;
        let elapsed = started.elapsed().as_millis();

        if resp.data.is_empty() {
            debug!("<-- {} [{} ms]", resp.sw, elapsed);
        } else {
            debug!(
                "<-- {} {} ({}) [{} ms]",
                hex::encode_upper(&resp.data),
                resp.sw,
                resp.data.len(),
                elapsed
            );
        }
        Ok(resp)
    }

    /// Send one command; anything but success fails.
    pub fn send(&mut self, cmd: &Command, operation: &str) -> Result<Response> {
        let resp = self.exchange(cmd)?;
        if !resp.sw.is_success() {
            return Err(ProxyError::Protocol {
                operation: operation.to_string(),
                status: resp.sw,
            });
        }
        Ok(resp)
    }

    /// Send one command, handing `tolerated` back instead of failing on it.
    pub fn send_tolerating(
        &mut self,
        cmd: &Command,
        operation: &str,
        tolerated: StatusWord,
    ) -> Result<Outcome<Response>> {
        let resp = self.exchange(cmd)?;
        match resp.sw.class() {
            StatusClass::Success => Ok(Outcome::Completed(resp)),
            // only the business codes can be tolerated
            StatusClass::ConditionsNotSatisfied | StatusClass::CommandNotAllowed
                if resp.sw == tolerated =>
            {
                Ok(Outcome::Tolerated {
                    status: resp.sw,
                    responses: vec![resp],
                })
            }
            _ => Err(ProxyError::Protocol {
                operation: operation.to_string(),
                status: resp.sw,
            }),
        }
    }

    /// Send a fragment sequence in order, failing at the first non-success word.
    pub fn send_batch(&mut self, cmds: &[Command], operation: &str) -> Result<Vec<Response>> {
        let mut responses = Vec::with_capacity(cmds.len());
        for cmd in cmds {
            responses.push(self.send(cmd, operation)?);
        }
        Ok(responses)
    }

    /// Send a fragment sequence in order. The batch stops at the first
    /// non-success word; only `tolerated` is returned instead of failing.
    pub fn send_batch_tolerating(
        &mut self,
        cmds: &[Command],
        operation: &str,
        tolerated: StatusWord,
    ) -> Result<Outcome<Vec<Response>>> {
        let mut responses = Vec::with_capacity(cmds.len());
        for cmd in cmds {
            match self.send_tolerating(cmd, operation, tolerated)? {
                Outcome::Completed(resp) => responses.push(resp),
                Outcome::Tolerated {
                    status,
                    responses: last,
                } => {
                    responses.extend(last);
                    return Ok(Outcome::Tolerated { status, responses });
                }
            }
        }
        Ok(Outcome::Completed(responses))
    }

    pub fn reset_sequence(&mut self, cla: u8, ins: u8) -> Result<()> {
        self.send(&Command::new(cla, ins, NONE, NONE), "Reset")?;
        Ok(())
    }

    /// Read a value the card returns in two halves and store it as the second
    /// line of `slot`, after `first_line`.
    pub fn fetch_and_store(
        &mut self,
        store: &dyn ShareStore,
        slot: Slot,
        first_line: String,
        operation: &str,
        cla: u8,
        ins: u8,
    ) -> Result<()> {
        let mut value = Zeroizing::new(Vec::with_capacity(2 * MAX_RESPONSE as usize));
        for p2 in [P2_PART_0, P2_PART_1] {
            let cmd = Command::new(cla, ins, NONE, p2).expecting(MAX_RESPONSE);
            let resp = self.send(&cmd, operation)?;
            value.extend_from_slice(&resp.data);
        }

        store.write(slot, &[first_line, encode_hex(&value)])?;
        debug!(record = %slot, "stored");
        Ok(())
    }
}

impl<T: Transport> Drop for Engine<T> {
    fn drop(&mut self) {
        self.transport.disconnect();
    }
}

/// Decode one share line, rejecting values longer than a partial modulus.
pub fn decode_bounded(line: &str, what: &str) -> Result<Zeroizing<Vec<u8>>> {
    let value = Zeroizing::new(decode_hex(line)?);
    if value.len() > PARTIAL_MODULUS_LENGTH {
        return Err(ProxyError::validation(format!(
            "{what} cannot be larger than the modulus."
        )));
    }
    Ok(value)
}

/// Load an exponent share and partial modulus record, check both, and cut
/// them into command sequences.
///
/// The modulus must be exactly [`PARTIAL_MODULUS_LENGTH`] bytes and the
/// exponent must not exceed it as an unsigned number.
pub fn load_paired_share(
    store: &dyn ShareStore,
    slot: Slot,
    cla: u8,
    ins: u8,
    p1_exponent: u8,
    p1_modulus: u8,
) -> Result<PairedShare> {
    let lines = Zeroizing::new(read_record(store, slot, 2)?);
    let exponent = Zeroizing::new(decode_hex(&lines[0])?);
    let modulus = decode_hex(&lines[1])?;

    if modulus.len() != PARTIAL_MODULUS_LENGTH {
        return Err(ProxyError::validation(format!(
            "Modulus is not a {}-bit number.",
            PARTIAL_MODULUS_LENGTH * 8
        )));
    }
    if compare_unsigned(&exponent, &modulus) == Ordering::Greater {
        return Err(ProxyError::validation(
            "Private key cannot be larger than modulus.",
        ));
    }

    Ok(PairedShare {
        exponent: fragment_commands(&exponent, cla, ins, p1_exponent)?,
        modulus: fragment_commands(&modulus, cla, ins, p1_modulus)?,
    })
}
