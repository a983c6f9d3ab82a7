//! SMPC RSA Proxy Protocols
//!
//! This module drives the card side of the two-party RSA signing scheme:
//!
//! - **engine**: command/response contract and generic sequences
//! - **client**: message signing shared by both client roles
//! - **client_sign**: client that imports externally generated keys
//! - **client_full**: client whose card generates the keys
//! - **server**: server that combines the client signature share
//!
//! A [`Proxy`] holds one role and its card channel for one action.

pub mod client;
pub mod client_full;
pub mod client_sign;
pub mod engine;
pub mod server;

use crate::card::Transport;
use crate::error::{ProxyError, Result};
use crate::storage::{ShareStore, Slot};
use clap::ValueEnum;
use engine::Engine;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    ClientSign,
    ClientFull,
    Server,
}

impl Role {
    pub fn applet_id(self) -> &'static [u8] {
        match self {
            Role::ClientSign => &client_sign::APPLET_AID,
            Role::ClientFull => &client_full::APPLET_AID,
            Role::Server => &server::APPLET_AID,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Role::ClientSign => "CLIENT-SIGN",
            Role::ClientFull => "CLIENT-FULL",
            Role::Server => "SERVER",
        }
    }
}

impl FromStr for Role {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self> {
        <Self as ValueEnum>::from_str(s, false)
            .map_err(|_| ProxyError::Usage(format!("unknown mode '{s}'")))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title().to_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Set (client-sign) or generate (client-full, server) the keys
    Generate,
    Sign,
    Reset,
}

impl Action {
    /// Card state after the action succeeds.
    pub fn resulting_state(self) -> TokenState {
        match self {
            Action::Generate => TokenState::KeysEstablished,
            Action::Sign => TokenState::Signed,
            Action::Reset => TokenState::Connected,
        }
    }
}

impl FromStr for Action {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self> {
        <Self as ValueEnum>::from_str(s, false)
            .map_err(|_| ProxyError::Usage(format!("unknown action '{s}'")))
    }
}

/// Applet state as seen by a successful action. Only the card keeps it;
/// records on disk are untouched by a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenState {
    Connected,
    KeysEstablished,
    Signed,
}

/// What an action did. `state` is the card state once the action succeeds.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub role: Role,
    pub action: Action,
    pub state: TokenState,
    pub steps: Vec<String>,
    pub written: Vec<Slot>,
}

impl Report {
    pub fn new(role: Role, action: Action) -> Self {
        Self {
            role,
            action,
            state: action.resulting_state(),
            steps: Vec::new(),
            written: Vec::new(),
        }
    }

    pub(crate) fn step(&mut self, line: &str) {
        info!("{line}");
        self.steps.push(line.to_string());
    }

    pub(crate) fn wrote(&mut self, slot: Slot) {
        self.written.push(slot);
    }
}

/// Failure for a keygen or key import refused because the card already holds keys.
pub(crate) fn keys_already_set(operation: &str, status: crate::apdu::StatusWord) -> ProxyError {
    ProxyError::Refused {
        operation: operation.to_string(),
        status,
        reason: "Keys have already been set. Please, reset the card first.",
    }
}

/// One role bound to its card channel.
pub struct Proxy<T: Transport> {
    role: Role,
    engine: Engine<T>,
}

impl<T: Transport> Proxy<T> {
    /// Connect to the card and select the role's applet.
    pub fn connect(role: Role, transport: T) -> Result<Self> {
        let engine = Engine::connect(transport, role.applet_id())?;
        Ok(Self { role, engine })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn run(&mut self, action: Action, store: &dyn ShareStore) -> Result<Report> {
        let mut report = Report::new(self.role, action);
        self.execute(action, store, &mut report)?;
        Ok(report)
    }

    /// Run `action`, recording each step into `report` once it completes.
    /// On failure `report` holds the steps finished before the error.
    pub fn execute(
        &mut self,
        action: Action,
        store: &dyn ShareStore,
        report: &mut Report,
    ) -> Result<()> {
        match action {
            Action::Generate => self.generate_into(store, report),
            Action::Sign => self.sign_into(store, report),
            Action::Reset => self.reset_into(report),
        }
    }

    pub fn generate_keys(&mut self, store: &dyn ShareStore) -> Result<Report> {
        self.run(Action::Generate, store)
    }

    pub fn sign_message(&mut self, store: &dyn ShareStore) -> Result<Report> {
        self.run(Action::Sign, store)
    }

    pub fn reset(&mut self) -> Result<Report> {
        let mut report = Report::new(self.role, Action::Reset);
        self.reset_into(&mut report)?;
        Ok(report)
    }

    fn generate_into(&mut self, store: &dyn ShareStore, report: &mut Report) -> Result<()> {
        match self.role {
            Role::ClientSign => client_sign::set_keys(&mut self.engine, store, report),
            Role::ClientFull => client_full::generate_keys(&mut self.engine, store, report),
            Role::Server => server::generate_keys(&mut self.engine, store, report),
        }
    }

    fn sign_into(&mut self, store: &dyn ShareStore, report: &mut Report) -> Result<()> {
        match self.role {
            Role::ClientSign => {
                client::sign_message(&mut self.engine, store, &client_sign::SIGNING, report)
            }
            Role::ClientFull => {
                client::sign_message(&mut self.engine, store, &client_full::SIGNING, report)
            }
            Role::Server => server::sign_message(&mut self.engine, store, report),
        }
    }

    fn reset_into(&mut self, report: &mut Report) -> Result<()> {
        let (cla, ins) = match self.role {
            Role::ClientSign => (client_sign::CLA, client_sign::INS_RESET),
            Role::ClientFull => (client_full::CLA, client_full::INS_RESET),
            Role::Server => (server::CLA, server::INS_RESET),
        };
        self.engine.reset_sequence(cla, ins)?;
        report.step("Resetting...");
        Ok(())
    }
}
