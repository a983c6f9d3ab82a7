//! Scripted in-memory card for tests

use super::Transport;
use crate::apdu::{Command, Response, StatusWord};
use crate::error::Result;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Everything the proxy did to the card.
#[derive(Debug, Default)]
pub struct CardLog {
    pub selected: Option<Vec<u8>>,
    pub sent: Vec<Command>,
    pub disconnects: usize,
}

impl CardLog {
    pub fn instructions(&self) -> Vec<u8> {
        self.sent.iter().map(|c| c.ins).collect()
    }
}

/// Answers scripted replies in order, then succeeds with filler data of the
/// expected length.
pub struct MockCard {
    log: Rc<RefCell<CardLog>>,
    replies: VecDeque<Response>,
    present: bool,
    filler: u8,
}

impl MockCard {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(CardLog::default())),
            replies: VecDeque::new(),
            present: true,
            filler: 0x5A,
        }
    }

    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::new()
        }
    }

    pub fn reply(mut self, response: Response) -> Self {
        self.replies.push_back(response);
        self
    }

    pub fn reply_ok(self) -> Self {
        self.reply(Response::success(Vec::new()))
    }

    pub fn reply_status(self, sw: u16) -> Self {
        self.reply(Response::status(StatusWord(sw)))
    }

    pub fn log(&self) -> Rc<RefCell<CardLog>> {
        Rc::clone(&self.log)
    }
}

impl Transport for MockCard {
    fn connect(&mut self, applet_id: &[u8]) -> bool {
        if self.present {
            self.log.borrow_mut().selected = Some(applet_id.to_vec());
        }
        self.present
    }

    fn transmit(&mut self, command: &Command) -> Result<Response> {
        self.log.borrow_mut().sent.push(command.clone());
        Ok(self.replies.pop_front().unwrap_or_else(|| {
            let len = command.le.unwrap_or(0) as usize;
            Response::success(vec![self.filler; len])
        }))
    }

    fn disconnect(&mut self) {
        self.log.borrow_mut().disconnects += 1;
    }
}
