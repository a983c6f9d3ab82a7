pub mod apdu;
pub mod card;
pub mod codec;
pub mod error;
pub mod protocol;
pub mod storage;

pub use error::{ErrorKind, ProxyError, Result};
pub use protocol::{Action, Proxy, Report, Role, TokenState};
pub use storage::{FileStorage, ShareStore, Slot};
