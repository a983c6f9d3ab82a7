//! Share Encoding
//!
//! - **chunk**: splitting oversized values into command-sized fragments
//! - **number**: canonical hex form and unsigned comparison of shares

pub mod chunk;
pub mod number;

pub use chunk::{fragment, reassemble, Fragment};
pub use number::{compare_unsigned, decode_hex, encode_hex};
