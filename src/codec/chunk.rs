//! Fragmentation of oversized values
//!
//! A value that fits into one command payload travels as a single fragment.
//! Anything longer is cut from the least-significant end in strides of
//! `max_chunk` bytes: fragment 0 holds the lowest bytes and the last fragment
//! holds the (possibly shorter) most-significant remainder. The card expects
//! the fragments in increasing index order.

use crate::apdu::{Command, MAX_PAYLOAD};
use crate::error::{ProxyError, Result};

/// P2 flag marking one part of a divided value.
pub const P2_DIVIDED: u8 = 0x10;

/// P2 flag marking a value sent in one piece.
pub const P2_SINGLE: u8 = 0x00;

/// Indices share P2 with the divided flag and must fit in the low nibble.
const MAX_INDEX: usize = 0x0F;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub index: usize,
    pub divided: bool,
    pub data: Vec<u8>,
}

impl Fragment {
    /// P2 byte announcing this fragment to the card, `None` when the index
    /// does not fit in the low nibble.
    pub fn p2(&self) -> Option<u8> {
        if self.index > MAX_INDEX {
            return None;
        }
        let flag = if self.divided { P2_DIVIDED } else { P2_SINGLE };
        Some(flag | self.index as u8)
    }

    pub fn into_command(self, cla: u8, ins: u8, p1: u8) -> Result<Command> {
        let p2 = self.p2().ok_or_else(|| {
            ProxyError::validation(format!(
                "Fragment {} cannot be addressed in P2.",
                self.index
            ))
        })?;
        Ok(Command::new(cla, ins, p1, p2).with_data(self.data))
    }
}

/// Split `value` into fragments of at most `max_chunk` bytes.
pub fn fragment(value: &[u8], max_chunk: usize) -> Result<Vec<Fragment>> {
    if max_chunk == 0 {
        return Err(ProxyError::validation("Fragment size must be positive."));
    }

    if value.len() <= max_chunk {
        return Ok(vec![Fragment {
            index: 0,
            divided: false,
            data: value.to_vec(),
        }]);
    }

    // rchunks walks from the least-significant end and leaves the short
    // remainder for last.
    Ok(value
        .rchunks(max_chunk)
        .enumerate()
        .map(|(index, data)| Fragment {
            index,
            divided: true,
            data: data.to_vec(),
        })
        .collect())
}

/// Fragment `value` and wrap every piece into a command with the given header.
///
/// At most 16 fragments are addressable through P2.
pub fn fragment_commands(value: &[u8], cla: u8, ins: u8, p1: u8) -> Result<Vec<Command>> {
    let fragments = fragment(value, MAX_PAYLOAD)?;
    if fragments.len() > MAX_INDEX + 1 {
        return Err(ProxyError::validation(format!(
            "Value of {} bytes needs {} fragments, at most {} are addressable.",
            value.len(),
            fragments.len(),
            MAX_INDEX + 1
        )));
    }
    fragments
        .into_iter()
        .map(|f| f.into_command(cla, ins, p1))
        .collect()
}

/// Rebuild a value from its fragments, given in index order.
pub fn reassemble(fragments: &[Fragment]) -> Result<Vec<u8>> {
    match fragments {
        [] => Err(ProxyError::validation("No fragments to reassemble.")),
        [single] if !single.divided => {
            if single.index != 0 {
                return Err(ProxyError::validation(format!(
                    "Single fragment carries index {}.",
                    single.index
                )));
            }
            Ok(single.data.clone())
        }
        _ => {
            for (expected, f) in fragments.iter().enumerate() {
                if !f.divided {
                    return Err(ProxyError::validation(
                        "Single fragment mixed into a divided value.",
                    ));
                }
                if f.index != expected {
                    return Err(ProxyError::validation(format!(
                        "Fragment {} found where {} was expected.",
                        f.index, expected
                    )));
                }
            }

            let total = fragments.iter().map(|f| f.data.len()).sum();
            let mut value = Vec::with_capacity(total);
            for f in fragments.iter().rev() {
                value.extend_from_slice(&f.data);
            }
            Ok(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, RngCore};

    fn sequential(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_short_value_is_single() {
        for len in [0usize, 1, 254, 255] {
            let value = sequential(len);
            let frags = fragment(&value, 255).unwrap();
            assert_eq!(frags.len(), 1);
            assert_eq!(frags[0].index, 0);
            assert!(!frags[0].divided);
            assert_eq!(frags[0].p2(), Some(0x00));
            assert_eq!(frags[0].data, value);
        }
    }

    #[test]
    fn test_partial_modulus_splits_in_two() {
        let value = sequential(256);
        let frags = fragment(&value, 255).unwrap();

        assert_eq!(frags.len(), 2);
        // least-significant 255 bytes first
        assert_eq!(frags[0].data, value[1..].to_vec());
        assert_eq!(frags[0].p2(), Some(0x10));
        // most-significant remainder last
        assert_eq!(frags[1].data, vec![value[0]]);
        assert_eq!(frags[1].p2(), Some(0x11));
    }

    #[test]
    fn test_index_order_and_remainder() {
        let m = 4;
        let value = sequential(2 * m + 3);
        let frags = fragment(&value, m).unwrap();

        let indices: Vec<usize> = frags.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(frags[0].data, value[7..11].to_vec());
        assert_eq!(frags[1].data, value[3..7].to_vec());
        assert_eq!(frags[2].data, value[0..3].to_vec());
        assert!(frags.iter().all(|f| f.divided));
    }

    #[test]
    fn test_exact_multiple_has_no_short_tail() {
        let m = 5;
        let value = sequential(2 * m);
        let frags = fragment(&value, m).unwrap();
        assert_eq!(frags.len(), 2);
        assert!(frags.iter().all(|f| f.data.len() == m));
    }

    #[test]
    fn test_boundary_lengths_reassemble() {
        for m in 1usize..=9 {
            for len in [0, m, m + 1, 2 * m, 2 * m + 1, 2 * m + m / 2] {
                let value = sequential(len);
                let frags = fragment(&value, m).unwrap();
                assert_eq!(reassemble(&frags).unwrap(), value, "m={m} len={len}");
            }
        }
    }

    #[test]
    fn test_random_values_reassemble() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let m = rng.gen_range(1..=255usize);
            let len = rng.gen_range(0..=4096usize);
            let mut value = vec![0u8; len];
            rng.fill_bytes(&mut value);

            let frags = fragment(&value, m).unwrap();
            assert!(frags.iter().all(|f| f.data.len() <= m));
            assert_eq!(reassemble(&frags).unwrap(), value);
        }
    }

    #[test]
    fn test_many_fragments_reassemble() {
        let value: Vec<u8> = (0..17u8).collect();
        let frags = fragment(&value, 1).unwrap();
        assert_eq!(frags.len(), 17);
        assert_eq!(frags[16].index, 16);
        assert_eq!(frags[16].p2(), None);
        assert_eq!(reassemble(&frags).unwrap(), value);

        assert!(fragment(&[1, 2, 3], 0).is_err());
    }

    #[test]
    fn test_commands_limited_to_sixteen_fragments() {
        assert_eq!(
            fragment_commands(&sequential(16 * MAX_PAYLOAD), 0x80, 0x10, 0x00)
                .unwrap()
                .len(),
            16
        );
        let err = fragment_commands(&sequential(16 * MAX_PAYLOAD + 1), 0x80, 0x10, 0x00)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[test]
    fn test_reassemble_rejects_gaps() {
        let mut frags = fragment(&sequential(30), 10).unwrap();
        frags.remove(1);
        assert!(reassemble(&frags).is_err());
        assert!(reassemble(&[]).is_err());
    }

    #[test]
    fn test_reassemble_rejects_duplicates() {
        let mut frags = fragment(&sequential(30), 10).unwrap();
        frags[1] = frags[0].clone();
        assert!(reassemble(&frags).is_err());
    }

    #[test]
    fn test_reassemble_rejects_mixed_single_and_divided() {
        let mut frags = fragment(&sequential(30), 10).unwrap();
        frags[0].divided = false;
        assert!(reassemble(&frags).is_err());

        let single = Fragment {
            index: 1,
            divided: false,
            data: vec![0xAB],
        };
        assert!(reassemble(&[single]).is_err());
    }

    #[test]
    fn test_fragment_commands_carry_header() {
        let cmds = fragment_commands(&sequential(256), 0x80, 0x10, 0x01).unwrap();
        assert_eq!(cmds.len(), 2);
        assert!(cmds.iter().all(|c| c.cla == 0x80 && c.ins == 0x10 && c.p1 == 0x01));
        assert_eq!(cmds[0].p2, 0x10);
        assert_eq!(cmds[1].p2, 0x11);
        assert!(cmds.iter().all(|c| c.le.is_none()));
    }
}
