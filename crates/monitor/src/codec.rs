//! Conversion between attribute bits and the nine-character permission strings operators
//! read and type.
//!
//! A permission string lists bits 8 down to 0, using the mnemonic when the bit is set
//! and `-` otherwise:
//!
//! ```text
//! G S D A C T U W P
//! 8 7 6 5 4 3 2 1 0
//! ```

use core::fmt;

use paging::PermissionSet;

use crate::MonitorError;

/// Mnemonics from bit 8 down to bit 0.
const MNEMONICS: [(u8, PermissionSet); 9] = [
    (b'G', PermissionSet::GLOBAL),
    (b'S', PermissionSet::SUPERPAGE),
    (b'D', PermissionSet::DIRTY),
    (b'A', PermissionSet::ACCESSED),
    (b'C', PermissionSet::CACHE_DISABLED),
    (b'T', PermissionSet::WRITE_THROUGH),
    (b'U', PermissionSet::USER),
    (b'W', PermissionSet::WRITABLE),
    (b'P', PermissionSet::PRESENT),
];

const UNSET: u8 = b'-';

/// A rendered permission string: always nine ASCII characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PermissionString([u8; 9]);

impl PermissionString {
    pub fn as_str(&self) -> &str {
        // Every byte comes from MNEMONICS or UNSET, all of which are ASCII.
        core::str::from_utf8(&self.0).unwrap_or("?????????")
    }
}

impl fmt::Display for PermissionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for PermissionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PermissionString({:?})", self.as_str())
    }
}

impl From<PermissionSet> for PermissionString {
    fn from(permissions: PermissionSet) -> Self {
        encode(permissions.bits())
    }
}

/// Renders the low nine bits of `bits`.
///
/// Higher bits belong to the frame address or software and have no mnemonic; they are
/// dropped with a warning.
pub fn encode(bits: u32) -> PermissionString {
    if bits & !PermissionSet::MASK != 0 {
        log::warn!(
            "ignoring bits {:#x} outside the permission mask",
            bits & !PermissionSet::MASK
        );
    }

    let permissions = PermissionSet::from_entry(bits);
    let mut out = [UNSET; 9];
    for (slot, (mnemonic, flag)) in out.iter_mut().zip(MNEMONICS) {
        if permissions.contains(flag) {
            *slot = mnemonic;
        }
    }
    PermissionString(out)
}

/// Parses an operator-supplied permission string.
///
/// Characters may appear in any order and any number of times; `-` is accepted and
/// contributes nothing, so every string produced by [`encode`] parses. Mnemonics are
/// upper-case only. Present is always cleared from the result, as it is not the
/// operator's to grant or revoke.
///
/// # Errors
/// Returns [`MonitorError::InvalidPermissionToken`] for the first character that is not
/// a mnemonic or `-`.
pub fn decode(text: &str) -> Result<PermissionSet, MonitorError> {
    let mut permissions = PermissionSet::empty();
    for (position, token) in text.chars().enumerate() {
        if token == UNSET as char {
            continue;
        }
        let flag = MNEMONICS
            .iter()
            .find(|(mnemonic, _)| *mnemonic as char == token)
            .map(|(_, flag)| *flag)
            .ok_or(MonitorError::InvalidPermissionToken { token, position })?;
        permissions |= flag;
    }
    Ok(permissions.difference(PermissionSet::PRESENT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_examples() {
        assert_eq!(encode(0x003).as_str(), "-------WP");
        assert_eq!(encode(0x1E7).as_str(), "GSDA--UWP");
        assert_eq!(encode(0).as_str(), "---------");
        assert_eq!(encode(0x1FF).as_str(), "GSDACTUWP");
    }

    #[test]
    fn encode_masks_high_bits() {
        assert_eq!(encode(0x0012_3E03).as_str(), "-------WP");
    }

    #[test]
    fn encode_is_always_nine_known_characters() {
        for bits in 0..=PermissionSet::MASK {
            let text = encode(bits);
            assert_eq!(text.as_str().len(), 9);
            assert!(text.as_str().chars().all(|c| "GSDACTUWP-".contains(c)));
        }
    }

    #[test]
    fn round_trip_without_present() {
        for bits in 0..=PermissionSet::MASK {
            let permissions = PermissionSet::from_bits_truncate(bits);
            let expected = permissions.difference(PermissionSet::PRESENT);
            assert_eq!(decode(encode(bits).as_str()), Ok(expected));
        }
    }

    #[test]
    fn decode_any_order_and_repeats() {
        assert_eq!(
            decode("UWWU"),
            Ok(PermissionSet::USER | PermissionSet::WRITABLE)
        );
        assert_eq!(decode(""), Ok(PermissionSet::empty()));
    }

    #[test]
    fn decode_clears_present() {
        assert_eq!(decode("WP"), Ok(PermissionSet::WRITABLE));
        assert_eq!(decode("P"), Ok(PermissionSet::empty()));
    }

    #[test]
    fn decode_rejects_unknown_token() {
        assert_eq!(
            decode("WPZ"),
            Err(MonitorError::InvalidPermissionToken {
                token: 'Z',
                position: 2
            })
        );
    }

    #[test]
    fn decode_is_case_sensitive() {
        assert_eq!(
            decode("w"),
            Err(MonitorError::InvalidPermissionToken {
                token: 'w',
                position: 0
            })
        );
    }

    #[test]
    fn display_and_from() {
        let text = PermissionString::from(PermissionSet::USER | PermissionSet::PRESENT);
        assert_eq!(format!("{}", text), "------U-P");
        assert_eq!(format!("{:?}", text), "PermissionString(\"------U-P\")");
    }
}
