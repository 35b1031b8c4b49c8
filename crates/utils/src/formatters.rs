// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use core::fmt;

/// Formatter for byte blobs (public keys, signatures) that keeps log lines readable
pub fn hexf(data: &[u8], f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", truncate(hex_string(data)))
}

/// Short `0x1234..abcd` form used when logging keys and handles
pub fn short_hex(data: &[u8]) -> String {
    let s = hex_string(data);
    if s.len() <= 12 {
        return format!("0x{}", s);
    }
    format!("0x{}..{}", &s[..6], &s[s.len() - 4..])
}

fn hex_string(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

fn truncate(s: String) -> String {
    let threshold = 100;
    let limit = 50;
    let cutoff = limit / 2;
    if s.len() <= threshold {
        format!("0x{}", s)
    } else {
        let start = &s[..cutoff];
        let end = &s[s.len() - (limit - cutoff)..];
        format!("<bytes({}):0x{}..{}>", s.len() / 2, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Hex<'a>(&'a [u8]);

    impl fmt::Display for Hex<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            hexf(self.0, f)
        }
    }

    #[test]
    fn test_short_values_print_in_full() {
        assert_eq!(Hex(&[0xde, 0xad]).to_string(), "0xdead");
        assert_eq!(short_hex(&[0xbe, 0xef]), "0xbeef");
    }

    #[test]
    fn test_long_values_are_truncated() {
        let bytes = vec![0xab; 64];
        let printed = Hex(&bytes).to_string();
        assert!(printed.starts_with("<bytes(64):0xabab"));
        assert_eq!(short_hex(&bytes), "0xababab..abab");
    }
}
