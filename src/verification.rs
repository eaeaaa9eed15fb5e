//! Verification-code generation for issued certificates.

use rand::Rng;

/// 32-symbol alphabet with visually ambiguous glyphs (I, O, 0, 1) excluded so
/// codes survive being read over the phone or typed from paper.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const CODE_LENGTH: usize = 8;

/// Generates an 8-character code, each character drawn uniformly from
/// [`ALPHABET`]. Global uniqueness is not guaranteed here; the certificates
/// table carries a unique constraint and issuance retries with a fresh code
/// on collision.
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphabet_excludes_ambiguous_glyphs() {
        assert_eq!(ALPHABET.len(), 32);
        for forbidden in [b'I', b'O', b'0', b'1'] {
            assert!(!ALPHABET.contains(&forbidden));
        }
    }

    #[test]
    fn generated_codes_match_alphabet_and_length() {
        for _ in 0..1000 {
            let code = generate();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn codes_are_uppercase_alphanumeric_only() {
        for _ in 0..100 {
            let code = generate();
            assert!(
                code.chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            );
        }
    }
}
