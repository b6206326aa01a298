use std::iter::repeat;

/// Key byte used for every position past the end of a table
pub const FALLBACK_KEY: u8 = 0x3C;

/// XOR `buf` against `key`, using [`FALLBACK_KEY`] past the end of `key`
pub fn decrypt(key: &[u8], buf: &[u8]) -> Vec<u8> {
    let key_iter = key.iter().chain(repeat(&FALLBACK_KEY));
    key_iter.zip(buf).map(|(key, i)| *i ^ key).collect()
}

/// Encrypt is the same as decrypt
pub fn encrypt(key: &[u8], buf: &[u8]) -> Vec<u8> {
    decrypt(key, buf)
}

/// Recover key bytes from an obfuscated body and its known plaintext
///
/// Only the overlapping prefix is recovered. Positions the plaintext does not cover are left
/// out rather than guessed.
pub fn extract_key(cipher: &[u8], plain: &[u8]) -> Vec<u8> {
    cipher.iter().zip(plain).map(|(c, p)| c ^ p).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOVE_KEY: [u8; 16] = [
        0x3C, 0x3C, 0x3C, 0x3C, 0x3C, 0x3C, 0x3C, 0x3C, 0xF9, 0x37, 0x58, 0x41, 0x3D, 0x72, 0x0E,
        0x3C,
    ];

    #[test]
    fn test_xor_crypto_roundtrip() {
        let zeros: [u8; 64] = [0; 64];

        let encrypted = encrypt(&MOVE_KEY, &zeros[..]);
        let decrypted = decrypt(&MOVE_KEY, &encrypted[..]);
        assert_eq!(decrypted, &zeros[..]);
    }

    #[test]
    fn test_fallback_past_key() {
        let encrypted = encrypt(&[0x01, 0x02], &[0x00; 5]);
        assert_eq!(encrypted, vec![0x01, 0x02, 0x3C, 0x3C, 0x3C]);
    }

    #[test]
    fn test_extract_key() {
        // Body of a movement packet and its known plaintext
        let cipher = [
            0x3C, 0x3C, 0x3C, 0x3C, 0x3C, 0x3C, 0x3C, 0x3C, 0x3C, 0x3C, 0x3F, 0x41, 0x3E, 0x72,
            0x58, 0x3C, 0x3C, 0x6C, 0x3D, 0x52, 0x3C, 0x3C,
        ];
        let plain = [
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC5, 0x0B, 0x67, 0x00, 0x03, 0x00,
            0x56, 0x00,
        ];

        let key = extract_key(&cipher, &plain);
        assert_eq!(key, MOVE_KEY.to_vec());
    }

    #[test]
    fn test_extract_key_longer_plaintext() {
        let key = extract_key(&[0xAA, 0xBB], &[0x0F, 0x0F, 0x0F]);
        assert_eq!(key, vec![0xA5, 0xB4]);
    }
}
