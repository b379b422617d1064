/// Reversible byte obfuscation applied to every message on the wire.
///
/// Each output byte is the input byte XORed with the key byte at
/// `index mod key length`, so applying the transform twice with the same
/// key reproduces the original bytes. Output length always equals input
/// length. The key is fixed at process start and must be non-empty.
pub fn apply(data: &[u8], key: &[u8]) -> Vec<u8> {
    debug_assert!(!key.is_empty(), "obfuscation key must be non-empty");
    data.iter()
        .zip(key.iter().cycle())
        .map(|(byte, key_byte)| byte ^ key_byte)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_is_involutive() {
        let key = b"mysecretkey";
        let data = b"AUTH user pass123".to_vec();

        let encoded = apply(&data, key);
        let decoded = apply(&encoded, key);

        assert_eq!(decoded, data);
    }

    #[test]
    fn test_apply_preserves_length() {
        let key = b"k";
        for len in [0usize, 1, 17, 1024, 4096] {
            let data = vec![0xA7u8; len];
            assert_eq!(apply(&data, key).len(), len);
        }
    }

    #[test]
    fn test_apply_changes_bytes() {
        // A key with no zero bytes must change every byte.
        let key = b"mysecretkey";
        let data = b"DOWNLOAD notes.txt";

        let encoded = apply(data, key);

        assert_ne!(&encoded[..], &data[..]);
        assert!(encoded.iter().zip(data.iter()).all(|(e, d)| e != d));
    }

    #[test]
    fn test_apply_empty_input() {
        assert!(apply(&[], b"mysecretkey").is_empty());
    }

    #[test]
    fn test_apply_key_wraps_around() {
        // With a two-byte key, bytes alternate between the key bytes.
        let key = [0x0F, 0xF0];
        let data = [0u8; 4];

        let encoded = apply(&data, &key);

        assert_eq!(encoded, vec![0x0F, 0xF0, 0x0F, 0xF0]);
    }

    #[test]
    fn test_apply_arbitrary_binary_data() {
        let key = b"mysecretkey";
        let data: Vec<u8> = (0..=255).collect();

        let decoded = apply(&apply(&data, key), key);

        assert_eq!(decoded, data);
    }
}
