//! On-disk vault container format.
//!
//! A vault file is a single line of printable text:
//!
//! ```text
//! base64( version ‖ 16-byte IV ‖ ciphertext ‖ 32-byte tag ) + "\n"
//! ```
//!
//! The trailing newline keeps version-control diffs clean. Unknown format
//! versions are rejected, not guessed at, which leaves room for format
//! evolution without breaking old vaults.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use vaultsync_common::{Error, Result};
use vaultsync_crypto::{VaultRecord, FORMAT_VERSION, IV_LENGTH, TAG_LENGTH};

/// Smallest possible frame: version byte + IV + tag (empty ciphertext).
pub const MIN_FRAME_LENGTH: usize = 1 + IV_LENGTH + TAG_LENGTH;

/// Serialize a record into the printable vault container.
pub fn serialize(record: &VaultRecord) -> String {
    let mut frame = Vec::with_capacity(1 + IV_LENGTH + record.ciphertext.len() + TAG_LENGTH);
    frame.push(record.version);
    frame.extend_from_slice(&record.iv);
    frame.extend_from_slice(&record.ciphertext);
    frame.extend_from_slice(&record.tag);

    let mut text = STANDARD.encode(frame);
    text.push('\n');
    text
}

/// Parse a vault container back into a record.
///
/// # Errors
/// - `InvalidVaultFormat` if the base64 decoding fails, the frame is
///   shorter than [`MIN_FRAME_LENGTH`], or the version byte is unrecognized
pub fn deserialize(text: &str) -> Result<VaultRecord> {
    let frame = STANDARD
        .decode(text.trim_end())
        .map_err(|e| Error::InvalidVaultFormat(format!("base64 decode failed: {e}")))?;

    if frame.len() < MIN_FRAME_LENGTH {
        return Err(Error::InvalidVaultFormat(format!(
            "frame too short: {} bytes (minimum {MIN_FRAME_LENGTH})",
            frame.len()
        )));
    }

    let version = frame[0];
    if version != FORMAT_VERSION {
        return Err(Error::InvalidVaultFormat(format!(
            "unrecognized format version {version:#04x}"
        )));
    }

    let mut iv = [0u8; IV_LENGTH];
    iv.copy_from_slice(&frame[1..1 + IV_LENGTH]);

    let tag_start = frame.len() - TAG_LENGTH;
    let mut tag = [0u8; TAG_LENGTH];
    tag.copy_from_slice(&frame[tag_start..]);

    Ok(VaultRecord {
        version,
        iv,
        ciphertext: frame[1 + IV_LENGTH..tag_start].to_vec(),
        tag,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultsync_crypto::{derive_subkeys, encrypt, KeyMaterial};

    fn sample_record() -> VaultRecord {
        let material = KeyMaterial::from_bytes(vec![5u8; 32]).unwrap();
        let keys = derive_subkeys(&material).unwrap();
        encrypt(&keys, b"API_KEY=abc123").unwrap()
    }

    #[test]
    fn test_serialize_is_printable_with_trailing_newline() {
        let text = serialize(&sample_record());
        assert!(text.ends_with('\n'));
        assert!(text.trim_end().chars().all(|c| c.is_ascii_graphic()));
        // version + IV + one block + tag comes out well past 80 base64 chars
        assert!(text.len() > 80);
    }

    #[test]
    fn test_round_trip() {
        let record = sample_record();
        let parsed = deserialize(&serialize(&record)).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_known_key_scenario() {
        use vaultsync_crypto::decrypt;

        let key_a = KeyMaterial::from_hex(&"a".repeat(64)).unwrap();
        let keys_a = derive_subkeys(&key_a).unwrap();
        let text = serialize(&encrypt(&keys_a, b"API_KEY=abc123").unwrap());
        assert!(text.trim_end().len() > 80);

        let record = deserialize(&text).unwrap();
        assert_eq!(decrypt(&keys_a, &record).unwrap(), b"API_KEY=abc123");

        let key_b = KeyMaterial::from_hex(&"b".repeat(64)).unwrap();
        let keys_b = derive_subkeys(&key_b).unwrap();
        assert!(decrypt(&keys_b, &record).is_err());
    }

    #[test]
    fn test_rejects_invalid_base64() {
        let err = deserialize("not-base64!!!\n").unwrap_err();
        assert!(matches!(err, Error::InvalidVaultFormat(_)));
    }

    #[test]
    fn test_rejects_truncated_frame() {
        let short = STANDARD.encode([FORMAT_VERSION; 10]);
        let err = deserialize(&short).unwrap_err();
        assert!(matches!(err, Error::InvalidVaultFormat(_)));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut record = sample_record();
        record.version = 0x7f;
        let err = deserialize(&serialize(&record)).unwrap_err();
        assert!(matches!(err, Error::InvalidVaultFormat(_)));
    }
}
