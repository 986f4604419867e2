use crate::{Generator, GeneratorError};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use harsh::Harsh;
use sha2::{Digest, Sha256};
use tinylink_core::ShortCode;
use typed_builder::TypedBuilder;

pub const DEFAULT_SALT: &str = "tinylink";
pub const DEFAULT_CODE_LENGTH: usize = 7;
pub const DEFAULT_DIGEST_BYTES: usize = 4;

const DIGEST_LEN: usize = 32;
const MIN_CODE_LENGTH: usize = 3;
const MAX_CODE_LENGTH: usize = 32;

#[derive(Clone, TypedBuilder)]
pub struct GeneratorSettings {
    /// Secret salt for the hashids alphabet shuffle.
    #[builder(default = DEFAULT_SALT.to_string(), setter(into))]
    pub salt: String,
    /// Target code length; also the hashids minimum length.
    #[builder(default = DEFAULT_CODE_LENGTH)]
    pub length: usize,
    /// How many leading digest bytes are fed to hashids.
    #[builder(default = DEFAULT_DIGEST_BYTES)]
    pub digest_bytes: usize,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for GeneratorSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorSettings")
            .field("salt", &"<redacted>")
            .field("length", &self.length)
            .field("digest_bytes", &self.digest_bytes)
            .finish()
    }
}

/// Deterministic, digest-based short code generator.
///
/// A candidate is derived in three steps:
///
/// 1. SHA-256 of `"{original_url}-{attempt}"`, so each attempt lands
///    somewhere else in the code space.
/// 2. The leading `digest_bytes` bytes, each as one small integer, are
///    encoded with hashids using the secret salt and `length` as the
///    minimum output length.
/// 3. If hashids produces more than `length` characters, the URL-safe
///    base64 form of the full digest, truncated to `length`, is used instead.
///
/// Both encodings only emit `[A-Za-z0-9_-]`.
pub struct HashidsGenerator {
    harsh: Harsh,
    length: usize,
    digest_bytes: usize,
}

impl HashidsGenerator {
    pub fn new(settings: GeneratorSettings) -> Result<Self, GeneratorError> {
        if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&settings.length) {
            return Err(GeneratorError::InvalidSettings(format!(
                "length must be between {} and {}, got {}",
                MIN_CODE_LENGTH, MAX_CODE_LENGTH, settings.length
            )));
        }
        if !(1..=DIGEST_LEN).contains(&settings.digest_bytes) {
            return Err(GeneratorError::InvalidSettings(format!(
                "digest_bytes must be between 1 and {}, got {}",
                DIGEST_LEN, settings.digest_bytes
            )));
        }

        let harsh = Harsh::builder()
            .salt(settings.salt)
            .length(settings.length)
            .build()
            .map_err(|e| GeneratorError::InvalidSettings(format!("hashids: {e}")))?;

        Ok(Self {
            harsh,
            length: settings.length,
            digest_bytes: settings.digest_bytes,
        })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// SHA-256 of the URL salted with the attempt index.
    pub fn digest(original_url: &str, attempt: u32) -> [u8; DIGEST_LEN] {
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&Sha256::digest(format!("{original_url}-{attempt}").as_bytes()));
        digest
    }

    fn encode(&self, digest: &[u8; DIGEST_LEN]) -> String {
        let numbers: Vec<u64> = digest[..self.digest_bytes]
            .iter()
            .map(|&byte| u64::from(byte))
            .collect();

        let encoded = self.harsh.encode(&numbers);
        if encoded.len() <= self.length {
            return encoded;
        }

        let mut fallback = URL_SAFE_NO_PAD.encode(digest);
        fallback.truncate(self.length);
        fallback
    }
}

impl std::fmt::Debug for HashidsGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashidsGenerator")
            .field("length", &self.length)
            .field("digest_bytes", &self.digest_bytes)
            .finish_non_exhaustive()
    }
}

impl Generator for HashidsGenerator {
    fn candidate(&self, original_url: &str, attempt: u32) -> ShortCode {
        let digest = Self::digest(original_url, attempt);
        ShortCode::new_unchecked(self.encode(&digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com/a/very/long/path";

    fn default_generator() -> HashidsGenerator {
        HashidsGenerator::new(GeneratorSettings::default()).unwrap()
    }

    fn is_url_safe(code: &str) -> bool {
        code.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    #[test]
    fn same_url_and_attempt_yield_same_code() {
        let generator = default_generator();

        let first = generator.candidate(URL, 0);
        let second = generator.candidate(URL, 0);

        assert_eq!(first, second);
    }

    #[test]
    fn independent_generators_with_same_settings_agree() {
        let a = HashidsGenerator::new(GeneratorSettings::default()).unwrap();
        let b = HashidsGenerator::new(GeneratorSettings::default()).unwrap();

        assert_eq!(a.candidate(URL, 3), b.candidate(URL, 3));
    }

    #[test]
    fn attempts_act_as_salt() {
        let generator = default_generator();

        let codes: std::collections::HashSet<_> =
            (0..10).map(|attempt| generator.candidate(URL, attempt)).collect();

        assert_eq!(codes.len(), 10);
    }

    #[test]
    fn codes_have_target_length_and_url_safe_alphabet() {
        let generator = default_generator();

        for i in 0..200 {
            let url = format!("https://example.com/page/{i}");
            let code = generator.candidate(&url, 0);
            assert_eq!(code.as_str().len(), DEFAULT_CODE_LENGTH, "code {code}");
            assert!(is_url_safe(code.as_str()), "code {code}");
            assert!(ShortCode::new(code.as_str()).is_ok());
        }
    }

    #[test]
    fn single_byte_uses_reversible_hashids_encoding() {
        let settings = GeneratorSettings::builder()
            .salt("secret")
            .digest_bytes(1)
            .build();
        let generator = HashidsGenerator::new(settings).unwrap();

        let code = generator.candidate(URL, 0);
        assert_eq!(code.as_str().len(), DEFAULT_CODE_LENGTH);

        let harsh = Harsh::builder()
            .salt("secret")
            .length(DEFAULT_CODE_LENGTH)
            .build()
            .unwrap();
        let decoded = harsh.decode(code.as_str()).unwrap();
        let digest = HashidsGenerator::digest(URL, 0);
        assert_eq!(decoded, vec![u64::from(digest[0])]);
    }

    #[test]
    fn oversized_hashids_falls_back_to_base64_prefix() {
        // Eight numbers cannot fit in seven hashids characters.
        let settings = GeneratorSettings::builder().digest_bytes(8).build();
        let generator = HashidsGenerator::new(settings).unwrap();

        let code = generator.candidate(URL, 1);

        let digest = HashidsGenerator::digest(URL, 1);
        let expected = &URL_SAFE_NO_PAD.encode(digest)[..DEFAULT_CODE_LENGTH];
        assert_eq!(code.as_str(), expected);
    }

    #[test]
    fn salt_changes_hashids_codes() {
        let a = HashidsGenerator::new(
            GeneratorSettings::builder().salt("one").digest_bytes(1).build(),
        )
        .unwrap();
        let b = HashidsGenerator::new(
            GeneratorSettings::builder().salt("two").digest_bytes(1).build(),
        )
        .unwrap();

        let differing = (0..20)
            .filter(|&attempt| a.candidate(URL, attempt) != b.candidate(URL, attempt))
            .count();
        assert!(differing > 0);
    }

    #[test]
    fn rejects_invalid_settings() {
        for length in [0, 2, 33] {
            let settings = GeneratorSettings::builder().length(length).build();
            assert!(matches!(
                HashidsGenerator::new(settings),
                Err(GeneratorError::InvalidSettings(_))
            ));
        }

        for digest_bytes in [0, 33] {
            let settings = GeneratorSettings::builder().digest_bytes(digest_bytes).build();
            assert!(matches!(
                HashidsGenerator::new(settings),
                Err(GeneratorError::InvalidSettings(_))
            ));
        }
    }

    #[test]
    fn debug_output_hides_salt() {
        let settings = GeneratorSettings::builder().salt("top-secret").build();
        assert!(!format!("{settings:?}").contains("top-secret"));
    }
}
