use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// The only challenge transformation we emit (RFC 7636 S256).
pub const CHALLENGE_METHOD: &str = "S256";

/// PKCE verifier/challenge pair for one authorization attempt.
///
/// Single-use: the pair is discarded once the matching callback has been
/// consumed, whatever the outcome.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// Secret half, sent only in the token exchange as `code_verifier`.
    pub verifier: String,
    /// Public half, sent in the authorization URL as `code_challenge`.
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a fresh pair from 32 bytes of OS entropy.
    ///
    /// The verifier is the base64url encoding without padding (43 chars);
    /// the challenge is the same encoding of its SHA-256 digest.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = Self::challenge_for(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    /// S256 challenge for a given verifier.
    pub fn challenge_for(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }
}
