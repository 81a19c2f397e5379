//! One-time passcode generation and verification.
//!
//! Codes are six uniformly random digits. Only `sha256(code)` is ever
//! persisted; the plaintext goes out of band and is never logged.
//!
//! `verify` applies its checks and the corresponding mutation to the loaded
//! snapshot the caller holds; persisting that snapshot with one
//! compare-and-update is what keeps concurrent attempts from both winning.

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, rngs::OsRng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::account::{OtpContext, VerificationState};

pub(crate) const CODE_MIN: u32 = 100_000;
pub(crate) const CODE_MAX: u32 = 999_999;

/// Why a candidate code was rejected. Surfaced untranslated as the
/// user-facing error code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OtpRejection {
    /// No pending challenge on the account.
    NotFound,
    /// Attempt ceiling reached; only a fresh code resets it.
    TooManyAttempts,
    Expired,
    Mismatch,
}

/// Draw a uniformly random six-digit code.
#[must_use]
pub fn generate_code() -> String {
    OsRng.gen_range(CODE_MIN..=CODE_MAX).to_string()
}

/// Hash a code for storage; raw codes never touch the store.
#[must_use]
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Issue a fresh challenge on the snapshot, replacing any pending one and
/// resetting the attempt counter. Returns the plaintext for out-of-band
/// delivery only.
pub fn issue(
    verification: &mut VerificationState,
    context: OtpContext,
    now: DateTime<Utc>,
    ttl: Duration,
) -> String {
    let code = generate_code();
    verification.otp_hash = Some(hash_code(&code));
    verification.otp_expires_at = Some(now + ttl);
    verification.otp_attempts = 0;
    verification.otp_context = Some(context);
    code
}

/// Check a candidate against the pending challenge.
///
/// On a match the challenge fields are cleared and the consumed context is
/// returned; on a mismatch the attempt counter on the snapshot is
/// incremented and the caller must persist it before reporting the failure.
pub fn verify(
    verification: &mut VerificationState,
    candidate: &str,
    now: DateTime<Utc>,
    max_attempts: u32,
) -> Result<OtpContext, OtpRejection> {
    let Some(stored_hash) = verification.otp_hash.clone() else {
        return Err(OtpRejection::NotFound);
    };
    // Checked before expiry: an exhausted challenge stays exhausted.
    if verification.otp_attempts >= max_attempts {
        return Err(OtpRejection::TooManyAttempts);
    }
    match verification.otp_expires_at {
        Some(expires_at) if now <= expires_at => {}
        _ => return Err(OtpRejection::Expired),
    }

    let candidate_hash = hash_code(candidate.trim());
    if bool::from(candidate_hash.as_bytes().ct_eq(stored_hash.as_bytes())) {
        let context = verification
            .otp_context
            .take()
            .unwrap_or(OtpContext::Registration);
        verification.otp_hash = None;
        verification.otp_expires_at = None;
        verification.otp_attempts = 0;
        Ok(context)
    } else {
        verification.otp_attempts += 1;
        Err(OtpRejection::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL_SECONDS: i64 = 600;
    const MAX_ATTEMPTS: u32 = 5;

    fn ttl() -> Duration {
        Duration::seconds(TTL_SECONDS)
    }

    fn challenged() -> (VerificationState, String, DateTime<Utc>) {
        let mut verification = VerificationState::default();
        let now = Utc::now();
        let code = issue(&mut verification, OtpContext::Login, now, ttl());
        (verification, code, now)
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..256 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().expect("numeric code");
            assert!((CODE_MIN..=CODE_MAX).contains(&value));
        }
    }

    #[test]
    fn issue_stores_hash_not_plaintext() {
        let (verification, code, now) = challenged();
        assert_ne!(verification.otp_hash.as_deref(), Some(code.as_str()));
        assert_eq!(verification.otp_hash, Some(hash_code(&code)));
        assert_eq!(verification.otp_attempts, 0);
        assert_eq!(verification.otp_expires_at, Some(now + ttl()));
        assert_eq!(verification.otp_context, Some(OtpContext::Login));
    }

    #[test]
    fn correct_code_consumes_challenge() {
        let (mut verification, code, now) = challenged();
        let context = verify(&mut verification, &code, now, MAX_ATTEMPTS).expect("valid code");
        assert_eq!(context, OtpContext::Login);
        assert!(!verification.has_pending_challenge());
        assert!(verification.otp_expires_at.is_none());
        assert_eq!(verification.otp_attempts, 0);

        // The challenge is gone; a second try finds nothing to consume.
        assert_eq!(
            verify(&mut verification, &code, now, MAX_ATTEMPTS),
            Err(OtpRejection::NotFound)
        );
    }

    #[test]
    fn mismatch_increments_attempts() {
        let (mut verification, _code, now) = challenged();
        assert_eq!(
            verify(&mut verification, "000000", now, MAX_ATTEMPTS),
            Err(OtpRejection::Mismatch)
        );
        assert_eq!(verification.otp_attempts, 1);
        assert!(verification.has_pending_challenge());
    }

    #[test]
    fn sixth_attempt_fails_even_with_correct_code() {
        let (mut verification, code, now) = challenged();
        for _ in 0..MAX_ATTEMPTS {
            assert_eq!(
                verify(&mut verification, "000000", now, MAX_ATTEMPTS),
                Err(OtpRejection::Mismatch)
            );
        }
        assert_eq!(verification.otp_attempts, MAX_ATTEMPTS);
        // Exhausted: the correct code no longer gets through, and the
        // counter is not reset by the check itself.
        assert_eq!(
            verify(&mut verification, &code, now, MAX_ATTEMPTS),
            Err(OtpRejection::TooManyAttempts)
        );
        assert_eq!(verification.otp_attempts, MAX_ATTEMPTS);
    }

    #[test]
    fn reissue_resets_attempts() {
        let (mut verification, _code, now) = challenged();
        for _ in 0..MAX_ATTEMPTS {
            let _ = verify(&mut verification, "000000", now, MAX_ATTEMPTS);
        }
        let fresh = issue(&mut verification, OtpContext::Login, now, ttl());
        assert_eq!(verification.otp_attempts, 0);
        assert!(verify(&mut verification, &fresh, now, MAX_ATTEMPTS).is_ok());
    }

    #[test]
    fn expired_code_rejected_even_if_correct() {
        let (mut verification, code, now) = challenged();
        let later = now + ttl() + Duration::seconds(1);
        assert_eq!(
            verify(&mut verification, &code, later, MAX_ATTEMPTS),
            Err(OtpRejection::Expired)
        );
        // Expiry is a rejection, not a consumption.
        assert!(verification.has_pending_challenge());
    }

    #[test]
    fn candidate_is_trimmed_before_compare() {
        let (mut verification, code, now) = challenged();
        let padded = format!("  {code} ");
        assert!(verify(&mut verification, &padded, now, MAX_ATTEMPTS).is_ok());
    }
}
