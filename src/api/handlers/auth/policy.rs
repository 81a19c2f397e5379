//! The session policy engine.
//!
//! One state machine per account: `UNVERIFIED` → `CHALLENGED(context)` →
//! `VERIFIED`, with `last_otp_verified_at` deciding whether a token refresh
//! may stay silent. Every mutation loads one snapshot, applies the change,
//! and persists it with a single compare-and-update; a version conflict
//! means a concurrent request won and the flow reloads.
//!
//! Collaborators (store, codec, dispatcher) are injected so the engine runs
//! against fakes in tests.

use anyhow::anyhow;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::api::notify::{Dispatcher, OutboundKind, OutboundMessage};

use super::account::{Account, OtpContext, Role};
use super::error::AuthError;
use super::hashing;
use super::otp::{self, OtpRejection};
use super::state::AuthConfig;
use super::store::{CredentialStore, InsertOutcome, UpdateOutcome};
use super::token::{TokenCodec, TokenType, TokenVerdict};
use super::types::{
    LoginData, LoginRequest, RegisterData, RegisterRequest, SessionData, TokenPairData,
    UserProfile,
};
use super::utils::{
    build_reset_url, generate_reset_token, hash_reset_token, normalize_email, valid_email,
};

/// Reload attempts before a contended flow gives up. Two concurrent writers
/// settle on the first retry; more contention than that on a single account
/// means something is wrong.
const MAX_UPDATE_RETRIES: usize = 3;

/// Outcome of a refresh attempt: either a fresh pair, or a forced
/// re-verification challenge for sessions without remember-me.
#[derive(Debug)]
pub enum RefreshOutcome {
    Refreshed(TokenPairData),
    ReverificationRequired { email: String },
}

pub struct SessionPolicy {
    config: AuthConfig,
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
    dispatcher: Dispatcher,
}

impl SessionPolicy {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn CredentialStore>,
        codec: TokenCodec,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            config,
            store,
            codec,
            dispatcher,
        }
    }

    pub(crate) fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    /// Create an unverified account and open a registration challenge.
    /// No tokens are issued until the code is confirmed.
    ///
    /// # Errors
    /// Returns a validation error for malformed input or a taken email.
    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterData, AuthError> {
        let email = request.email.trim().to_string();
        let email_normalized = normalize_email(&email);
        if !valid_email(&email_normalized) {
            return Err(AuthError::Validation("Invalid email address".to_string()));
        }

        let first_name = request.first_name.trim().to_string();
        let last_name = request.last_name.trim().to_string();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(AuthError::Validation(
                "First and last name are required".to_string(),
            ));
        }

        let role = match request.role.as_deref() {
            None => Role::User,
            Some(value) => Role::parse_registerable(value)
                .ok_or_else(|| AuthError::Validation("Invalid role".to_string()))?,
        };

        hashing::validate_password_strength(&request.password).map_err(AuthError::Validation)?;
        let password_hash = hashing::hash_password(&request.password)
            .await
            .map_err(AuthError::internal)?;

        let now = Utc::now();
        let mut account = Account::new(
            email,
            email_normalized,
            password_hash,
            role,
            first_name,
            last_name,
            now,
        );
        let code = otp::issue(
            &mut account.verification,
            OtpContext::Registration,
            now,
            self.config.otp_ttl(),
        );

        match self
            .store
            .insert(&account)
            .await
            .map_err(AuthError::internal)?
        {
            InsertOutcome::Created => {
                info!(
                    target: "audit",
                    user_id = %account.id,
                    role = account.role.as_str(),
                    event = "registration",
                    "account registered, verification pending"
                );
                self.dispatcher
                    .dispatch(OutboundMessage {
                        to_email: account.email.clone(),
                        kind: OutboundKind::OtpCode {
                            context: OtpContext::Registration,
                            code,
                        },
                    })
                    .await;
                Ok(RegisterData {
                    email: account.email,
                    requires_verification: true,
                })
            }
            InsertOutcome::Conflict => Err(AuthError::Validation(
                "An account with this email already exists".to_string(),
            )),
        }
    }

    /// Check the password and, if correct, open a fresh challenge. Tokens
    /// are only minted once the code is confirmed. Unknown email and wrong
    /// password are indistinguishable to the caller.
    ///
    /// # Errors
    /// `INVALID_CREDENTIALS` or `ACCOUNT_DEACTIVATED`.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginData, AuthError> {
        let email_normalized = normalize_email(&request.email);
        let remember_me = request.remember_me.unwrap_or(false);

        for _ in 0..MAX_UPDATE_RETRIES {
            let Some(mut account) = self
                .store
                .find_by_email(&email_normalized)
                .await
                .map_err(AuthError::internal)?
            else {
                return Err(AuthError::InvalidCredentials);
            };
            if !account.is_active {
                return Err(AuthError::AccountDeactivated);
            }
            // Failed password checks never issue a code.
            if !hashing::verify_password(&account.password_hash, &request.password).await {
                return Err(AuthError::InvalidCredentials);
            }

            let now = Utc::now();
            let context = if account.verification.email_verified {
                OtpContext::Login
            } else {
                // First login before verification doubles as registration
                // completion.
                OtpContext::Registration
            };
            account.remember_me = remember_me;
            let code = otp::issue(&mut account.verification, context, now, self.config.otp_ttl());

            match self
                .store
                .compare_and_update(&account)
                .await
                .map_err(AuthError::internal)?
            {
                UpdateOutcome::Updated => {
                    self.dispatcher
                        .dispatch(OutboundMessage {
                            to_email: account.email.clone(),
                            kind: OutboundKind::OtpCode { context, code },
                        })
                        .await;
                    return Ok(LoginData {
                        email: account.email,
                        requires_verification: true,
                        is_login_verification: context == OtpContext::Login,
                    });
                }
                UpdateOutcome::Conflict => continue,
                UpdateOutcome::Missing => return Err(AuthError::InvalidCredentials),
            }
        }
        Err(AuthError::internal(anyhow!(
            "persistent update contention during login"
        )))
    }

    /// Confirm a registration/login challenge and mint the session.
    ///
    /// # Errors
    /// Surfaces the verifier's rejection reason untranslated.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<SessionData, AuthError> {
        let (account, context) = self.consume_challenge(email, code).await?;
        match context {
            OtpContext::Login => {
                info!(
                    target: "audit",
                    user_id = %account.id,
                    event = "login",
                    "login verified"
                );
                self.dispatcher
                    .dispatch(OutboundMessage {
                        to_email: account.email.clone(),
                        kind: OutboundKind::LoginAlert,
                    })
                    .await;
            }
            OtpContext::Registration => {
                info!(
                    target: "audit",
                    user_id = %account.id,
                    event = "registration_verified",
                    "registration verified"
                );
                // The welcome email goes out once, on registration
                // completion; login confirmations never resend it.
                self.dispatcher
                    .dispatch(OutboundMessage {
                        to_email: account.email.clone(),
                        kind: OutboundKind::Welcome {
                            first_name: account.first_name.clone(),
                        },
                    })
                    .await;
            }
            OtpContext::Reverify => {}
        }
        self.issue_session(&account)
    }

    /// Consume a `reverify` challenge after a stale refresh. No welcome or
    /// login notifications.
    ///
    /// # Errors
    /// Surfaces the verifier's rejection reason untranslated.
    pub async fn reverify_otp(&self, email: &str, code: &str) -> Result<SessionData, AuthError> {
        let (account, _context) = self.consume_challenge(email, code).await?;
        self.issue_session(&account)
    }

    /// Re-issue a code for whatever challenge applies. Always succeeds from
    /// the caller's point of view so accounts cannot be enumerated.
    ///
    /// # Errors
    /// Only on internal failures.
    pub async fn resend_otp(&self, email: &str) -> Result<(), AuthError> {
        let email_normalized = normalize_email(email);
        if !valid_email(&email_normalized) {
            return Ok(());
        }

        for _ in 0..MAX_UPDATE_RETRIES {
            let Some(mut account) = self
                .store
                .find_by_email(&email_normalized)
                .await
                .map_err(AuthError::internal)?
            else {
                return Ok(());
            };
            if !account.is_active {
                return Ok(());
            }

            let now = Utc::now();
            let context = account.verification.otp_context.unwrap_or(
                if account.verification.email_verified {
                    OtpContext::Login
                } else {
                    OtpContext::Registration
                },
            );
            let code = otp::issue(&mut account.verification, context, now, self.config.otp_ttl());

            match self
                .store
                .compare_and_update(&account)
                .await
                .map_err(AuthError::internal)?
            {
                UpdateOutcome::Updated => {
                    self.dispatcher
                        .dispatch(OutboundMessage {
                            to_email: account.email.clone(),
                            kind: OutboundKind::OtpCode { context, code },
                        })
                        .await;
                    return Ok(());
                }
                UpdateOutcome::Conflict => continue,
                UpdateOutcome::Missing => return Ok(()),
            }
        }
        Ok(())
    }

    /// Exchange a refresh token for a new pair, or force a re-verification
    /// challenge when the session never opted into remember-me and the last
    /// verified moment is too old. This bounds the exposure window of a
    /// stolen refresh token.
    ///
    /// # Errors
    /// `INVALID_TOKEN`, `TOKEN_EXPIRED`, or `ACCOUNT_DEACTIVATED`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshOutcome, AuthError> {
        let claims = match self.codec.verify(refresh_token) {
            TokenVerdict::Valid(claims) => claims,
            TokenVerdict::Expired => return Err(AuthError::TokenExpired),
            TokenVerdict::Invalid => return Err(AuthError::InvalidToken),
        };
        if claims.token_type != TokenType::Refresh {
            return Err(AuthError::InvalidToken);
        }

        for _ in 0..MAX_UPDATE_RETRIES {
            let Some(mut account) = self
                .store
                .find_by_id(claims.sub)
                .await
                .map_err(AuthError::internal)?
            else {
                return Err(AuthError::InvalidToken);
            };
            if !account.is_active {
                return Err(AuthError::AccountDeactivated);
            }

            let now = Utc::now();
            let stale = account
                .last_otp_verified_at
                .is_none_or(|at| now - at > self.config.reverify_after());
            if account.remember_me || !stale {
                return Ok(RefreshOutcome::Refreshed(self.mint_pair(&account)?));
            }

            let code = otp::issue(
                &mut account.verification,
                OtpContext::Reverify,
                now,
                self.config.otp_ttl(),
            );
            match self
                .store
                .compare_and_update(&account)
                .await
                .map_err(AuthError::internal)?
            {
                UpdateOutcome::Updated => {
                    self.dispatcher
                        .dispatch(OutboundMessage {
                            to_email: account.email.clone(),
                            kind: OutboundKind::OtpCode {
                                context: OtpContext::Reverify,
                                code,
                            },
                        })
                        .await;
                    return Ok(RefreshOutcome::ReverificationRequired {
                        email: account.email,
                    });
                }
                UpdateOutcome::Conflict => continue,
                UpdateOutcome::Missing => return Err(AuthError::InvalidToken),
            }
        }
        Err(AuthError::internal(anyhow!(
            "persistent update contention during refresh"
        )))
    }

    /// Start a password reset. The response is identical whether or not the
    /// email matches an account.
    ///
    /// # Errors
    /// Only on internal failures.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let email_normalized = normalize_email(email);
        if !valid_email(&email_normalized) {
            return Ok(());
        }

        for _ in 0..MAX_UPDATE_RETRIES {
            let Some(mut account) = self
                .store
                .find_by_email(&email_normalized)
                .await
                .map_err(AuthError::internal)?
            else {
                return Ok(());
            };
            if !account.is_active {
                return Ok(());
            }

            let now = Utc::now();
            let token = generate_reset_token().map_err(AuthError::internal)?;
            // A newer request supersedes any outstanding token.
            account.password_reset.token_hash = Some(hash_reset_token(&token));
            account.password_reset.expires_at = Some(now + self.config.reset_token_ttl());

            match self
                .store
                .compare_and_update(&account)
                .await
                .map_err(AuthError::internal)?
            {
                UpdateOutcome::Updated => {
                    self.dispatcher
                        .dispatch(OutboundMessage {
                            to_email: account.email.clone(),
                            kind: OutboundKind::PasswordReset {
                                reset_url: build_reset_url(
                                    self.config.frontend_base_url(),
                                    &token,
                                ),
                            },
                        })
                        .await;
                    return Ok(());
                }
                UpdateOutcome::Conflict => continue,
                UpdateOutcome::Missing => return Ok(()),
            }
        }
        Ok(())
    }

    /// Consume a reset token and replace the password hash in the same
    /// write.
    ///
    /// # Errors
    /// `INVALID_TOKEN`, `TOKEN_EXPIRED`, or a validation error for a weak
    /// password.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        hashing::validate_password_strength(password).map_err(AuthError::Validation)?;

        let token_hash = hash_reset_token(token);
        for _ in 0..MAX_UPDATE_RETRIES {
            let Some(mut account) = self
                .store
                .find_by_reset_token(&token_hash)
                .await
                .map_err(AuthError::internal)?
            else {
                return Err(AuthError::InvalidToken);
            };

            let now = Utc::now();
            let expired = account.password_reset.expires_at.is_none_or(|at| now > at);
            if expired {
                return Err(AuthError::TokenExpired);
            }

            account.password_hash = hashing::hash_password(password)
                .await
                .map_err(AuthError::internal)?;
            account.password_reset.clear();

            match self
                .store
                .compare_and_update(&account)
                .await
                .map_err(AuthError::internal)?
            {
                UpdateOutcome::Updated => {
                    info!(
                        target: "audit",
                        user_id = %account.id,
                        event = "password_reset",
                        "password reset completed"
                    );
                    self.dispatcher
                        .dispatch(OutboundMessage {
                            to_email: account.email.clone(),
                            kind: OutboundKind::PasswordChanged,
                        })
                        .await;
                    return Ok(());
                }
                UpdateOutcome::Conflict => continue,
                UpdateOutcome::Missing => return Err(AuthError::InvalidToken),
            }
        }
        Err(AuthError::internal(anyhow!(
            "persistent update contention during password reset"
        )))
    }

    /// Confirm the caller's password (step-up checks on sensitive actions).
    ///
    /// # Errors
    /// `INVALID_PASSWORD` on mismatch.
    pub async fn verify_password(&self, account: &Account, password: &str) -> Result<(), AuthError> {
        if hashing::verify_password(&account.password_hash, password).await {
            Ok(())
        } else {
            Err(AuthError::InvalidPassword)
        }
    }

    /// Replace the password after confirming the current one. Outstanding
    /// reset tokens die with the change.
    ///
    /// # Errors
    /// `INVALID_PASSWORD` when the current password does not match.
    pub async fn change_password(
        &self,
        account_id: uuid::Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        hashing::validate_password_strength(new_password).map_err(AuthError::Validation)?;

        for _ in 0..MAX_UPDATE_RETRIES {
            let Some(mut account) = self
                .store
                .find_by_id(account_id)
                .await
                .map_err(AuthError::internal)?
            else {
                return Err(AuthError::InvalidToken);
            };
            if !account.is_active {
                return Err(AuthError::AccountDeactivated);
            }
            if !hashing::verify_password(&account.password_hash, current_password).await {
                return Err(AuthError::InvalidPassword);
            }

            account.password_hash = hashing::hash_password(new_password)
                .await
                .map_err(AuthError::internal)?;
            account.password_reset.clear();

            match self
                .store
                .compare_and_update(&account)
                .await
                .map_err(AuthError::internal)?
            {
                UpdateOutcome::Updated => {
                    info!(
                        target: "audit",
                        user_id = %account.id,
                        event = "password_change",
                        "password changed"
                    );
                    self.dispatcher
                        .dispatch(OutboundMessage {
                            to_email: account.email.clone(),
                            kind: OutboundKind::PasswordChanged,
                        })
                        .await;
                    return Ok(());
                }
                UpdateOutcome::Conflict => continue,
                UpdateOutcome::Missing => return Err(AuthError::InvalidToken),
            }
        }
        Err(AuthError::internal(anyhow!(
            "persistent update contention during password change"
        )))
    }

    /// Resolve a bearer access token into the live account.
    ///
    /// # Errors
    /// `INVALID_TOKEN`, `TOKEN_EXPIRED`, or `ACCOUNT_DEACTIVATED`.
    pub async fn authenticate_bearer(&self, token: &str) -> Result<Account, AuthError> {
        let claims = match self.codec.verify(token) {
            TokenVerdict::Valid(claims) => claims,
            TokenVerdict::Expired => return Err(AuthError::TokenExpired),
            TokenVerdict::Invalid => return Err(AuthError::InvalidToken),
        };
        if claims.token_type != TokenType::Access {
            return Err(AuthError::InvalidToken);
        }
        let Some(account) = self
            .store
            .find_by_id(claims.sub)
            .await
            .map_err(AuthError::internal)?
        else {
            return Err(AuthError::InvalidToken);
        };
        if !account.is_active {
            return Err(AuthError::AccountDeactivated);
        }
        Ok(account)
    }

    /// Load, verify, and persist a challenge consumption as one
    /// compare-and-update. Exactly one of two concurrent attempts can win;
    /// the loser reloads and finds no pending challenge.
    async fn consume_challenge(
        &self,
        email: &str,
        candidate: &str,
    ) -> Result<(Account, OtpContext), AuthError> {
        let email_normalized = normalize_email(email);

        for _ in 0..MAX_UPDATE_RETRIES {
            let Some(mut account) = self
                .store
                .find_by_email(&email_normalized)
                .await
                .map_err(AuthError::internal)?
            else {
                return Err(AuthError::AccountNotFound);
            };
            if !account.is_active {
                return Err(AuthError::AccountDeactivated);
            }

            let now = Utc::now();
            match otp::verify(
                &mut account.verification,
                candidate,
                now,
                self.config.otp_max_attempts(),
            ) {
                Ok(context) => {
                    if context == OtpContext::Reverify {
                        account.last_otp_verified_at = Some(now);
                    } else {
                        account.verification.email_verified = true;
                        account.last_login = Some(now);
                        account.last_otp_verified_at = Some(now);
                    }
                    match self
                        .store
                        .compare_and_update(&account)
                        .await
                        .map_err(AuthError::internal)?
                    {
                        UpdateOutcome::Updated => return Ok((account, context)),
                        UpdateOutcome::Conflict => continue,
                        UpdateOutcome::Missing => return Err(AuthError::AccountNotFound),
                    }
                }
                Err(OtpRejection::Mismatch) => {
                    // Persist the incremented counter before reporting the
                    // failure, or retries could probe for free.
                    match self
                        .store
                        .compare_and_update(&account)
                        .await
                        .map_err(AuthError::internal)?
                    {
                        UpdateOutcome::Updated => return Err(AuthError::InvalidOtp),
                        UpdateOutcome::Conflict => continue,
                        UpdateOutcome::Missing => return Err(AuthError::AccountNotFound),
                    }
                }
                Err(OtpRejection::NotFound) => return Err(AuthError::AccountNotFound),
                Err(OtpRejection::TooManyAttempts) => return Err(AuthError::TooManyAttempts),
                Err(OtpRejection::Expired) => return Err(AuthError::OtpExpired),
            }
        }
        Err(AuthError::internal(anyhow!(
            "persistent update contention during verification"
        )))
    }

    fn issue_session(&self, account: &Account) -> Result<SessionData, AuthError> {
        let access_token = self
            .codec
            .sign(
                account.id,
                account.role,
                TokenType::Access,
                self.config.access_ttl(account.remember_me),
            )
            .map_err(AuthError::internal)?;
        let refresh_token = self
            .codec
            .sign(
                account.id,
                account.role,
                TokenType::Refresh,
                self.config.refresh_ttl(),
            )
            .map_err(AuthError::internal)?;
        Ok(SessionData {
            user: UserProfile::from(account),
            access_token,
            refresh_token,
            remember_me: account.remember_me,
        })
    }

    fn mint_pair(&self, account: &Account) -> Result<TokenPairData, AuthError> {
        let access_token = self
            .codec
            .sign(
                account.id,
                account.role,
                TokenType::Access,
                self.config.access_ttl(account.remember_me),
            )
            .map_err(AuthError::internal)?;
        let refresh_token = self
            .codec
            .sign(
                account.id,
                account.role,
                TokenType::Refresh,
                self.config.refresh_ttl(),
            )
            .map_err(AuthError::internal)?;
        Ok(TokenPairData {
            access_token,
            refresh_token,
        })
    }
}
