use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::{now_millis, Config};

type HmacSha256 = Hmac<Sha256>;

/// Prefix of every token, bumped whenever the payload layout changes
const TOKEN_VERSION: &str = "dl1";

/// The capability a token grants on a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May send audio and video
    Publisher,
    /// May only receive
    Subscriber,
}

/// The signed claims inside a capability token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    pub app_id: String,
    pub room_name: String,
    pub subject_uid: String,
    pub role: Role,
    /// Unix seconds
    pub issued_at: i64,
    /// Unix seconds
    pub expires_at: i64,
}

/// A short-lived credential for the external RTC provider. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityToken {
    /// The opaque string handed to clients
    pub token: String,
    pub grant: Grant,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Credential issuer is not configured with a signing secret")]
    NotConfigured,
    #[error("A channel is required to issue a token")]
    MissingChannel,
    #[error("Token is malformed")]
    Malformed,
    #[error("Token signature does not match")]
    BadSignature,
    #[error("Token has expired")]
    Expired,
}

/// Mints and verifies capability tokens.
/// The secret is fixed at construction and never changes afterwards.
#[derive(Clone)]
pub struct CredentialIssuer {
    app_id: String,
    secret: Option<Vec<u8>>,
    min_ttl_secs: u64,
    max_ttl_secs: u64,
}

impl CredentialIssuer {
    pub fn new(config: &Config) -> Self {
        Self {
            app_id: config.rtc_app_id.clone(),
            secret: config
                .rtc_certificate
                .as_ref()
                .map(|s| s.as_bytes().to_vec()),
            min_ttl_secs: config.min_token_ttl_secs,
            max_ttl_secs: config.max_token_ttl_secs,
        }
    }

    /// Returns true if tokens can be issued
    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Issues a token valid from now until `ttl_secs` from now, with the lifetime clamped.
    pub fn issue(
        &self,
        room_name: &str,
        subject_uid: &str,
        role: Role,
        ttl_secs: u64,
    ) -> Result<CapabilityToken, CredentialError> {
        self.issue_at(room_name, subject_uid, role, ttl_secs, now_millis() / 1000)
    }

    /// Same as [CredentialIssuer::issue], but at an explicit unix time.
    pub fn issue_at(
        &self,
        room_name: &str,
        subject_uid: &str,
        role: Role,
        ttl_secs: u64,
        now_secs: i64,
    ) -> Result<CapabilityToken, CredentialError> {
        if room_name.trim().is_empty() {
            return Err(CredentialError::MissingChannel);
        }

        let ttl = ttl_secs.clamp(self.min_ttl_secs, self.max_ttl_secs);

        let grant = Grant {
            app_id: self.app_id.clone(),
            room_name: room_name.to_string(),
            subject_uid: subject_uid.to_string(),
            role,
            issued_at: now_secs,
            expires_at: now_secs + ttl as i64,
        };

        let payload = serde_json::to_vec(&grant).map_err(|_| CredentialError::Malformed)?;
        let payload = URL_SAFE_NO_PAD.encode(payload);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&payload)?);

        Ok(CapabilityToken {
            token: format!("{TOKEN_VERSION}.{payload}.{signature}"),
            grant,
        })
    }

    /// Checks the signature and expiry of a token, returning its grant.
    pub fn verify(&self, token: &str) -> Result<Grant, CredentialError> {
        self.verify_at(token, now_millis() / 1000)
    }

    pub fn verify_at(&self, token: &str, now_secs: i64) -> Result<Grant, CredentialError> {
        let secret = self.secret.as_ref().ok_or(CredentialError::NotConfigured)?;

        let mut parts = token.split('.');
        let (Some(TOKEN_VERSION), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CredentialError::Malformed);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| CredentialError::Malformed)?;

        let mut mac =
            HmacSha256::new_from_slice(secret).map_err(|_| CredentialError::NotConfigured)?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| CredentialError::BadSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| CredentialError::Malformed)?;
        let grant: Grant =
            serde_json::from_slice(&payload).map_err(|_| CredentialError::Malformed)?;

        if grant.expires_at <= now_secs {
            return Err(CredentialError::Expired);
        }

        Ok(grant)
    }

    fn sign(&self, payload: &str) -> Result<Vec<u8>, CredentialError> {
        let secret = self.secret.as_ref().ok_or(CredentialError::NotConfigured)?;
        let mut mac =
            HmacSha256::new_from_slice(secret).map_err(|_| CredentialError::NotConfigured)?;
        mac.update(payload.as_bytes());

        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn issuer(secret: Option<&str>) -> CredentialIssuer {
        CredentialIssuer::new(&Config {
            rtc_certificate: secret.map(|s| s.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = issuer(Some("sea-secret"));
        let token = issuer
            .issue_at("beach-cam", "42", Role::Publisher, 3600, 1_000)
            .unwrap();

        assert_eq!(token.grant.expires_at, 4_600);

        let grant = issuer.verify_at(&token.token, 1_001).unwrap();
        assert_eq!(grant, token.grant);
        assert_eq!(grant.role, Role::Publisher);
    }

    #[test]
    fn test_issuance_is_deterministic() {
        let issuer = issuer(Some("sea-secret"));

        let first = issuer.issue_at("room", "1", Role::Subscriber, 600, 50).unwrap();
        let second = issuer.issue_at("room", "1", Role::Subscriber, 600, 50).unwrap();

        assert_eq!(first.token, second.token);
    }

    #[test]
    fn test_ttl_is_clamped() {
        let issuer = issuer(Some("sea-secret"));

        let short = issuer.issue_at("room", "1", Role::Subscriber, 1, 0).unwrap();
        let long = issuer
            .issue_at("room", "1", Role::Subscriber, u64::MAX, 0)
            .unwrap();

        assert_eq!(short.grant.expires_at, 60);
        assert_eq!(long.grant.expires_at, 60 * 60 * 24 * 7);
    }

    #[test]
    fn test_unconfigured_issuer_refuses() {
        let issuer = issuer(None);

        assert!(!issuer.is_configured());
        assert_eq!(
            issuer.issue("room", "1", Role::Publisher, 60),
            Err(CredentialError::NotConfigured)
        );
    }

    #[test]
    fn test_rejects_tampering_and_expiry() {
        let signer = issuer(Some("sea-secret"));
        let other = issuer(Some("another-secret"));
        let token = signer.issue_at("room", "1", Role::Subscriber, 60, 0).unwrap();

        assert_eq!(
            other.verify_at(&token.token, 1),
            Err(CredentialError::BadSignature)
        );
        assert_eq!(
            signer.verify_at(&token.token, 60),
            Err(CredentialError::Expired)
        );
        assert_eq!(
            signer.verify_at("not-a-token", 0),
            Err(CredentialError::Malformed)
        );
    }

    #[test]
    fn test_requires_channel() {
        let issuer = issuer(Some("sea-secret"));

        assert_eq!(
            issuer.issue("  ", "1", Role::Publisher, 60),
            Err(CredentialError::MissingChannel)
        );
    }
}
