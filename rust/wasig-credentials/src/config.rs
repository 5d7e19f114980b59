use crate::{CredentialError, StoredKey, TransactionDigest};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

const DEFAULT_BASE_URL: &str = "https://localhost:8443/";
const DEFAULT_RELYING_PARTY_ID: &str = "localhost";
const DEFAULT_KEY_STORE_PATH: &str = "webauthn_keys_db.json";
const DEFAULT_WAITING_NOTICE_INTERVAL: Duration = Duration::from_millis(7500);

/// Settings for the browser bridge.
///
/// ```
/// # use wasig_credentials::BridgeConfig;
/// let config = BridgeConfig::from_json(r#"{ "baseUrl": "https://wallet.test:9443/" }"#)?;
/// assert_eq!(config.generate_url()?.as_str(), "https://wallet.test:9443/generate.html");
/// assert_eq!(config.relying_party_id, "localhost");
/// # Ok::<(), wasig_credentials::CredentialError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// Where the local HTTPS listener serves the browser pages.
    pub base_url: Url,
    /// The relying party credentials are created for.
    pub relying_party_id: String,
    /// The enrollment record file.
    pub key_store_path: PathBuf,
    /// How often to log while waiting on the browser.
    #[serde(with = "millis")]
    pub waiting_notice_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            // A constant absolute https URL; parsing it cannot fail
            base_url: Url::parse(DEFAULT_BASE_URL).expect("DEFAULT_BASE_URL parses"),
            relying_party_id: DEFAULT_RELYING_PARTY_ID.to_owned(),
            key_store_path: PathBuf::from(DEFAULT_KEY_STORE_PATH),
            waiting_notice_interval: DEFAULT_WAITING_NOTICE_INTERVAL,
        }
    }
}

impl BridgeConfig {
    /// Parses a JSON configuration document. Absent fields take their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, CredentialError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|error| CredentialError::Config(format!("{error}")))?;
        if config.waiting_notice_interval.is_zero() {
            return Err(CredentialError::Config(
                "waitingNoticeInterval must be positive".into(),
            ));
        }
        if config.base_url.cannot_be_a_base() {
            return Err(CredentialError::Config(format!(
                "{} cannot serve pages",
                config.base_url
            )));
        }
        Ok(config)
    }

    /// The page that creates a new credential.
    pub fn generate_url(&self) -> Result<Url, CredentialError> {
        self.page("generate.html")
    }

    /// The page that asks the authenticator to sign `digest` with `key`.
    pub fn transfer_url(
        &self,
        key: &StoredKey,
        digest: &TransactionDigest,
    ) -> Result<Url, CredentialError> {
        let mut url = self.page("transfer.html")?;
        url.query_pairs_mut()
            .append_pair("publicKey", &key.key.to_string())
            .append_pair("credentialId", &key.credential_id)
            .append_pair("digest", &digest.to_hex());
        Ok(url)
    }

    fn page(&self, name: &str) -> Result<Url, CredentialError> {
        self.base_url
            .join(name)
            .map_err(|error| CredentialError::Config(format!("{error}")))
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Presence, WebAuthnPublicKey};
    use pretty_assertions::assert_eq;

    #[test]
    fn it_defaults_to_the_local_listener() {
        let config = BridgeConfig::default();
        assert_eq!(config.base_url.as_str(), "https://localhost:8443/");
        assert_eq!(config.relying_party_id, "localhost");
        assert_eq!(config.key_store_path, PathBuf::from("webauthn_keys_db.json"));
        assert_eq!(config.waiting_notice_interval, Duration::from_millis(7500));
        assert_eq!(BridgeConfig::from_json("{}").unwrap(), config);
    }

    #[test]
    fn the_default_base_url_can_serve_pages() {
        let base_url = Url::parse(DEFAULT_BASE_URL).unwrap();
        assert!(!base_url.cannot_be_a_base());
        assert_eq!(base_url.scheme(), "https");
    }

    #[test]
    fn it_reads_the_notice_interval_in_milliseconds() {
        let config = BridgeConfig::from_json(r#"{ "waitingNoticeInterval": 250 }"#).unwrap();
        assert_eq!(config.waiting_notice_interval, Duration::from_millis(250));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["waitingNoticeInterval"], 250);
    }

    #[test]
    fn it_rejects_unusable_settings() {
        assert!(matches!(
            BridgeConfig::from_json(r#"{ "waitingNoticeInterval": 0 }"#),
            Err(CredentialError::Config(_))
        ));
        assert!(matches!(
            BridgeConfig::from_json(r#"{ "baseUrl": "mailto:someone@example.com" }"#),
            Err(CredentialError::Config(_))
        ));
        assert!(matches!(
            BridgeConfig::from_json(r#"{ "baseUrl": 7 }"#),
            Err(CredentialError::Config(_))
        ));
    }

    #[test]
    fn it_builds_the_transfer_url() {
        let key = StoredKey {
            credential_id: "c0ffee".into(),
            key: WebAuthnPublicKey::from_coordinates(
                [1; 32],
                &[2; 32],
                Presence::Verified,
                "localhost",
            ),
        };
        let digest = TransactionDigest::compute(&[0; 32], &[]);

        let url = BridgeConfig::default().transfer_url(&key, &digest).unwrap();

        assert_eq!(
            url.as_str(),
            format!(
                "https://localhost:8443/transfer.html?publicKey={}&credentialId=c0ffee&digest={}",
                key.key,
                digest.to_hex()
            )
        );
    }
}
