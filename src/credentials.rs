use crate::errors::CrawlError;
use serde::{
    Deserialize,
    Serialize,
};
use std::path::Path;

/// How far into a password the redacted form shows. Two characters is enough to tell two
/// credentials apart in a log without being worth anything to a shoulder-surfer.
const REDACTED_PREFIX_LEN: usize = 2;

/// The kind of a stored credential.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    /// Normal interactive user/password login.
    #[default]
    UserPass,
    /// Credential whose password is also the enable secret.
    Enable,
}

/// One device login credential.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Credential {
    /// Login username.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Credential flavor.
    #[serde(rename = "type", default)]
    pub cred_type: CredentialType,
}

impl Credential {
    /// Redacted rendering for logs and the device record: username plus the first couple of
    /// password characters.
    #[must_use]
    pub fn redacted(&self) -> String {
        let prefix: String = self.password.chars().take(REDACTED_PREFIX_LEN).collect();

        format!("{}/{prefix}****", self.username)
    }
}

/// Database credential record as stored in the vault.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DatabaseCredential {
    /// Database username.
    pub username: String,
    /// Database password.
    pub password: String,
}

/// The decrypted content of the credential vault.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VaultContents {
    /// Device login credentials, in trial order.
    pub device_creds: Vec<Credential>,
    /// Credential for the backing databases.
    pub database: DatabaseCredential,
}

/// Contract for the encrypted credential vault. The implementation (symmetric blob at
/// `<run_path>/vault`, key held in the OS secret service under service "netcrawl", account
/// "netcrawl") lives outside this crate; netcrawl only consumes the decrypted record.
///
/// Implementations must return the *empty* structure -- not an error -- when the ciphertext does
/// not authenticate.
pub trait CredentialVault {
    /// Decrypt and return the vault contents.
    fn unlock(&self) -> VaultContents;
}

/// A vault handed its contents up front. Backs tests and the native credential-file path.
pub struct StaticVault {
    contents: VaultContents,
}

impl StaticVault {
    /// Wrap already-decrypted contents.
    #[must_use]
    pub const fn new(contents: VaultContents) -> Self {
        Self { contents }
    }
}

impl CredentialVault for StaticVault {
    fn unlock(&self) -> VaultContents {
        self.contents.clone()
    }
}

/// Load device credentials from the native YAML credential file.
///
/// # Errors
///
/// Returns `CrawlError::Config` when the file cannot be read/parsed, or -- the startup abort the
/// crawl requires -- when the resulting credential list is empty.
pub fn load_credentials(path: &Path) -> Result<Vec<Credential>, CrawlError> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        CrawlError::Config(format!("failed reading credential file {path:?}: {err}"))
    })?;

    let creds: Vec<Credential> = serde_yaml::from_str(&raw).map_err(|err| {
        CrawlError::Config(format!("failed parsing credential file {path:?}: {err}"))
    })?;

    ensure_not_empty(creds)
}

/// Rejects an empty credential list. Every startup path funnels through this -- crawling with no
/// credentials can only produce a failed row per target.
///
/// # Errors
///
/// Returns `CrawlError::Config` when `creds` is empty.
pub fn ensure_not_empty(creds: Vec<Credential>) -> Result<Vec<Credential>, CrawlError> {
    if creds.is_empty() {
        return Err(CrawlError::Config(String::from(
            "no credentials available, aborting: populate the credential file or vault first",
        )));
    }

    Ok(creds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn redaction_keeps_short_prefix() {
        let cred = Credential {
            username: String::from("admin"),
            password: String::from("hunter2"),
            cred_type: CredentialType::UserPass,
        };

        assert_eq!(cred.redacted(), "admin/hu****");
    }

    #[test]
    fn empty_credential_list_aborts() {
        let err = ensure_not_empty(vec![]).unwrap_err();

        assert!(matches!(err, CrawlError::Config(_)));
    }

    #[test]
    fn loads_yaml_credential_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "- username: admin\n  password: secret\n  type: user_pass\n- username: ops\n  password: other"
        )
        .unwrap();

        let creds = load_credentials(file.path()).unwrap();

        assert_eq!(creds.len(), 2);
        assert_eq!(creds[0].username, "admin");
        assert_eq!(creds[1].cred_type, CredentialType::UserPass);
    }

    #[test]
    fn tampered_vault_contract_is_empty_not_error() {
        let vault = StaticVault::new(VaultContents::default());
        let contents = vault.unlock();

        assert!(contents.device_creds.is_empty());
    }
}
