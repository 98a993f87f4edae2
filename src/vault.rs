use std::sync::Arc;

use crate::store::Store;

/// The literal credential value that switches a fetcher into synthetic
/// demo mode instead of calling the provider.
const SANDBOX_SENTINEL: &str = "sandbox";

/// A resolved credential. The sandbox sentinel is converted to a tagged
/// variant here so fetchers branch on a type, not a magic string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Sandbox,
    Token(String),
}

impl Credential {
    pub fn from_plaintext(token: String) -> Credential {
        if token == SANDBOX_SENTINEL {
            Credential::Sandbox
        } else {
            Credential::Token(token)
        }
    }
}

/// Secret resolution collaborator. Encryption at rest lives behind this
/// seam; the pipeline only ever sees the resolved credential.
pub trait SecretVault: Send + Sync {
    fn resolve(&self, integration_id: &str) -> anyhow::Result<Option<Credential>>;
}

/// Store-backed vault used in production.
pub struct StoreVault {
    store: Arc<Store>,
}

impl StoreVault {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

impl SecretVault for StoreVault {
    fn resolve(&self, integration_id: &str) -> anyhow::Result<Option<Credential>> {
        Ok(self
            .store
            .get_secret_token(integration_id)?
            .map(Credential::from_plaintext))
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;

    /// Map-backed vault for pipeline tests.
    pub struct FixedVault {
        creds: HashMap<String, Credential>,
    }

    impl FixedVault {
        pub fn new(creds: impl IntoIterator<Item = (String, Credential)>) -> Self {
            Self {
                creds: creds.into_iter().collect(),
            }
        }

        pub fn sandbox(integration_id: &str) -> Self {
            Self::new([(integration_id.to_string(), Credential::Sandbox)])
        }
    }

    impl SecretVault for FixedVault {
        fn resolve(&self, integration_id: &str) -> anyhow::Result<Option<Credential>> {
            Ok(self.creds.get(integration_id).cloned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_sentinel_becomes_tagged_variant() {
        assert_eq!(
            Credential::from_plaintext("sandbox".into()),
            Credential::Sandbox
        );
        assert_eq!(
            Credential::from_plaintext("sk_live_123".into()),
            Credential::Token("sk_live_123".into())
        );
    }
}
