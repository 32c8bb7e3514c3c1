//! Credential selection collaborator.
//!
//! The storyboard never manages keys itself: it asks whether one is selected and,
//! when it is not (or the service rejected it), asks the host to let the user pick
//! one and waits for the answer.

use crate::console;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Shown before reading a key; the terminal echoes what is typed.
const KEY_PROMPT: &str =
    "Enter API key (paid tier; input is visible, leave blank to cancel): ";

/// Shared slot for the API key used by outgoing requests.
#[derive(Clone, Default)]
pub struct ApiKeyStore {
    key: Arc<RwLock<Option<String>>>,
}

impl fmt::Debug for ApiKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKeyStore(<redacted>)")
    }
}

impl ApiKeyStore {
    pub fn new(key: Option<String>) -> Self {
        Self {
            key: Arc::new(RwLock::new(key)),
        }
    }

    pub async fn get(&self) -> Option<String> {
        self.key.read().await.clone()
    }

    pub async fn set(&self, key: String) {
        *self.key.write().await = Some(key);
    }

    pub async fn is_set(&self) -> bool {
        self.key.read().await.is_some()
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Has a usable credential been selected?
    async fn has_selected_credential(&self) -> bool;

    /// Ask the user to select a credential; resolves once they are done.
    /// Returns whether one is selected afterwards.
    async fn select_credential(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Selected,
    NotSelected,
}

/// Startup check and pre-generation guard.
pub async fn ensure_credential(provider: &dyn CredentialProvider) -> CredentialStatus {
    if provider.has_selected_credential().await {
        return CredentialStatus::Selected;
    }

    info!("No API key selected, asking for one");
    if provider.select_credential().await {
        CredentialStatus::Selected
    } else {
        warn!("No API key was selected");
        CredentialStatus::NotSelected
    }
}

/// Terminal implementation: reads a key from stdin into the shared store.
#[derive(Debug, Clone)]
pub struct InteractiveCredentials {
    keys: ApiKeyStore,
    interactive: bool,
}

impl InteractiveCredentials {
    pub fn new(keys: ApiKeyStore, interactive: bool) -> Self {
        Self { keys, interactive }
    }
}

#[async_trait]
impl CredentialProvider for InteractiveCredentials {
    async fn has_selected_credential(&self) -> bool {
        self.keys.is_set().await
    }

    async fn select_credential(&self) -> bool {
        if !self.interactive {
            warn!("Prompting disabled; set GEMINI_API_KEY to select a key");
            return false;
        }

        match console::prompt_line(KEY_PROMPT).await {
            Ok(Some(line)) if !line.trim().is_empty() => {
                self.keys.set(line.trim().to_string()).await;
                info!("API key selected");
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!("Failed to read API key: {}", e);
                false
            }
        }
    }
}
