//! Job construction
//!
//! [`NewJobFactory`] turns caller input into a complete, encrypted job;
//! [`ExistingJobFactory`] wraps records loaded from the Queue API and
//! produces modified copies of existing jobs.

mod existing;
mod new;

pub use existing::ExistingJobFactory;
pub use new::NewJobFactory;

use std::sync::Arc;

use crate::encryption::JobEncryptor;
use crate::services::{ComponentRegistry, IdentityService, TokenIssuer};

/// Issuer of privileged execution tokens and the credential it accepts
pub struct PrivilegedTokens {
    pub issuer: Arc<dyn TokenIssuer>,
    pub application_token: String,
}

/// Collaborators shared by every job a factory produces
pub struct JobDependencies {
    pub encryptor: Arc<dyn JobEncryptor>,
    pub registry: Arc<dyn ComponentRegistry>,
    pub identity: Arc<dyn IdentityService>,
    /// `None` when the deployment cannot mint privileged tokens
    pub privileged_tokens: Option<PrivilegedTokens>,
}

impl JobDependencies {
    pub fn new(
        encryptor: Arc<dyn JobEncryptor>,
        registry: Arc<dyn ComponentRegistry>,
        identity: Arc<dyn IdentityService>,
    ) -> Self {
        Self {
            encryptor,
            registry,
            identity,
            privileged_tokens: None,
        }
    }

    pub fn with_privileged_tokens(mut self, issuer: Arc<dyn TokenIssuer>, application_token: impl Into<String>) -> Self {
        self.privileged_tokens = Some(PrivilegedTokens {
            issuer,
            application_token: application_token.into(),
        });
        self
    }
}
