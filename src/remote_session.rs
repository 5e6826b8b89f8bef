//! Ladder server credentials and login.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::{
    configuration::Configuration,
    transport::{Form, HttpTransport},
};

/// Credentials for the ladder server, and the one-shot login made with them.
///
/// The session cookie itself lives in the [`HttpTransport`] cookie jar.
#[derive(Clone)]
pub struct RemoteSession {
    transport: Arc<dyn HttpTransport>,
    username: String,
    password: String,
    login_address: Option<String>,
}

impl RemoteSession {
    /// Login is enabled by `EnableServerLogin`.
    pub fn new(config: &Configuration, transport: Arc<dyn HttpTransport>) -> Self {
        let login_address = if config.enable_server_login {
            Some(config.server_login_address.clone())
        } else {
            None
        };
        Self {
            transport,
            username: config.server_username.clone(),
            password: config.server_password.clone(),
            login_address,
        }
    }

    #[allow(missing_docs)]
    pub fn login_enabled(&self) -> bool {
        self.login_address.is_some()
    }

    /// Post the credentials to the login endpoint.
    ///
    /// Returns whether the request went through. The answer is not interpreted: bad credentials
    /// surface later as failing downloads and uploads.
    #[instrument(skip(self))]
    pub fn login(&self) -> bool {
        let Some(address) = &self.login_address else {
            return false;
        };
        let form = Form::with_credentials(&self.username, &self.password);
        match self.transport.post_form(address, &form) {
            Ok(_) => {
                info!("logged in to {address}");
                true
            }
            Err(e) => {
                warn!("login to {address} failed: {e:#}");
                false
            }
        }
    }

    /// Form pre-filled with the credentials.
    pub fn form(&self) -> Form {
        Form::with_credentials(&self.username, &self.password)
    }
}
