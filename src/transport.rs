//! HTTP plumbing used to talk to the ladder server.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{instrument, trace, warn};

/// Multipart form: text fields and file attachments, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Form {
    fields: Vec<(String, String)>,
    files: Vec<(String, PathBuf)>,
}

impl Form {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Form carrying the `Username` / `Password` fields every ladder request starts with.
    pub fn with_credentials(username: &str, password: &str) -> Self {
        Self::new()
            .text("Username", username)
            .text("Password", password)
    }

    /// Add a text field.
    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.push((name.to_owned(), value.into()));
        self
    }

    /// Attach the file at `path`, read when the form is sent.
    pub fn file(mut self, name: &str, path: impl AsRef<Path>) -> Self {
        self.files.push((name.to_owned(), path.as_ref().to_path_buf()));
        self
    }

    /// Value of the first text field called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[allow(missing_docs)]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    #[allow(missing_docs)]
    pub fn files(&self) -> &[(String, PathBuf)] {
        &self.files
    }
}

/// Perform one form POST and hand back the raw response body.
///
/// Implementations keep cookies across calls so that a login is reused by every later request.
pub trait HttpTransport {
    /// # Errors
    /// Only transport-level failures (connection, unreadable attachment, ...). The body of a
    /// non-success response is still returned: the callers decide what it means.
    fn post_form(&self, url: &str, form: &Form) -> anyhow::Result<Vec<u8>>;
}

/// [`HttpTransport`] backed by a blocking `reqwest` client with a cookie jar.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// # Errors
    /// If the TLS backend cannot be initialized.
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .build()
            .context("could not build http client")?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, form), fields(fields = form.fields.len(), files = form.files.len()))]
    fn post_form(&self, url: &str, form: &Form) -> anyhow::Result<Vec<u8>> {
        let mut multipart = reqwest::blocking::multipart::Form::new();
        for (name, value) in &form.fields {
            multipart = multipart.text(name.clone(), value.clone());
        }
        for (name, path) in &form.files {
            multipart = multipart
                .file(name.clone(), path)
                .with_context(|| format!("cannot attach {}", path.display()))?;
        }

        let response = self
            .client
            .post(url)
            .multipart(multipart)
            .send()
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            warn!("{url} answered {status}");
        }
        let body = response.bytes().context("could not read response body")?;
        trace!(len = body.len(), "response received");
        Ok(body.to_vec())
    }
}
