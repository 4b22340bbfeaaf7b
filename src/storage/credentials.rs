use anyhow::Result;
use std::fmt;

use super::preferences::Preferences;

pub const URL_KEY: &str = "webdav_url";
pub const USERNAME_KEY: &str = "webdav_username";
pub const PASSWORD_KEY: &str = "webdav_password";

/// Remote endpoint and login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub struct CredentialStore {
    prefs: Preferences,
}

impl CredentialStore {
    pub fn new(prefs: Preferences) -> Self {
        Self { prefs }
    }

    pub fn save(&mut self, url: &str, username: &str, password: &str) -> Result<()> {
        self.prefs.set_string(URL_KEY, url)?;
        self.prefs.set_string(USERNAME_KEY, username)?;
        self.prefs.set_string(PASSWORD_KEY, password)?;
        Ok(())
    }

    /// The stored credentials, or `None` unless all three values are non-empty.
    pub fn load(&self) -> Option<Credentials> {
        let get = |key| self.prefs.get_string(key).filter(|v| !v.is_empty());
        Some(Credentials::new(
            get(URL_KEY)?,
            get(USERNAME_KEY)?,
            get(PASSWORD_KEY)?,
        ))
    }

    pub fn is_configured(&self) -> bool {
        self.load().is_some()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.prefs.remove(URL_KEY)?;
        self.prefs.remove(USERNAME_KEY)?;
        self.prefs.remove(PASSWORD_KEY)?;
        Ok(())
    }
}
