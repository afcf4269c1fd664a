//! Username to key-alias directory.
//!
//! Each user is bound to the key alias the network issued at registration
//! and to the IP address they registered from. The directory is a JSON
//! object keyed by username:
//!
//! ```json
//! { "alice": { "ip": "10.0.0.5", "ka": "KA-0000000000001234" } }
//! ```
//!
//! A file-backed directory rewrites the file after every change.

use std::{
    collections::BTreeMap,
    fs, io,
    net::IpAddr,
    path::{Path, PathBuf},
};

use chatline_core::{Environment, Network, NetworkError, proto::KeyAlias};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the user directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// A user with this name already exists.
    #[error("user already exists: {0}")]
    UsernameTaken(String),

    /// No user with this name.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// No user holds this key alias.
    #[error("key alias not assigned to any user: {0}")]
    UnassignedKeyAlias(KeyAlias),

    /// Reading or writing the directory file failed.
    #[error("user directory I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The network could not issue a key alias.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// The directory could not be serialized.
    #[error("user directory encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// One directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Address the user registered from.
    pub ip: IpAddr,
    /// Key alias issued to the user.
    pub ka: KeyAlias,
}

/// Registered users, optionally backed by a JSON file.
#[derive(Debug, Default)]
pub struct UserDirectory {
    path: Option<PathBuf>,
    users: BTreeMap<String, UserRecord>,
}

impl UserDirectory {
    /// Directory that lives only in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open (or create) a file-backed directory.
    ///
    /// A missing file is created empty. A file that does not parse is
    /// logged and reset to empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref().to_path_buf();

        let users = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(users) => users,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "user directory corrupt, resetting"
                    );
                    BTreeMap::new()
                },
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        let directory = Self { path: Some(path), users };
        directory.persist()?;

        tracing::info!(users = directory.users.len(), "user directory opened");
        Ok(directory)
    }

    /// Register `username`, issuing a fresh key alias from `network`.
    pub fn create_user<E: Environment>(
        &mut self,
        username: &str,
        ip: IpAddr,
        network: &mut Network<E>,
    ) -> Result<KeyAlias, DirectoryError> {
        if self.users.contains_key(username) {
            return Err(DirectoryError::UsernameTaken(username.to_owned()));
        }

        let ka = network.register_key_alias()?;
        self.users.insert(username.to_owned(), UserRecord { ip, ka: ka.clone() });
        if let Err(e) = self.persist() {
            // Memory and file must agree; the issued alias stays unassigned
            self.users.remove(username);
            tracing::warn!(%username, key_alias = %ka, error = %e, "user not saved");
            return Err(e);
        }

        tracing::info!(%username, %ip, key_alias = %ka, "user created");
        Ok(ka)
    }

    /// Whether `ip` may act as `username`.
    ///
    /// Unregistered names are not bound to any address and pass.
    pub fn is_authorized(&self, username: &str, ip: IpAddr) -> bool {
        self.users.get(username).is_none_or(|record| record.ip == ip)
    }

    /// Key alias of `username`.
    pub fn key_alias_for(&self, username: &str) -> Result<&KeyAlias, DirectoryError> {
        self.users
            .get(username)
            .map(|record| &record.ka)
            .ok_or_else(|| DirectoryError::UnknownUser(username.to_owned()))
    }

    /// Username holding `alias`.
    pub fn user_for_key_alias(&self, alias: &KeyAlias) -> Result<&str, DirectoryError> {
        self.users
            .iter()
            .find(|(_, record)| &record.ka == alias)
            .map(|(username, _)| username.as_str())
            .ok_or_else(|| DirectoryError::UnassignedKeyAlias(alias.clone()))
    }

    /// Registered usernames, sorted.
    pub fn list_users(&self) -> Vec<String> {
        self.users.keys().cloned().collect()
    }

    /// Every key alias in the directory.
    pub fn key_aliases(&self) -> impl Iterator<Item = &KeyAlias> + '_ {
        self.users.values().map(|record| &record.ka)
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether no users are registered.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn persist(&self) -> Result<(), DirectoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.users)?;
        fs::write(path, json)?;
        Ok(())
    }
}
