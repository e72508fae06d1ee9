//! Durable session storage.
//!
//! The session is two strings under fixed keys, [`ACCESS_TOKEN`] and
//! [`REFRESH_TOKEN`], plus an optional cached [`USER_ID`]. Any key/value
//! backend implementing [`TokenStore`] can hold them:
//!
//! * [`MemoryStore`] keeps them for the lifetime of the process
//! * [`FileStore`] keeps them in a small TOML file between runs
//!
//! Reads are safe from anywhere. Writes only come from the refresh routine
//! and the login, registration and logout flows.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::error::{Error, Result};

/// Key of the access token.
pub const ACCESS_TOKEN: &str = "accessToken";

/// Key of the refresh token.
pub const REFRESH_TOKEN: &str = "refreshToken";

/// Key of the cached id of the signed-in user.
pub const USER_ID: &str = "userId";

/// Key/value storage for session state.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// # Errors
    ///
    /// Will return `Err` if the value cannot be persisted.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// # Errors
    ///
    /// Will return `Err` if the removal cannot be persisted.
    fn remove(&self, key: &str) -> Result<()>;

    fn access_token(&self) -> Option<String> {
        self.get(ACCESS_TOKEN)
    }

    fn refresh_token(&self) -> Option<String> {
        self.get(REFRESH_TOKEN)
    }

    /// Stores a new token pair.
    ///
    /// Empty values are ignored, and a missing refresh token leaves the
    /// current one in place: backends do not always rotate refresh tokens.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the tokens cannot be persisted.
    fn set_tokens(&self, access: &str, refresh: Option<&str>) -> Result<()> {
        if !access.is_empty() {
            self.set(ACCESS_TOKEN, access)?;
        }
        if let Some(refresh) = refresh.filter(|refresh| !refresh.is_empty()) {
            self.set(REFRESH_TOKEN, refresh)?;
        }
        Ok(())
    }

    /// Removes both tokens and the cached user id.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the removal cannot be persisted.
    fn clear_tokens(&self) -> Result<()> {
        self.remove(ACCESS_TOKEN)?;
        self.remove(REFRESH_TOKEN)?;
        self.remove(USER_ID)
    }

    fn user_id(&self) -> Option<String> {
        self.get(USER_ID)
    }

    /// # Errors
    ///
    /// Will return `Err` if the id cannot be persisted.
    fn set_user_id(&self, id: &str) -> Result<()> {
        self.set(USER_ID, id)
    }
}

/// Process-local storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock()?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock()?.remove(key);
        Ok(())
    }
}

/// Storage in a TOML file.
///
/// The file is read once when opening and rewritten on every change. Ensure
/// that it is kept secure and not shared, as its tokens grant access to the
/// account. On Unix it is created readable by the owner only.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Session files hold a few tokens; anything larger is not ours.
    const MAX_FILE_SIZE: u64 = 64 * 1024;

    /// Opens the store at `path`. A missing file is an empty store; it is
    /// created on the first write.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the file exists but:
    /// - cannot be read
    /// - is larger than 64 KiB
    /// - is not a TOML table of strings
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match fs::metadata(&path) {
            Ok(attributes) => {
                // Prevent out-of-memory condition: session file should be small.
                if attributes.len() > Self::MAX_FILE_SIZE {
                    return Err(Error::out_of_range(format!(
                        "{} is too large",
                        path.display()
                    )));
                }

                let contents = fs::read_to_string(&path)?;
                toml::from_str::<BTreeMap<String, String>>(&contents).map_err(|e| {
                    Error::invalid_argument(format!("{} format is invalid: {e}", path.display()))
                })?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} does not exist yet", path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let contents = toml::to_string(entries)?;
        fs::write(&self.path, contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

impl TokenStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock()?;
        entries.insert(key.to_owned(), value.to_owned());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock()?;
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}
