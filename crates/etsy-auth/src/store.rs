//! Durable storage for the single token record
//!
//! The store holds at most one `TokenRecord`. Saving replaces it outright.
//! A missing record is a normal state ("not yet authenticated"), reported
//! as `Ok(None)` rather than an error.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::token::TokenRecord;

/// Backing storage for the token manager.
///
/// Uses `Pin<Box<dyn Future>>` return types so the manager can hold an
/// `Arc<dyn TokenStore>` and tests can swap in `MemoryTokenStore`.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Pin<Box<dyn Future<Output = Result<Option<TokenRecord>>> + Send + '_>>;

    fn save<'a>(
        &'a self,
        record: &'a TokenRecord,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// JSON file store. Writes use temp file + rename so readers never see a
/// half-written record.
pub struct FileTokenStore {
    path: PathBuf,
    /// Serializes saves; concurrent writers would share the temp path
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Pin<Box<dyn Future<Output = Result<Option<TokenRecord>>> + Send + '_>> {
        Box::pin(async move {
            let contents = match tokio::fs::read_to_string(&self.path).await {
                Ok(c) => c,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %self.path.display(), "token file not found");
                    return Ok(None);
                }
                Err(e) => return Err(Error::Io(format!("reading token file: {e}"))),
            };

            let record: TokenRecord = serde_json::from_str(&contents)
                .map_err(|e| Error::TokenParse(format!("parsing token file: {e}")))?;
            Ok(Some(record))
        })
    }

    fn save<'a>(
        &'a self,
        record: &'a TokenRecord,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            write_atomic(&self.path, record).await?;
            info!(path = %self.path.display(), "token saved");
            Ok(())
        })
    }
}

/// In-memory store for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryTokenStore {
    record: Mutex<Option<TokenRecord>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: TokenRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Pin<Box<dyn Future<Output = Result<Option<TokenRecord>>> + Send + '_>> {
        Box::pin(async move { Ok(self.record.lock().await.clone()) })
    }

    fn save<'a>(
        &'a self,
        record: &'a TokenRecord,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            *self.record.lock().await = Some(record.clone());
            Ok(())
        })
    }
}

/// Write the record to `path` atomically.
///
/// The temp file sits in the same directory so the rename stays on one
/// filesystem. Mode is 0600 on unix since the file holds live tokens.
async fn write_atomic(path: &Path, record: &TokenRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record)
        .map_err(|e| Error::TokenParse(format!("serializing token: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("token path has no parent directory".into()))?;
    if !dir.as_os_str().is_empty() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::Io(format!("creating token directory: {e}")))?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Io("token path has no file name".into()))?
        .to_string_lossy();
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted token file");
    Ok(())
}
