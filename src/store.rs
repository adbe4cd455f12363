use log::debug;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// A named TOTP seed. `key` is Base32.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    pub key: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot access secret store {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("secret store {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("a secret named '{0}' already exists")]
    DuplicateName(String),
    #[error("no secret named '{0}'")]
    NotFound(String),
}

/// Flat JSON file holding the secrets in insertion order.
#[derive(Debug, Clone)]
pub struct SecretStore {
    path: PathBuf,
}

impl SecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty store; unreadable content is an error.
    pub fn load(&self) -> Result<Vec<Secret>, StoreError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no secret store at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let secrets: Vec<Secret> =
            serde_json::from_str(&data).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        debug!("loaded {} secrets from {}", secrets.len(), self.path.display());
        Ok(secrets)
    }

    pub fn save(&self, secrets: &[Secret]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        // serializing plain strings cannot fail
        let s = serde_json::to_string_pretty(secrets).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, s).map_err(io_err)?;
        debug!("saved {} secrets to {}", secrets.len(), self.path.display());
        Ok(())
    }

    /// Appends `secret`, refusing a name that is already stored.
    pub fn add(&self, secret: Secret) -> Result<Vec<Secret>, StoreError> {
        let mut secrets = self.load()?;
        if secrets.iter().any(|s| s.name == secret.name) {
            return Err(StoreError::DuplicateName(secret.name));
        }
        secrets.push(secret);
        self.save(&secrets)?;
        Ok(secrets)
    }

    pub fn remove(&self, name: &str) -> Result<Vec<Secret>, StoreError> {
        let mut secrets = self.load()?;
        let before = secrets.len();
        secrets.retain(|s| s.name != name);
        if secrets.len() == before {
            return Err(StoreError::NotFound(name.to_string()));
        }
        self.save(&secrets)?;
        Ok(secrets)
    }
}

/// Read-through view of a [`SecretStore`] that serves a loaded copy for
/// `ttl` before reading the file again. Writes refresh the copy at once.
#[derive(Debug)]
pub struct CachedStore {
    store: SecretStore,
    ttl: Duration,
    cached: Option<(Instant, Vec<Secret>)>,
}

impl CachedStore {
    pub fn new(store: SecretStore, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cached: None,
        }
    }

    pub fn secrets(&mut self) -> Result<Vec<Secret>, StoreError> {
        if let Some((loaded_at, secrets)) = &self.cached {
            if loaded_at.elapsed() < self.ttl {
                return Ok(secrets.clone());
            }
        }

        let secrets = self.store.load()?;
        self.cached = Some((Instant::now(), secrets.clone()));
        Ok(secrets)
    }

    pub fn add(&mut self, secret: Secret) -> Result<(), StoreError> {
        let secrets = self.store.add(secret)?;
        self.cached = Some((Instant::now(), secrets));
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<(), StoreError> {
        let secrets = self.store.remove(name)?;
        self.cached = Some((Instant::now(), secrets));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(name: &str) -> Secret {
        Secret {
            name: name.to_string(),
            key: "JBSWY3DPEHPK3PXP".to_string(),
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SecretStore::new(dir.path().join("nested").join("config.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = SecretStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn add_keeps_insertion_order_and_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = SecretStore::new(dir.path().join(".crotp").join("config.json"));

        store.add(secret("github")).unwrap();
        store.add(secret("aws")).unwrap();
        store.add(secret("mail")).unwrap();

        let names: Vec<_> = store.load().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["github", "aws", "mail"]);
    }

    #[test]
    fn file_format_is_array_of_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"[{"name":"work","key":"JBSWY3DPEHPK3PXP"}]"#).unwrap();

        let secrets = SecretStore::new(&path).load().unwrap();
        assert_eq!(secrets, vec![secret("work")]);
    }

    #[test]
    fn add_rejects_duplicate_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = SecretStore::new(dir.path().join("config.json"));
        store.add(secret("github")).unwrap();

        let err = store.add(secret("github")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateName(name) if name == "github"));
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn remove_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = SecretStore::new(dir.path().join("config.json"));
        store.add(secret("github")).unwrap();
        store.add(secret("aws")).unwrap();

        let left = store.remove("github").unwrap();
        assert_eq!(left, vec![secret("aws")]);
        assert!(matches!(
            store.remove("github"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn cached_store_serves_copy_within_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let store = SecretStore::new(dir.path().join("config.json"));
        let mut cached = CachedStore::new(store.clone(), Duration::from_secs(60));

        assert!(cached.secrets().unwrap().is_empty());
        // written behind the cache's back
        store.add(secret("github")).unwrap();
        assert!(cached.secrets().unwrap().is_empty());

        // written through the cache
        cached.add(secret("aws")).unwrap();
        assert_eq!(cached.secrets().unwrap().len(), 2);
        cached.remove("github").unwrap();
        assert_eq!(cached.secrets().unwrap(), vec![secret("aws")]);
    }

    #[test]
    fn cached_store_reloads_after_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let store = SecretStore::new(dir.path().join("config.json"));
        let mut cached = CachedStore::new(store.clone(), Duration::ZERO);

        assert!(cached.secrets().unwrap().is_empty());
        store.add(secret("github")).unwrap();
        assert_eq!(cached.secrets().unwrap(), vec![secret("github")]);
    }
}
