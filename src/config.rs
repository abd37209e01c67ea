use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::AddressName;

/// Persisted session state: credentials plus the handful of cache seeds
/// (pins, local blocks) that survive restarts outside the record store.
///
/// A missing file is an anonymous session, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
  /// Account API token. Empty when signed out.
  #[serde(default)]
  pub auth_key: String,
  /// The address the user is acting as.
  #[serde(default)]
  pub acting_address: AddressName,
  /// Addresses known to belong to the account, kept for offline startup.
  #[serde(default)]
  pub local_addresses: Vec<AddressName>,
  #[serde(default)]
  pub pinned: Vec<AddressName>,
  #[serde(default)]
  pub local_blocked: Vec<AddressName>,
}

impl Session {
  pub fn signed_in(&self) -> bool {
    !self.auth_key.is_empty()
  }

  /// Load session state.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. $XDG_CONFIG_HOME/omgdata/session.yaml
  /// 3. ~/.config/omgdata/session.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = match explicit_path {
      Some(p) => p.to_path_buf(),
      None => match Self::default_path() {
        Some(p) => p,
        None => return Ok(Self::default()),
      },
    };

    if !path.exists() {
      return Ok(Self::default());
    }
    Self::load_from_path(&path)
  }

  pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("omgdata").join("session.yaml"))
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read session file {}: {}", path.display(), e))?;

    let session: Session = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse session file {}: {}", path.display(), e))?;

    Ok(session)
  }

  pub fn save(&self, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create {}: {}", parent.display(), e))?;
    }
    let contents = serde_yaml::to_string(self)?;
    std::fs::write(path, contents)
      .map_err(|e| eyre!("Failed to write session file {}: {}", path.display(), e))?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_missing_file_is_anonymous_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.yaml");

    let session = Session::load(Some(&path)).unwrap();

    assert_eq!(session, Session::default());
    assert!(!session.signed_in());
  }

  #[test]
  fn test_save_and_reload_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("session.yaml");

    let session = Session {
      auth_key: "token".into(),
      acting_address: "somebody".into(),
      local_addresses: vec!["somebody".into()],
      pinned: vec!["friend".into()],
      local_blocked: vec!["spammer".into()],
    };
    session.save(&path).unwrap();

    let loaded = Session::load(Some(&path)).unwrap();
    assert_eq!(loaded, session);
  }

  #[test]
  fn test_partial_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.yaml");
    std::fs::write(&path, "acting_address: somebody\n").unwrap();

    let session = Session::load(Some(&path)).unwrap();

    assert_eq!(session.acting_address, "somebody");
    assert!(session.auth_key.is_empty());
    assert!(session.pinned.is_empty());
  }
}
