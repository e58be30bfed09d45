//! Path-scope permissions carried by tokens.
//!
//! A token may restrict which paths it can write or delete. Six scope kinds
//! exist, in exact-path and prefix flavors; the archival kinds additionally
//! switch the whole principal into archival write semantics. A missing kind
//! means "unrestricted for that action".

use serde::{Deserialize, Serialize};

use super::AuthError;

/// Upper bound on scope entries per token.
pub const MAX_SCOPES: usize = 8;

/// The six scope kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    PutFile,
    PutFilePrefix,
    DeleteFile,
    DeleteFilePrefix,
    PutFileArchival,
    PutFileArchivalPrefix,
}

impl ScopeKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "putFile" => Some(Self::PutFile),
            "putFilePrefix" => Some(Self::PutFilePrefix),
            "deleteFile" => Some(Self::DeleteFile),
            "deleteFilePrefix" => Some(Self::DeleteFilePrefix),
            "putFileArchival" => Some(Self::PutFileArchival),
            "putFileArchivalPrefix" => Some(Self::PutFileArchivalPrefix),
            _ => None,
        }
    }
}

/// A scope entry as it appears on the wire: `{"scope": kind, "domain": path}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeEntry {
    pub scope: String,
    pub domain: String,
}

/// Scope lists extracted from a verified token, keyed by action kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthScopes {
    pub put_paths: Vec<String>,
    pub put_prefixes: Vec<String>,
    pub delete_paths: Vec<String>,
    pub delete_prefixes: Vec<String>,
    pub archival_paths: Vec<String>,
    pub archival_prefixes: Vec<String>,
}

impl AuthScopes {
    /// Validate and bucket raw wire entries.
    pub fn from_entries(entries: &[ScopeEntry]) -> Result<Self, AuthError> {
        if entries.len() > MAX_SCOPES {
            return Err(AuthError::BadScope(format!(
                "too many scope entries ({} > {MAX_SCOPES})",
                entries.len()
            )));
        }
        let mut scopes = AuthScopes::default();
        for entry in entries {
            let kind = ScopeKind::parse(&entry.scope)
                .ok_or_else(|| AuthError::BadScope(format!("unknown scope kind {:?}", entry.scope)))?;
            let path = entry.domain.clone();
            match kind {
                ScopeKind::PutFile => scopes.put_paths.push(path),
                ScopeKind::PutFilePrefix => scopes.put_prefixes.push(path),
                ScopeKind::DeleteFile => scopes.delete_paths.push(path),
                ScopeKind::DeleteFilePrefix => scopes.delete_prefixes.push(path),
                ScopeKind::PutFileArchival => scopes.archival_paths.push(path),
                ScopeKind::PutFileArchivalPrefix => scopes.archival_prefixes.push(path),
            }
        }
        Ok(scopes)
    }

    /// Any archival scope switches every write under the principal into
    /// archival semantics.
    pub fn is_archival_restricted(&self) -> bool {
        !self.archival_paths.is_empty() || !self.archival_prefixes.is_empty()
    }

    /// Whether these scopes permit writing `path`. Archival kinds count as
    /// write scopes.
    pub fn allows_write(&self, path: &str) -> bool {
        if self.put_paths.is_empty()
            && self.put_prefixes.is_empty()
            && self.archival_paths.is_empty()
            && self.archival_prefixes.is_empty()
        {
            return true;
        }
        self.put_prefixes
            .iter()
            .chain(&self.archival_prefixes)
            .any(|prefix| path.starts_with(prefix.as_str()))
            || self
                .put_paths
                .iter()
                .chain(&self.archival_paths)
                .any(|exact| exact == path)
    }

    /// Whether these scopes permit deleting `path`.
    pub fn allows_delete(&self, path: &str) -> bool {
        if self.delete_paths.is_empty() && self.delete_prefixes.is_empty() {
            return true;
        }
        self.delete_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
            || self.delete_paths.iter().any(|exact| exact == path)
    }
}
