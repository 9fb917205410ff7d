use std::{
    collections::{BTreeMap, HashMap},
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::{
    io::AsyncWriteExt,
    sync::{Mutex, RwLock},
};

use crate::{
    domain::ScopeId,
    errors::Error,
    store::{validate_name, validate_response, CommandDefinition, CommandStore},
    utils::iso_timestamp_utc,
    Result,
};

const FILE_EXT: &str = "json";

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredCommand {
    response: String,
    created_at: String,
    updated_at: String,
}

type Commands = BTreeMap<String, StoredCommand>;

#[derive(Debug, Deserialize)]
struct ScopeFile {
    scope: ScopeId,
    #[serde(default)]
    commands: Commands,
}

#[derive(Serialize)]
struct ScopeFileRef<'a> {
    scope: &'a ScopeId,
    commands: &'a Commands,
}

/// Custom commands stored as one JSON document per scope.
///
/// Files are named by the SHA-256 of the scope id, so room ids never reach the
/// filesystem as path components. Each document repeats its scope id so the
/// store can be enumerated on startup.
///
/// Every scope is guarded by its own `RwLock`: lookups share it, mutations hold
/// it exclusively across the write. Writes land in a temp file that is then
/// renamed over the old document.
pub struct JsonFileStore {
    dir: PathBuf,
    scopes: Mutex<HashMap<ScopeId, Arc<RwLock<Commands>>>>,
}

impl JsonFileStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::persistence(&dir, e))?;

        Ok(Self {
            dir,
            scopes: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, scope: &ScopeId) -> PathBuf {
        self.dir
            .join(format!("{}.{FILE_EXT}", scope_digest(scope)))
    }

    async fn scope_state(&self, scope: &ScopeId) -> Result<Arc<RwLock<Commands>>> {
        if let Some(state) = self.scopes.lock().await.get(scope) {
            return Ok(state.clone());
        }

        // Load without holding the map lock so other scopes are not blocked on
        // this disk read. A racing loader may also read; the first insert wins.
        let path = self.path_for(scope);
        let commands = match read_scope_file(&path).await? {
            Some(file) if &file.scope == scope => file.commands,
            Some(file) => {
                return Err(Error::persistence(
                    &path,
                    format!("file belongs to scope {}, expected {scope}", file.scope),
                ))
            }
            None => Commands::new(),
        };

        let mut map = self.scopes.lock().await;
        let state = map
            .entry(scope.clone())
            .or_insert_with(|| Arc::new(RwLock::new(commands)));
        Ok(state.clone())
    }

    /// Apply `change` to a copy of the scope, persist it, then publish it.
    ///
    /// A failed validation or write leaves both disk and memory untouched.
    async fn mutate<F>(&self, scope: &ScopeId, change: F) -> Result<()>
    where
        F: FnOnce(&mut Commands) -> Result<()> + Send,
    {
        let state = self.scope_state(scope).await?;
        let mut guard = state.write().await;

        let mut next = guard.clone();
        change(&mut next)?;
        self.write_scope(scope, &next).await?;

        *guard = next;
        Ok(())
    }

    async fn write_scope(&self, scope: &ScopeId, commands: &Commands) -> Result<()> {
        let path = self.path_for(scope);
        let tmp = path.with_extension(format!("{FILE_EXT}.tmp"));

        let txt = serde_json::to_string_pretty(&ScopeFileRef { scope, commands })
            .map_err(|e| Error::persistence(&path, e))?;
        write_synced(&tmp, txt.as_bytes())
            .await
            .map_err(|e| Error::persistence(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::persistence(&path, e))?;

        tracing::debug!(scope = %scope, commands = commands.len(), "saved custom commands");
        Ok(())
    }

    /// Scope ids of every document on disk.
    async fn stored_scopes(&self) -> Result<Vec<ScopeId>> {
        let mut rd = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| Error::persistence(&self.dir, e))?;

        let mut out = Vec::new();
        while let Some(ent) = rd
            .next_entry()
            .await
            .map_err(|e| Error::persistence(&self.dir, e))?
        {
            let path = ent.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXT) {
                continue;
            }
            let Some(file) = read_scope_file(&path).await? else {
                continue;
            };
            if self.path_for(&file.scope) != path {
                tracing::warn!(path = %path.display(), "ignoring command file with mismatched name");
                continue;
            }
            out.push(file.scope);
        }

        out.sort();
        Ok(out)
    }
}

#[async_trait]
impl CommandStore for JsonFileStore {
    async fn add(&self, scope: &ScopeId, name: &str, response: &str) -> Result<()> {
        validate_name(name)?;
        validate_response(response)?;

        self.mutate(scope, |commands| {
            if commands.contains_key(name) {
                return Err(Error::DuplicateName(format!("{name} in scope {scope}")));
            }
            let now = iso_timestamp_utc();
            commands.insert(
                name.to_string(),
                StoredCommand {
                    response: response.to_string(),
                    created_at: now.clone(),
                    updated_at: now,
                },
            );
            Ok(())
        })
        .await
    }

    async fn modify(&self, scope: &ScopeId, name: &str, response: &str) -> Result<()> {
        validate_response(response)?;

        self.mutate(scope, |commands| {
            let Some(cmd) = commands.get_mut(name) else {
                return Err(Error::NotFound(format!("{name} in scope {scope}")));
            };
            cmd.response = response.to_string();
            cmd.updated_at = iso_timestamp_utc();
            Ok(())
        })
        .await
    }

    async fn remove(&self, scope: &ScopeId, name: &str) -> Result<()> {
        self.mutate(scope, |commands| {
            commands
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| Error::NotFound(format!("{name} in scope {scope}")))
        })
        .await
    }

    async fn lookup(&self, scope: &ScopeId, name: &str) -> Result<Option<String>> {
        let state = self.scope_state(scope).await?;
        let guard = state.read().await;
        Ok(guard.get(name).map(|c| c.response.clone()))
    }

    async fn list(&self, scope: &ScopeId) -> Result<Vec<String>> {
        let state = self.scope_state(scope).await?;
        let guard = state.read().await;
        Ok(guard.keys().cloned().collect())
    }

    async fn all(&self) -> Result<Vec<CommandDefinition>> {
        let mut out = Vec::new();
        for scope in self.stored_scopes().await? {
            let state = self.scope_state(&scope).await?;
            let guard = state.read().await;
            out.extend(guard.iter().map(|(name, cmd)| CommandDefinition {
                scope: scope.clone(),
                name: name.clone(),
                response: cmd.response.clone(),
            }));
        }
        Ok(out)
    }
}

/// Write `bytes` to `path` and fsync before returning, so a later rename
/// never publishes a file whose contents are still in the page cache.
async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

/// `None` when the scope has no document yet. An empty document is never
/// written by the store, so it is reported as corrupt rather than read as
/// "no commands".
async fn read_scope_file(path: &Path) -> Result<Option<ScopeFile>> {
    let txt = match tokio::fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::persistence(path, e)),
    };
    if txt.trim().is_empty() {
        return Err(Error::persistence(path, "empty command document"));
    }
    serde_json::from_str(&txt)
        .map(Some)
        .map_err(|e| Error::persistence(path, e))
}

fn scope_digest(scope: &ScopeId) -> String {
    use std::fmt::Write;

    let mut h = Sha256::new();
    h.update(scope.as_str().as_bytes());
    let digest = h.finalize();

    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest.iter() {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
