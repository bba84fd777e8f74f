//! Container Invocation Layer (spec §4.4).
//!
//! The contract with the per-language container is kept behind the
//! narrowest possible interface — `run(subcommand, mounts, args, env_file)`
//! — so it can be stubbed deterministically in tests instead of shelling
//! out to a real container runtime.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};

use crate::state::PipelineConfig;

/// One bind mount passed to the container: host path -> container path,
/// read-only or read-write.
#[derive(Debug, Clone)]
pub struct Mount {
    pub host_path: PathBuf,
    pub container_path: String,
    pub read_only: bool,
}

impl Mount {
    pub fn new(host_path: impl Into<PathBuf>, container_path: impl Into<String>, read_only: bool) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
            read_only,
        }
    }
}

/// Narrow interface over "run this container subcommand". Production code
/// uses [`SubprocessRunner`]; tests substitute an in-memory fake.
pub trait ContainerRunner {
    fn run(
        &self,
        image: &str,
        subcommand: &str,
        mounts: &[Mount],
        args: &[String],
        env_file: Option<&Path>,
    ) -> Result<i32>;
}

/// Shells out to `docker run` (or an equivalent OCI runtime on `PATH`).
pub struct SubprocessRunner {
    pub program: String,
}

impl Default for SubprocessRunner {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
        }
    }
}

impl ContainerRunner for SubprocessRunner {
    fn run(
        &self,
        image: &str,
        subcommand: &str,
        mounts: &[Mount],
        args: &[String],
        env_file: Option<&Path>,
    ) -> Result<i32> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("run").arg("--rm");

        // Run as the current uid:gid so files the container writes are
        // owned by the caller. Not meaningful on platforms without a
        // uid/gid concept, so skipped there.
        #[cfg(unix)]
        {
            cmd.arg("--user")
                .arg(format!("{}:{}", run_id_command("-u"), run_id_command("-g")));
        }

        for mount in relocate_mounts(mounts) {
            let mode = if mount.read_only { "ro" } else { "rw" };
            cmd.arg("--mount").arg(format!(
                "type=bind,source={},target={},{}",
                mount.host_path.display(),
                mount.container_path,
                mode
            ));
        }

        if let Some(env_file) = env_file {
            cmd.arg("--env-file").arg(env_file);
        }

        cmd.arg(image).arg(subcommand).args(args);

        let status = cmd
            .status()
            .with_context(|| format!("spawning container for subcommand {subcommand}"))?;
        Ok(status.code().unwrap_or(-1))
    }
}

#[cfg(unix)]
fn run_id_command(flag: &str) -> u32 {
    Command::new("id")
        .arg(flag)
        .output()
        .ok()
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}

/// Mount relocation (spec §4.4): if both `KOKORO_ROOT_DIR` and
/// `KOKORO_HOST_ROOT_DIR` are set, every mount source prefixed by the
/// former is rewritten to the latter, to bridge sibling-container
/// execution.
fn relocate_mounts(mounts: &[Mount]) -> Vec<Mount> {
    let (Ok(root), Ok(host_root)) = (
        std::env::var("KOKORO_ROOT_DIR"),
        std::env::var("KOKORO_HOST_ROOT_DIR"),
    ) else {
        return mounts.to_vec();
    };

    mounts
        .iter()
        .map(|m| {
            let host_path = match m.host_path.strip_prefix(&root) {
                Ok(rest) => Path::new(&host_root).join(rest),
                Err(_) => m.host_path.clone(),
            };
            Mount {
                host_path,
                container_path: m.container_path.clone(),
                read_only: m.read_only,
            }
        })
        .collect()
}

/// RAII guard for the environment-file used to pass secrets into a
/// container invocation. Deletes the file on every exit path — success,
/// failure, or early return — per spec §9 ("environment-file lifetime").
pub struct EnvFileGuard {
    path: PathBuf,
}

impl EnvFileGuard {
    /// Writes `NAME=value` lines for resolved variables and
    /// `# No value for NAME` comments for absent ones.
    pub fn write(path: PathBuf, resolved: &BTreeMap<String, Option<String>>) -> Result<Self> {
        let mut contents = String::new();
        for (name, value) in resolved {
            match value {
                Some(v) => contents.push_str(&format!("{name}={v}\n")),
                None => contents.push_str(&format!("# No value for {name}\n")),
            }
        }
        std::fs::write(&path, contents)
            .with_context(|| format!("writing env file {}", path.display()))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for EnvFileGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// In-process secret lookup, cached for the lifetime of one command (spec
/// §9 "secrets caching"). Production secret resolution (Secret Manager) is
/// out of scope here; this models the request-scoped cache and the
/// resolution order the core demands.
#[derive(Default)]
pub struct SecretCache {
    cache: std::cell::RefCell<BTreeMap<String, String>>,
}

pub trait SecretLookup {
    fn lookup(&self, secret_name: &str) -> Result<Option<String>>;
}

impl SecretCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolution order (spec §4.4): process environment, then Secret
    /// Manager lookup by name (cached), then the descriptor's default.
    pub fn resolve(
        &self,
        name: &str,
        secret_name: Option<&str>,
        default_value: &str,
        lookup: &dyn SecretLookup,
    ) -> Result<Option<String>> {
        if let Ok(v) = std::env::var(name) {
            return Ok(Some(v));
        }

        if let Some(secret_name) = secret_name {
            if let Some(cached) = self.cache.borrow().get(secret_name) {
                return Ok(Some(cached.clone()));
            }
            if let Some(value) = lookup.lookup(secret_name)? {
                self.cache
                    .borrow_mut()
                    .insert(secret_name.to_string(), value.clone());
                return Ok(Some(value));
            }
        }

        if !default_value.is_empty() {
            return Ok(Some(default_value.to_string()));
        }

        Ok(None)
    }
}

/// Stand-in [`SecretLookup`] that never resolves a secret, used in
/// production since a real Secret Manager client is out of scope here
/// (spec §4.4 names the resolution order; it does not require vendoring a
/// Secret Manager API client). Descriptors with a `SecretName` but no
/// process-environment override fall through to their `DefaultValue`.
pub struct NullSecretLookup;

impl SecretLookup for NullSecretLookup {
    fn lookup(&self, _secret_name: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Resolves every environment variable declared for `subcommand` in
/// `config`, in declaration order.
pub fn resolve_env_for_subcommand(
    config: &PipelineConfig,
    subcommand: &str,
    cache: &SecretCache,
    lookup: &dyn SecretLookup,
) -> Result<BTreeMap<String, Option<String>>> {
    let mut resolved = BTreeMap::new();
    let Some(descriptors) = config.commands.get(subcommand) else {
        return Ok(resolved);
    };
    for descriptor in descriptors {
        let value = cache.resolve(
            &descriptor.name,
            descriptor.secret_name.as_deref(),
            &descriptor.default_value,
            lookup,
        )?;
        resolved.insert(descriptor.name.clone(), value);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::EnvVarDescriptor;
    use std::collections::BTreeMap as Map;

    struct FakeLookup(Map<String, String>);
    impl SecretLookup for FakeLookup {
        fn lookup(&self, secret_name: &str) -> Result<Option<String>> {
            Ok(self.0.get(secret_name).cloned())
        }
    }

    #[test]
    fn resolution_order_env_then_secret_then_default() {
        // No process env set for these names in this test process.
        let mut commands = std::collections::BTreeMap::new();
        commands.insert(
            "generate".to_string(),
            vec![
                EnvVarDescriptor {
                    name: "HAS_DEFAULT_ONLY".to_string(),
                    default_value: "fallback".to_string(),
                    secret_name: None,
                },
                EnvVarDescriptor {
                    name: "HAS_SECRET".to_string(),
                    default_value: String::new(),
                    secret_name: Some("my-secret".to_string()),
                },
                EnvVarDescriptor {
                    name: "HAS_NOTHING".to_string(),
                    default_value: String::new(),
                    secret_name: None,
                },
            ],
        );
        let config = PipelineConfig { commands };
        let cache = SecretCache::new();
        let mut secrets = Map::new();
        secrets.insert("my-secret".to_string(), "shh".to_string());
        let lookup = FakeLookup(secrets);

        let resolved = resolve_env_for_subcommand(&config, "generate", &cache, &lookup).unwrap();
        assert_eq!(resolved["HAS_DEFAULT_ONLY"].as_deref(), Some("fallback"));
        assert_eq!(resolved["HAS_SECRET"].as_deref(), Some("shh"));
        assert_eq!(resolved["HAS_NOTHING"], None);
    }

    #[test]
    fn env_file_guard_deletes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env-file");
        let mut resolved = Map::new();
        resolved.insert("PRESENT".to_string(), Some("1".to_string()));
        resolved.insert("ABSENT".to_string(), None);
        {
            let guard = EnvFileGuard::write(path.clone(), &resolved).unwrap();
            let contents = std::fs::read_to_string(guard.path()).unwrap();
            assert!(contents.contains("PRESENT=1"));
            assert!(contents.contains("# No value for ABSENT"));
        }
        assert!(!path.exists());
    }

    #[test]
    #[allow(unsafe_code)]
    fn mount_relocation_rewrites_kokoro_prefixed_sources() {
        // SAFETY: single-threaded test process, no concurrent env readers.
        unsafe {
            std::env::set_var("KOKORO_ROOT_DIR", "/tmpfs/src");
            std::env::set_var("KOKORO_HOST_ROOT_DIR", "/host/src");
        }
        let mounts = vec![Mount::new("/tmpfs/src/repo", "/repo", false)];
        let relocated = relocate_mounts(&mounts);
        assert_eq!(relocated[0].host_path, PathBuf::from("/host/src/repo"));
        unsafe {
            std::env::remove_var("KOKORO_ROOT_DIR");
            std::env::remove_var("KOKORO_HOST_ROOT_DIR");
        }
    }
}
