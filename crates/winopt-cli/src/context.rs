//! Invocation context: resolved configuration and the host backend
//!
//! Commands never touch the machine directly. They get a [`HostHandle`] from
//! here, which is either the running Windows installation or a simulated
//! host loaded from a `--host-state` document and saved back afterwards.

use std::path::{Path, PathBuf};

use winopt_core::{ConfigResolver, ExecutionMode, Host, MemoryHost, ResolvedConfig};

use crate::error::{CliError, Result};

/// Working directory plus the optional global config override
#[derive(Debug, Clone)]
pub struct Context {
    cwd: PathBuf,
    config_dir: Option<PathBuf>,
}

impl Context {
    pub fn new(cwd: impl Into<PathBuf>, config_dir: Option<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            config_dir,
        }
    }

    fn resolver(&self) -> ConfigResolver {
        match &self.config_dir {
            Some(dir) => ConfigResolver::with_global_config_dir(self.cwd.clone(), dir.clone()),
            None => ConfigResolver::new(self.cwd.clone()),
        }
    }

    /// Resolve defaults, the global layer and the local `winopt.toml`
    pub fn config(&self) -> Result<ResolvedConfig> {
        Ok(self.resolver().resolve()?)
    }

    /// Resolve a possibly relative path against the working directory
    pub fn path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}

/// The host a command runs against
pub enum HostHandle {
    /// Simulated host, saved back to `path` by [`HostHandle::persist`]
    Simulated { host: MemoryHost, path: PathBuf },
    #[cfg(windows)]
    Native(winopt_core::host::WindowsHost),
}

impl HostHandle {
    /// Pick the backend
    ///
    /// # Errors
    ///
    /// A missing or unreadable host state document, or no `--host-state` on
    /// a platform without a native backend, is a precondition failure.
    pub fn open(ctx: &Context, host_state: Option<&Path>) -> Result<Self> {
        match host_state {
            Some(path) => {
                let path = ctx.path(path);
                if !path.is_file() {
                    return Err(CliError::user(format!(
                        "Host state document {} does not exist",
                        path.display()
                    )));
                }
                let host = MemoryHost::load(&path).map_err(|e| {
                    CliError::user(format!("Cannot read host state {}: {}", path.display(), e))
                })?;
                tracing::debug!(?path, "Using simulated host");
                Ok(HostHandle::Simulated { host, path })
            }
            None => Self::native(),
        }
    }

    #[cfg(windows)]
    fn native() -> Result<Self> {
        Ok(HostHandle::Native(winopt_core::host::WindowsHost::new()))
    }

    #[cfg(not(windows))]
    fn native() -> Result<Self> {
        Err(CliError::user(
            "No host backend is available on this platform; pass --host-state <PATH>",
        ))
    }

    pub fn host(&self) -> &dyn Host {
        match self {
            HostHandle::Simulated { host, .. } => host,
            #[cfg(windows)]
            HostHandle::Native(host) => host,
        }
    }

    pub fn host_mut(&mut self) -> &mut dyn Host {
        match self {
            HostHandle::Simulated { host, .. } => host,
            #[cfg(windows)]
            HostHandle::Native(host) => host,
        }
    }

    /// Commit mode on a host that needs elevation requires an elevated process
    pub fn ensure_can_commit(&self, mode: ExecutionMode) -> Result<()> {
        let host = self.host();
        if mode == ExecutionMode::Commit && host.requires_elevation() && !host.is_elevated() {
            return Err(CliError::user(
                "Commit mode needs administrator rights; re-run from an elevated prompt or use --dry-run",
            ));
        }
        Ok(())
    }

    /// Save a simulated host back to its document
    pub fn persist(&self) -> Result<()> {
        if let HostHandle::Simulated { host, path } = self {
            host.save(path)?;
        }
        Ok(())
    }
}
