//! [`TestWorkspace`] builder for end-to-end scenarios.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use winopt_core::{ConfigResolver, MemoryHost};
use winopt_core::config::LOCAL_CONFIG_FILE;

/// A temporary directory laid out like a winopt installation:
///
/// ```text
/// <tmp>/work/            working directory (local winopt.toml, host.toml)
/// <tmp>/config/          global config dir (config.toml)
/// <tmp>/config/profiles  profile documents
/// <tmp>/config/data      session, changes, log and rollback files
/// ```
///
/// # Example
///
/// ```rust,no_run
/// use winopt_test_utils::{TestWorkspace, telemetry_host};
///
/// let ws = TestWorkspace::new();
/// ws.write_profile("dev", "keep = [\"Telemetry-X\"]\n");
/// ws.write_host(&telemetry_host());
/// ws.assert_data_file_count("_rollback.toml", 0);
/// ```
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    /// Create the directory skeleton.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("work")).unwrap();
        fs::create_dir_all(temp_dir.path().join("config").join("profiles")).unwrap();
        Self { temp_dir }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Working directory for CLI runs.
    pub fn work_dir(&self) -> PathBuf {
        self.root().join("work")
    }

    /// Global config directory; pass it as `WINOPT_CONFIG_DIR`.
    pub fn config_dir(&self) -> PathBuf {
        self.root().join("config")
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.config_dir().join("profiles")
    }

    /// Default data directory under the global config directory.
    pub fn data_dir(&self) -> PathBuf {
        self.config_dir().join("data")
    }

    /// Host state document in the working directory.
    pub fn host_state(&self) -> PathBuf {
        self.work_dir().join("host.toml")
    }

    /// Resolver bound to this workspace.
    pub fn resolver(&self) -> ConfigResolver {
        ConfigResolver::with_global_config_dir(self.work_dir(), self.config_dir())
    }

    /// Write `<profiles>/<name>.toml`.
    pub fn write_profile(&self, name: &str, content: &str) -> PathBuf {
        let path = self.profiles_dir().join(format!("{}.toml", name));
        fs::write(&path, content).unwrap();
        path
    }

    /// Write the local `winopt.toml`.
    pub fn write_local_config(&self, content: &str) {
        fs::write(self.work_dir().join(LOCAL_CONFIG_FILE), content).unwrap();
    }

    /// Write the global `config.toml`.
    pub fn write_global_config(&self, content: &str) {
        fs::write(self.config_dir().join("config.toml"), content).unwrap();
    }

    pub fn write_host(&self, host: &MemoryHost) {
        host.save(&self.host_state()).unwrap();
    }

    pub fn read_host(&self) -> MemoryHost {
        MemoryHost::load(&self.host_state()).unwrap()
    }

    /// Files in the data directory whose name ends with `suffix`, sorted.
    pub fn data_files(&self, suffix: &str) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(self.data_dir()) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(suffix))
            })
            .collect();
        files.sort();
        files
    }

    /// Assert how many data files end with `suffix`.
    ///
    /// # Panics
    /// Panics with the files found when the count differs.
    pub fn assert_data_file_count(&self, suffix: &str, expected: usize) {
        let files = self.data_files(suffix);
        assert_eq!(
            files.len(),
            expected,
            "Expected {} file(s) ending with {} in {}, found: {:?}",
            expected,
            suffix,
            self.data_dir().display(),
            files
        );
    }
}
