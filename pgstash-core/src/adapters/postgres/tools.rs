//! Locating the PostgreSQL client binaries.
//!
//! Several major versions are often installed side by side. `pg_dump` refuses
//! to dump a server newer than itself, so the newest installed version wins.

use crate::{Result, error::PgStashError};
use serde::Serialize;
use std::cmp::Ordering;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Client programs pgstash drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PgTool {
    /// Produces backups
    PgDump,
    /// Replays custom-format archives
    PgRestore,
    /// Replays plain SQL scripts
    Psql,
}

impl PgTool {
    /// Program name without any platform suffix.
    pub fn name(self) -> &'static str {
        match self {
            Self::PgDump => "pg_dump",
            Self::PgRestore => "pg_restore",
            Self::Psql => "psql",
        }
    }

    /// File name of the executable on this platform.
    pub fn binary_name(self) -> String {
        format!("{}{}", self.name(), std::env::consts::EXE_SUFFIX)
    }
}

impl std::fmt::Display for PgTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A dotted numeric version such as `9.6` or `16`, compared component-wise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolVersion(Vec<u32>);

impl ToolVersion {
    /// Parses `16`, `9.6` or `15.4`. Anything else yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        if text.is_empty() {
            return None;
        }
        text.split('.')
            .map(|part| part.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    /// Version components, most significant first
    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl Ord for ToolVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for ToolVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

/// A directory whose children are per-version installations named
/// `<prefix><version>`, each with a `bin/` subdirectory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRoot {
    parent: PathBuf,
    prefix: &'static str,
}

impl InstallRoot {
    /// Creates a root searched for `<parent>/<prefix><version>/bin`.
    pub fn new(parent: impl Into<PathBuf>, prefix: &'static str) -> Self {
        Self {
            parent: parent.into(),
            prefix,
        }
    }

    /// Installations below this root that ship `pg_restore`.
    fn installations(&self) -> Vec<(ToolVersion, PathBuf)> {
        let Ok(entries) = std::fs::read_dir(&self.parent) else {
            return Vec::new();
        };

        entries
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| {
                let file_name = entry.file_name();
                let version = file_name
                    .to_str()
                    .and_then(|name| name.strip_prefix(self.prefix))
                    .and_then(ToolVersion::parse)?;
                let bin_dir = entry.path().join("bin");
                has_tool(&bin_dir, PgTool::PgRestore).then_some((version, bin_dir))
            })
            .collect()
    }
}

/// Installation layouts used by common packagers.
pub fn default_install_roots() -> Vec<InstallRoot> {
    vec![
        // Debian and Ubuntu
        InstallRoot::new("/usr/lib/postgresql", ""),
        // PGDG RPMs
        InstallRoot::new("/usr", "pgsql-"),
        InstallRoot::new("/usr/local", "pgsql-"),
        // Homebrew
        InstallRoot::new("/opt/homebrew/opt", "postgresql@"),
        InstallRoot::new("/usr/local/opt", "postgresql@"),
        InstallRoot::new("/Applications/Postgres.app/Contents/Versions", ""),
    ]
}

fn has_tool(dir: &Path, tool: PgTool) -> bool {
    is_executable(&dir.join(tool.binary_name()))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// The directory holding `pg_dump`, `pg_restore` and `psql`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgTools {
    bin_dir: PathBuf,
}

impl PgTools {
    /// Uses `bin_dir` without checking it.
    pub fn from_dir(bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
        }
    }

    /// Finds the client tools on this machine.
    ///
    /// # Errors
    /// Returns `ToolNotFound` when no candidate directory holds `pg_restore`.
    pub fn locate(override_dir: Option<&Path>) -> Result<Self> {
        if let Some(dir) = override_dir {
            return Self::locate_in(Some(dir), &[], None);
        }
        Self::locate_in(None, &default_install_roots(), std::env::var_os("PATH"))
    }

    /// Finds the client tools using the given override, install roots and
    /// `PATH` value.
    ///
    /// # Errors
    /// Returns `ToolNotFound` when no candidate directory holds `pg_restore`.
    pub fn locate_in(
        override_dir: Option<&Path>,
        roots: &[InstallRoot],
        path_var: Option<OsString>,
    ) -> Result<Self> {
        if let Some(dir) = override_dir {
            if has_tool(dir, PgTool::PgRestore) {
                tracing::debug!("Using client tools from {}", dir.display());
                return Ok(Self::from_dir(dir));
            }
            tracing::error!("No {} in {}", PgTool::PgRestore, dir.display());
            return Err(PgStashError::ToolNotFound {
                tool: format!("{} in {}", PgTool::PgRestore, dir.display()),
            });
        }

        let newest = roots
            .iter()
            .flat_map(InstallRoot::installations)
            .max_by(|(a, _), (b, _)| a.cmp(b));
        if let Some((version, bin_dir)) = newest {
            tracing::debug!(
                "Using PostgreSQL {} client tools from {}",
                version,
                bin_dir.display()
            );
            return Ok(Self::from_dir(bin_dir));
        }

        if let Some(path_var) = path_var
            && let Some(dir) =
                std::env::split_paths(&path_var).find(|dir| has_tool(dir, PgTool::PgRestore))
        {
            tracing::debug!("Using client tools from PATH entry {}", dir.display());
            return Ok(Self::from_dir(dir));
        }

        Err(PgStashError::ToolNotFound {
            tool: PgTool::PgRestore.to_string(),
        })
    }

    /// Directory the tools run from
    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    /// Full path to `tool`.
    pub fn path(&self, tool: PgTool) -> PathBuf {
        self.bin_dir.join(tool.binary_name())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn install(bin_dir: &Path, tools: &[PgTool]) {
        std::fs::create_dir_all(bin_dir).unwrap();
        for tool in tools {
            let path = bin_dir.join(tool.binary_name());
            std::fs::write(&path, "#!/bin/sh\n").unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    const ALL: &[PgTool] = &[PgTool::PgDump, PgTool::PgRestore, PgTool::Psql];

    #[test]
    fn test_version_ordering() {
        let v96 = ToolVersion::parse("9.6").unwrap();
        let v10 = ToolVersion::parse("10").unwrap();
        let v16 = ToolVersion::parse("16").unwrap();
        assert!(v96 < v10);
        assert!(v10 < v16);
        assert_eq!(v96.to_string(), "9.6");

        assert!(ToolVersion::parse("").is_none());
        assert!(ToolVersion::parse("main").is_none());
        assert!(ToolVersion::parse("16beta1").is_none());
    }

    #[test]
    fn test_binary_names() {
        assert!(PgTool::PgDump.binary_name().starts_with("pg_dump"));
        assert!(PgTool::PgRestore.binary_name().starts_with("pg_restore"));
        assert!(PgTool::Psql.binary_name().starts_with("psql"));
    }

    #[test]
    fn test_highest_version_wins() {
        let temp = TempDir::new().unwrap();
        let debian = temp.path().join("lib/postgresql");
        install(&debian.join("9.6/bin"), ALL);
        install(&debian.join("16/bin"), ALL);
        install(&debian.join("12/bin"), ALL);

        let roots = vec![InstallRoot::new(&debian, "")];
        let tools = PgTools::locate_in(None, &roots, None).unwrap();
        assert_eq!(tools.bin_dir(), debian.join("16/bin"));
        assert_eq!(tools.path(PgTool::Psql), debian.join("16/bin").join("psql"));
    }

    #[test]
    fn test_versions_compared_across_roots() {
        let temp = TempDir::new().unwrap();
        let debian = temp.path().join("lib/postgresql");
        let brew = temp.path().join("homebrew/opt");
        install(&debian.join("14/bin"), ALL);
        install(&brew.join("postgresql@15/bin"), ALL);
        // Not a versioned installation
        install(&brew.join("postgresql/bin"), ALL);

        let roots = vec![
            InstallRoot::new(&debian, ""),
            InstallRoot::new(&brew, "postgresql@"),
        ];
        let tools = PgTools::locate_in(None, &roots, None).unwrap();
        assert_eq!(tools.bin_dir(), brew.join("postgresql@15/bin"));
    }

    #[test]
    fn test_version_without_pg_restore_is_skipped() {
        let temp = TempDir::new().unwrap();
        let debian = temp.path().join("lib/postgresql");
        install(&debian.join("13/bin"), ALL);
        install(&debian.join("17/bin"), &[PgTool::Psql]);

        let roots = vec![InstallRoot::new(&debian, "")];
        let tools = PgTools::locate_in(None, &roots, None).unwrap();
        assert_eq!(tools.bin_dir(), debian.join("13/bin"));
    }

    #[test]
    fn test_non_executable_is_ignored() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("pg_restore"), "not a program").unwrap();
        std::fs::set_permissions(bin.join("pg_restore"), std::fs::Permissions::from_mode(0o644))
            .unwrap();

        let result = PgTools::locate_in(Some(&bin), &[], None);
        assert!(matches!(result, Err(PgStashError::ToolNotFound { .. })));
    }

    #[test]
    fn test_override_takes_precedence() {
        let temp = TempDir::new().unwrap();
        let debian = temp.path().join("lib/postgresql");
        let custom = temp.path().join("custom/bin");
        install(&debian.join("16/bin"), ALL);
        install(&custom, ALL);

        let roots = vec![InstallRoot::new(&debian, "")];
        let tools = PgTools::locate_in(Some(&custom), &roots, None).unwrap();
        assert_eq!(tools.bin_dir(), custom);
    }

    #[test]
    fn test_override_without_tools_fails() {
        let temp = TempDir::new().unwrap();
        let error = PgTools::locate_in(Some(temp.path()), &[], None).unwrap_err();
        assert!(matches!(error, PgStashError::ToolNotFound { .. }));
        assert!(error.to_string().contains("pg_restore"));
    }

    #[test]
    fn test_falls_back_to_path() {
        let temp = TempDir::new().unwrap();
        let empty = temp.path().join("empty");
        let on_path = temp.path().join("usr/bin");
        std::fs::create_dir_all(&empty).unwrap();
        install(&on_path, ALL);

        let path_var = std::env::join_paths([&empty, &on_path]).unwrap();
        let roots = vec![InstallRoot::new(temp.path().join("missing"), "")];
        let tools = PgTools::locate_in(None, &roots, Some(path_var)).unwrap();
        assert_eq!(tools.bin_dir(), on_path);
    }

    #[test]
    fn test_nothing_found() {
        let temp = TempDir::new().unwrap();
        let roots = vec![InstallRoot::new(temp.path(), "")];
        let error = PgTools::locate_in(None, &roots, Some(OsString::new())).unwrap_err();
        assert!(matches!(error, PgStashError::ToolNotFound { .. }));
    }
}
