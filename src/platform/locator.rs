//! Installed platform lookup. Maps a requested version to an executable path.
//!
//! Each root directory holds one subdirectory per installed version
//! (`<root>/8.3.15.1232/bin/1cv8.exe`) plus a few non-version entries that are
//! always skipped. Roots are searched in order and the first match wins.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{DesignerError, Result};
use crate::platform::version::PlatformVersion;

/// Directory names under an installation root that never hold a version.
pub const RESERVED_DIRS: &[&str] = &["common", "conf"];

/// Installation directory name under each Windows program-files root.
pub const INSTALL_DIR_NAME: &str = "1cv8";

/// Environment variables naming the Windows program-files roots, in search order.
pub const ROOT_ENV_VARS: &[&str] = &["ProgramW6432", "ProgramFiles"];

/// Path of the designer executable relative to a version directory.
pub fn designer_binary() -> PathBuf {
    ["bin", "1cv8.exe"].iter().collect()
}

/// Path of the cluster administration client relative to a version directory.
pub fn rac_binary() -> PathBuf {
    ["bin", "rac.exe"].iter().collect()
}

/// Find `relative_binary` for the requested version under a single root.
///
/// Returns `Ok(None)` when the root does not exist or holds no matching
/// version. `Latest` picks the highest-weighted version directory; a concrete
/// version must match a directory's padded form exactly.
pub fn find_executable(
    root: &Path,
    requested: &PlatformVersion,
    relative_binary: &Path,
) -> Result<Option<PathBuf>> {
    let candidates = scan_versions(root)?;

    let chosen = if requested.is_latest() {
        candidates
            .into_iter()
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
    } else {
        candidates
            .into_iter()
            .find(|(version, _)| version.same_release(requested))
    };

    Ok(chosen.map(|(_, dir_name)| root.join(dir_name).join(relative_binary)))
}

/// List `(version, directory name)` pairs under a root, skipping reserved and
/// non-version entries. A missing root yields an empty list.
fn scan_versions(root: &Path) -> Result<Vec<(PlatformVersion, String)>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(root = %root.display(), "installation root does not exist");
            return Ok(vec![]);
        }
        Err(e) => return Err(DesignerError::Io(root.display().to_string(), e.to_string())),
    };

    let mut versions = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DesignerError::Io(root.display().to_string(), e.to_string()))?;
        if !entry.path().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if RESERVED_DIRS.contains(&name.as_str()) {
            continue;
        }
        match name.parse::<PlatformVersion>() {
            Ok(version) if !version.is_latest() => versions.push((version, name)),
            _ => {
                tracing::trace!(root = %root.display(), dir = %name, "skipping non-version directory");
            }
        }
    }
    Ok(versions)
}

/// Ordered set of installation roots to search.
#[derive(Debug, Clone, Default)]
pub struct PlatformLocator {
    roots: Vec<PathBuf>,
}

impl PlatformLocator {
    /// Build a locator over explicitly configured roots. Works on any host.
    pub fn new(roots: Vec<PathBuf>) -> Self {
        PlatformLocator { roots }
    }

    /// Build a locator over the host's standard installation roots.
    ///
    /// On Windows these are `%ProgramW6432%\1cv8` then `%ProgramFiles%\1cv8`;
    /// unset variables are skipped. Other hosts have no convention and fail
    /// with `UnsupportedPlatform`.
    pub fn from_host() -> Result<Self> {
        if !cfg!(windows) {
            return Err(DesignerError::UnsupportedPlatform(
                "platform path resolution".to_string(),
            ));
        }

        let mut roots: Vec<PathBuf> = Vec::new();
        for var in ROOT_ENV_VARS {
            if let Some(base) = std::env::var_os(var) {
                let root = PathBuf::from(base).join(INSTALL_DIR_NAME);
                if !roots.contains(&root) {
                    roots.push(root);
                }
            }
        }
        tracing::debug!(roots = ?roots, "using host installation roots");
        Ok(PlatformLocator { roots })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve `relative_binary` for the requested version, trying each root in order.
    pub fn resolve(&self, requested: &PlatformVersion, relative_binary: &Path) -> Result<PathBuf> {
        for root in &self.roots {
            if let Some(path) = find_executable(root, requested, relative_binary)? {
                tracing::debug!(
                    version = %requested,
                    path = %path.display(),
                    "resolved platform executable"
                );
                return Ok(path);
            }
        }

        if requested.is_latest() {
            tracing::error!(roots = ?self.roots, "no installed platform found");
            Err(DesignerError::PlatformNotFound(
                "no installed platform version".to_string(),
            ))
        } else {
            tracing::error!(version = %requested, roots = ?self.roots, "platform version not installed");
            Err(DesignerError::PlatformNotFound(format!(
                "version {} is not installed",
                requested
            )))
        }
    }

    /// Path to the designer executable for the requested version.
    pub fn designer_path(&self, requested: &PlatformVersion) -> Result<PathBuf> {
        self.resolve(requested, &designer_binary())
    }

    /// Path to the cluster administration client for the requested version.
    pub fn rac_path(&self, requested: &PlatformVersion) -> Result<PathBuf> {
        self.resolve(requested, &rac_binary())
    }

    /// All installed versions across roots, newest first, without duplicates.
    pub fn installed_versions(&self) -> Result<Vec<PlatformVersion>> {
        let mut versions: Vec<PlatformVersion> = Vec::new();
        for root in &self.roots {
            for (version, _) in scan_versions(root)? {
                if !versions.iter().any(|known| known.same_release(&version)) {
                    versions.push(version);
                }
            }
        }
        versions.sort_by(|a, b| b.cmp(a).then_with(|| b.components().cmp(&a.components())));
        Ok(versions)
    }
}

/// Resolve an executable under the host's standard installation roots.
pub fn resolve(requested: &PlatformVersion, relative_binary: &Path) -> Result<PathBuf> {
    PlatformLocator::from_host()?.resolve(requested, relative_binary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_root(dirs: &[&str]) -> TempDir {
        let root = TempDir::new().unwrap();
        for dir in dirs {
            fs::create_dir_all(root.path().join(dir)).unwrap();
        }
        root
    }

    fn v(s: &str) -> PlatformVersion {
        s.parse().unwrap()
    }

    const INSTALLED: &[&str] = &["8.3.11.1232", "8.3.12.1132", "8.2.14.1232", "8.3.15.1232"];

    #[test]
    fn test_latest_picks_highest_version() {
        let root = make_root(INSTALLED);
        let path = find_executable(root.path(), &v(""), &designer_binary())
            .unwrap()
            .unwrap();
        assert_eq!(path, root.path().join("8.3.15.1232").join(designer_binary()));
    }

    #[test]
    fn test_exact_version_match() {
        let root = make_root(INSTALLED);
        let path = find_executable(root.path(), &v("8.2.14.1232"), &rac_binary())
            .unwrap()
            .unwrap();
        assert_eq!(path, root.path().join("8.2.14.1232").join(rac_binary()));
    }

    #[test]
    fn test_absent_version_is_none() {
        let root = make_root(INSTALLED);
        let found = find_executable(root.path(), &v("8.3.14.1232"), &designer_binary()).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_reserved_and_invalid_dirs_skipped() {
        let root = make_root(&["common", "conf", "9.9.9.99999", "tmp", "8.3.10.100"]);
        let path = find_executable(root.path(), &v(""), &designer_binary())
            .unwrap()
            .unwrap();
        assert_eq!(path, root.path().join("8.3.10.100").join(designer_binary()));
    }

    #[test]
    fn test_files_are_not_versions() {
        let root = make_root(&["8.3.10.100"]);
        fs::write(root.path().join("8.3.99.1"), b"not a directory").unwrap();
        let path = find_executable(root.path(), &v(""), &designer_binary())
            .unwrap()
            .unwrap();
        assert!(path.starts_with(root.path().join("8.3.10.100")));
    }

    #[test]
    fn test_partial_version_dir_is_padded() {
        let root = make_root(&["8.3", "8.2.19.80"]);
        let latest = find_executable(root.path(), &v(""), &designer_binary())
            .unwrap()
            .unwrap();
        assert_eq!(latest, root.path().join("8.3").join(designer_binary()));

        let exact = find_executable(root.path(), &v("8.3.0.0"), &designer_binary())
            .unwrap()
            .unwrap();
        assert_eq!(exact, latest);
    }

    #[test]
    fn test_missing_root_is_not_an_error() {
        let root = TempDir::new().unwrap();
        let missing = root.path().join("absent");
        assert!(find_executable(&missing, &v(""), &designer_binary()).unwrap().is_none());
    }

    #[test]
    fn test_resolve_falls_through_roots_in_order() {
        let first = make_root(&["8.3.11.1232"]);
        let second = make_root(&["8.3.14.1231", "8.3.15.1232"]);
        let locator = PlatformLocator::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);

        let latest = locator.designer_path(&v("")).unwrap();
        assert!(latest.starts_with(first.path()), "first root with any version wins");

        let exact = locator.designer_path(&v("8.3.14.1231")).unwrap();
        assert_eq!(exact, second.path().join("8.3.14.1231").join(designer_binary()));
    }

    #[test]
    fn test_resolve_unknown_version_names_it() {
        let root = make_root(&["8.3.11.1232", "8.3.14.1231", "8.3.15.1232"]);
        let locator = PlatformLocator::new(vec![root.path().to_path_buf()]);
        let err = locator.designer_path(&v("8.3.99.0")).unwrap_err();
        assert!(
            matches!(err, DesignerError::PlatformNotFound(ref msg) if msg.contains("8.3.99.0")),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn test_resolve_latest_with_nothing_installed() {
        let root = make_root(&["common", "conf"]);
        let locator = PlatformLocator::new(vec![root.path().to_path_buf()]);
        let err = locator.designer_path(&v("")).unwrap_err();
        assert!(matches!(err, DesignerError::PlatformNotFound(ref msg) if msg.contains("no installed")));
    }

    #[test]
    fn test_installed_versions_newest_first() {
        let first = make_root(&["8.3.11.1232", "8.2.14.1232", "conf"]);
        let second = make_root(&["8.3.15.1232", "8.3.11.1232"]);
        let locator = PlatformLocator::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        let versions: Vec<String> = locator
            .installed_versions()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(versions, vec!["8.3.15.1232", "8.3.11.1232", "8.2.14.1232"]);
    }

    #[test]
    #[cfg(not(windows))]
    fn test_host_resolution_unsupported_off_windows() {
        let err = resolve(&v(""), &designer_binary()).unwrap_err();
        assert!(matches!(err, DesignerError::UnsupportedPlatform(_)));
    }

    #[cfg(all(test, windows, feature = "integration-tests"))]
    mod integration {
        use super::*;

        #[test]
        fn test_resolve_installed_designer() {
            let path = resolve(&PlatformVersion::Latest, &designer_binary()).unwrap();
            assert!(path.ends_with(designer_binary()));
        }
    }
}
