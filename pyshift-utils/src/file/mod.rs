//! Python source discovery

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// What to collect when walking directories
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Globs a file must match, relative to the walked root
    pub include: Vec<String>,
    /// Globs excluding files and whole directories
    pub exclude: Vec<String>,
    /// Skip VCS, cache and virtualenv directories
    pub default_exclusions: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            include: vec!["**/*.py".to_string()],
            exclude: Vec::new(),
            default_exclusions: true,
        }
    }
}

fn build_globset(patterns: &[String]) -> crate::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| crate::UtilError::Pattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| crate::UtilError::Pattern {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}

struct Filter {
    include: GlobSet,
    exclude: GlobSet,
    excluded_dirs: Vec<&'static str>,
}

impl Filter {
    fn new(options: &DiscoveryOptions) -> crate::Result<Self> {
        Ok(Self {
            include: build_globset(&options.include)?,
            exclude: build_globset(&options.exclude)?,
            excluded_dirs: if options.default_exclusions {
                crate::default_exclusion_patterns()
            } else {
                Vec::new()
            },
        })
    }

    fn descend(&self, root: &Path, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        let name = entry.file_name().to_str().unwrap_or("");
        if self.excluded_dirs.contains(&name) {
            return false;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        !self.exclude.is_match(relative)
    }

    fn accept(&self, root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        self.include.is_match(relative) && !self.exclude.is_match(relative)
    }
}

/// Collect source files under `roots`, sorted and without duplicates
///
/// Roots naming a file are taken as given; directories are walked.
pub fn discover_sources(roots: &[PathBuf], options: &DiscoveryOptions) -> crate::Result<Vec<PathBuf>> {
    let filter = Filter::new(options)?;
    let mut files = Vec::new();

    for root in roots {
        if root.is_file() {
            files.push(root.clone());
            continue;
        }
        if !root.exists() {
            return Err(crate::UtilError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", root.display()),
            )));
        }

        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| filter.descend(root, entry))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    tracing::warn!("Skipping unreadable entry: {}", error);
                    continue;
                }
            };
            if entry.file_type().is_file() && filter.accept(root, entry.path()) {
                files.push(entry.into_path());
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn names(files: &[PathBuf], root: &Path) -> Vec<String> {
        files
            .iter()
            .map(|path| {
                path.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn test_discovers_python_files() -> crate::Result<()> {
        let temp_dir = tempdir()?;
        let root = temp_dir.path();
        fs::write(root.join("app.py"), "x = 1\n")?;
        fs::write(root.join("README.md"), "docs")?;
        fs::create_dir_all(root.join("pkg"))?;
        fs::write(root.join("pkg/mod.py"), "y = 2\n")?;
        fs::create_dir_all(root.join("__pycache__"))?;
        fs::write(root.join("__pycache__/app.py"), "")?;
        fs::create_dir_all(root.join(".venv/lib"))?;
        fs::write(root.join(".venv/lib/site.py"), "")?;

        let files = discover_sources(&[root.to_path_buf()], &DiscoveryOptions::default())?;
        assert_eq!(names(&files, root), vec!["app.py", "pkg/mod.py"]);
        Ok(())
    }

    #[test]
    fn test_exclude_globs() -> crate::Result<()> {
        let temp_dir = tempdir()?;
        let root = temp_dir.path();
        fs::create_dir_all(root.join("legacy"))?;
        fs::write(root.join("legacy/old.py"), "")?;
        fs::write(root.join("keep.py"), "")?;
        fs::write(root.join("test_keep.py"), "")?;

        let options = DiscoveryOptions {
            exclude: vec!["legacy".to_string(), "test_*.py".to_string()],
            ..Default::default()
        };
        let files = discover_sources(&[root.to_path_buf()], &options)?;
        assert_eq!(names(&files, root), vec!["keep.py"]);
        Ok(())
    }

    #[test]
    fn test_explicit_file_root_and_dedup() -> crate::Result<()> {
        let temp_dir = tempdir()?;
        let root = temp_dir.path();
        let script = root.join("script.txt");
        fs::write(&script, "print(1)\n")?;
        fs::write(root.join("a.py"), "")?;

        let files = discover_sources(
            &[root.to_path_buf(), script.clone(), root.join("a.py")],
            &DiscoveryOptions::default(),
        )?;
        assert_eq!(names(&files, root), vec!["a.py", "script.txt"]);
        Ok(())
    }

    #[test]
    fn test_missing_root_and_bad_glob() {
        let missing = discover_sources(&[PathBuf::from("/definitely/not/here")], &DiscoveryOptions::default());
        assert!(missing.is_err());

        let options = DiscoveryOptions {
            exclude: vec!["[".to_string()],
            ..Default::default()
        };
        let temp_dir = tempdir().unwrap();
        let error = discover_sources(&[temp_dir.path().to_path_buf()], &options).unwrap_err();
        assert!(matches!(error, crate::UtilError::Pattern { .. }));
    }
}
