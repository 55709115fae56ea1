//! Run-scoped staging of the app under test and its sample images

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{GradeError, GradeResult};

/// Where the app and sample images come from and where they are staged
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Source tree of the app being graded
    pub app_path: PathBuf,

    /// Apps folder handed to the server; wiped on every run
    pub apps_root: PathBuf,

    /// Directory of sample images shipped with the grader
    pub images_source: PathBuf,

    /// Run-scoped copy of the sample images
    pub images_dir: PathBuf,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            app_path: PathBuf::from("apps/contact_cards"),
            apps_root: PathBuf::from("/tmp/apps"),
            images_source: PathBuf::from("test_images"),
            images_dir: PathBuf::from("/tmp/test_images"),
        }
    }
}

impl StagingConfig {
    /// App name, taken from the last component of `app_path`
    pub fn app_name(&self) -> Option<String> {
        self.app_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.is_empty() && n != "..")
    }
}

/// Result of staging: an isolated apps folder and the sample images in it
#[derive(Debug, Clone)]
pub struct StagedApp {
    pub app_name: String,
    pub apps_root: PathBuf,
    pub app_dir: PathBuf,
    pub images: Vec<PathBuf>,
}

impl StagedApp {
    /// SQLite file the app writes its tables to
    pub fn database_path(&self) -> PathBuf {
        self.app_dir.join("databases").join("storage.db")
    }
}

/// Copy the app and sample images into fresh run-scoped locations
pub fn stage(config: &StagingConfig) -> GradeResult<StagedApp> {
    let app_name = config.app_name().ok_or_else(|| {
        GradeError::Staging(format!(
            "cannot derive an app name from {}",
            config.app_path.display()
        ))
    })?;
    if !config.app_path.is_dir() {
        return Err(GradeError::Staging(format!(
            "app directory {} does not exist",
            config.app_path.display()
        )));
    }
    if !config.images_source.is_dir() {
        return Err(GradeError::Staging(format!(
            "sample image directory {} does not exist",
            config.images_source.display()
        )));
    }

    info!("Staging {} into {}", app_name, config.apps_root.display());

    remove_if_exists(&config.apps_root)?;
    std::fs::create_dir_all(&config.apps_root)?;
    std::fs::write(config.apps_root.join("__init__.py"), "\n")?;

    let app_dir = config.apps_root.join(&app_name);
    copy_tree(&config.app_path, &app_dir)?;

    // Start from an empty database
    remove_if_exists(&app_dir.join("databases"))?;

    remove_if_exists(&config.images_dir)?;
    copy_tree(&config.images_source, &config.images_dir)?;
    let images = list_images(&config.images_dir)?;
    debug!("Staged {} sample image(s)", images.len());

    Ok(StagedApp {
        app_name,
        apps_root: config.apps_root.clone(),
        app_dir,
        images,
    })
}

/// Recursively copy `src` into `dst`, creating `dst`
pub fn copy_tree(src: &Path, dst: &Path) -> GradeResult<()> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| GradeError::Staging(e.to_string()))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// `.jpg` files directly inside `dir`, sorted by path
pub fn list_images(dir: &Path) -> GradeResult<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|e| e == "jpg").unwrap_or(false) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn remove_if_exists(path: &Path) -> GradeResult<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_tree(root: &Path) -> StagingConfig {
        let app = root.join("src/apps/contact_cards");
        std::fs::create_dir_all(app.join("static/js")).unwrap();
        std::fs::create_dir_all(app.join("databases")).unwrap();
        std::fs::write(app.join("models.py"), "db.define_table('contact_card')").unwrap();
        std::fs::write(app.join("static/js/index.js"), "// app").unwrap();
        std::fs::write(app.join("databases/storage.db"), "stale").unwrap();

        let images = root.join("src/test_images");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::write(images.join("b.jpg"), "b").unwrap();
        std::fs::write(images.join("a.jpg"), "a").unwrap();
        std::fs::write(images.join("notes.txt"), "skip").unwrap();

        StagingConfig {
            app_path: app,
            apps_root: root.join("run/apps"),
            images_source: images,
            images_dir: root.join("run/test_images"),
        }
    }

    #[test]
    fn test_stage_copies_app_and_drops_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture_tree(dir.path());

        let staged = stage(&config).unwrap();

        assert_eq!(staged.app_name, "contact_cards");
        assert!(staged.apps_root.join("__init__.py").is_file());
        assert!(staged.app_dir.join("models.py").is_file());
        assert!(staged.app_dir.join("static/js/index.js").is_file());
        assert!(!staged.app_dir.join("databases").exists());
        assert_eq!(
            staged.database_path(),
            staged.app_dir.join("databases/storage.db")
        );
    }

    #[test]
    fn test_stage_lists_only_jpg_images_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture_tree(dir.path());

        let staged = stage(&config).unwrap();

        let names: Vec<_> = staged
            .images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
        assert!(staged.images.iter().all(|p| p.starts_with(&config.images_dir)));
    }

    #[test]
    fn test_stage_wipes_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture_tree(dir.path());

        stage(&config).unwrap();
        std::fs::write(config.apps_root.join("leftover.txt"), "x").unwrap();

        stage(&config).unwrap();
        assert!(!config.apps_root.join("leftover.txt").exists());
    }

    #[test]
    fn test_missing_app_is_staging_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = StagingConfig {
            app_path: dir.path().join("nope/contact_cards"),
            ..fixture_tree(dir.path())
        };
        assert!(matches!(stage(&config), Err(GradeError::Staging(_))));
    }
}
