//! Platform-specific configuration paths.
//!
//! # Directory Structure
//!
//! - **User config**: `~/.config/mixdown/config.toml` (Linux), `~/Library/Application Support/mixdown/config.toml` (macOS), `%APPDATA%\mixdown\config.toml` (Windows)
//! - **Project config**: `./mixdown.toml` in the working directory, preferred over the user config
//!
//! # Example
//!
//! ```rust,no_run
//! use mixdown_config::paths;
//!
//! if let Some(path) = paths::find_config(None) {
//!     println!("Using config at: {:?}", path);
//! }
//! ```

use std::path::{Path, PathBuf};

/// Application name used for directory paths.
const APP_NAME: &str = "mixdown";

/// File name of the user configuration.
const CONFIG_FILE: &str = "config.toml";

/// File name of a project-local configuration.
pub const PROJECT_CONFIG_FILE: &str = "mixdown.toml";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the user configuration file path (which may not exist).
pub fn user_config_path() -> PathBuf {
    user_config_dir().join(CONFIG_FILE)
}

/// Ensure the user config directory exists.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_user_config_dir() -> Result<PathBuf, crate::ConfigError> {
    let dir = user_config_dir();

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| crate::ConfigError::create_dir(&dir, e))?;
    }

    Ok(dir)
}

/// Locate the configuration file to use.
///
/// Search order:
/// 1. `explicit`, if given (returned even when missing so loading reports it)
/// 2. `./mixdown.toml`
/// 3. the user config file
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    find_config_in(Path::new("."), &user_config_path())
}

fn find_config_in(project_dir: &Path, user_path: &Path) -> Option<PathBuf> {
    let project = project_dir.join(PROJECT_CONFIG_FILE);
    if project.is_file() {
        return Some(project);
    }
    user_path.is_file().then(|| user_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn user_config_path_ends_with_app_file() {
        let path = user_config_path();
        assert!(path.ends_with("mixdown/config.toml"));
    }

    #[test]
    fn explicit_path_wins_even_if_missing() {
        let explicit = Path::new("/nowhere/custom.toml");
        assert_eq!(find_config(Some(explicit)), Some(explicit.to_path_buf()));
    }

    #[test]
    fn project_config_preferred_over_user() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        let user_path = user.path().join("config.toml");
        fs::write(&user_path, "").unwrap();

        assert_eq!(find_config_in(project.path(), &user_path), Some(user_path.clone()));

        fs::write(project.path().join(PROJECT_CONFIG_FILE), "").unwrap();
        assert_eq!(
            find_config_in(project.path(), &user_path),
            Some(project.path().join(PROJECT_CONFIG_FILE))
        );
    }

    #[test]
    fn nothing_found() {
        let project = TempDir::new().unwrap();
        assert_eq!(find_config_in(project.path(), &project.path().join("none.toml")), None);
    }
}
