use std::path::{Path, PathBuf};

pub const DOCFORGE_DIR: &str = ".docforge";
pub const CONFIG_FILE: &str = ".docforge/config.yaml";
pub const STORE_FILE: &str = ".docforge/store.redb";

pub fn docforge_dir(root: &Path) -> PathBuf {
    root.join(DOCFORGE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn store_path(root: &Path) -> PathBuf {
    root.join(STORE_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.docforge/config.yaml")
        );
        assert_eq!(
            store_path(root),
            PathBuf::from("/tmp/proj/.docforge/store.redb")
        );
        assert_eq!(docforge_dir(root), PathBuf::from("/tmp/proj/.docforge"));
    }
}
