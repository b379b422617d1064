use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use log::info;

/// Creates the storage root if it does not exist yet. Called once per
/// role at startup.
pub fn ensure_root(root: &Path) -> io::Result<()> {
    if !root.exists() {
        fs::create_dir_all(root)?;
        info!("Created storage directory: {}", root.display());
    }
    Ok(())
}

/// Resolves a peer-supplied filename to a path directly under the root.
///
/// Filenames travel over the wire verbatim, so this is the confinement
/// check that keeps them from escaping the storage root: the name must
/// be a single normal path component. Separators, `..`, absolute paths
/// and empty names are all rejected before any file operation happens.
pub fn resolve(root: &Path, filename: &str) -> io::Result<PathBuf> {
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => Ok(root.join(name)),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("filename escapes storage root: {:?}", filename),
        )),
    }
}

/// Lists file names directly under the root, sorted for stable output.
pub fn list_entries(root: &Path) -> io::Result<Vec<String>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            entries.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    entries.sort();
    Ok(entries)
}
