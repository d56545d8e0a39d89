use std::path::Path;

#[cfg(unix)]
pub fn secure_directory<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    use std::os::unix::prelude::PermissionsExt;
    std::fs::set_permissions(path.as_ref(), std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
pub fn secure_directory<P: AsRef<Path>>(_path: P) -> std::io::Result<()> {
    Ok(())
}

/// Creates `path` and its parents if missing, restricting the leaf to the
/// owner when `secure` is set.
pub fn ensure_directory<P: AsRef<Path>>(path: P, secure: bool) -> std::io::Result<()> {
    let path = path.as_ref();
    std::fs::create_dir_all(path)?;
    if secure {
        secure_directory(path)?;
    }
    Ok(())
}
