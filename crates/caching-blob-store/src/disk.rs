//! Device free-space probe

use std::path::Path;

/// Bytes available to unprivileged writers on the filesystem holding `path`.
#[cfg(target_family = "unix")]
pub(crate) fn available_space(path: &Path) -> std::io::Result<u64> {
    use std::os::unix::ffi::OsStrExt;

    let path_cstr = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    // SAFETY: statvfs is a plain C struct of integers; zero is a valid
    // initial state, and the syscall only writes through the out pointer.
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::statvfs(path_cstr.as_ptr(), &mut stat) };

    if result != 0 {
        return Err(std::io::Error::last_os_error());
    }

    Ok(stat.f_bavail as u64 * stat.f_frsize as u64)
}

#[cfg(not(target_family = "unix"))]
pub(crate) fn available_space(_path: &Path) -> std::io::Result<u64> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "free-space probing is only supported on Unix",
    ))
}
