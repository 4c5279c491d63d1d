//! Thin libc wrappers for the host diagnostics the server reports.

use std::ffi::c_char;

/// Host load averages over the last 1, 5, and 15 minutes.
///
/// Returns `None` if the platform cannot supply all three samples.
pub fn load_average() -> Option<[f64; 3]> {
    let mut loads = [0f64; 3];

    // SAFETY: getloadavg writes at most `loads.len()` doubles into the
    // buffer and returns how many it filled.
    let filled = unsafe { libc::getloadavg(loads.as_mut_ptr(), loads.len() as libc::c_int) };

    if filled == loads.len() as libc::c_int {
        Some(loads)
    } else {
        None
    }
}

/// Host name as reported by gethostname(2), or `None` on failure.
pub fn hostname() -> Option<String> {
    let mut buf = [0u8; 256];

    // SAFETY: the buffer is valid for the given length; gethostname
    // NUL-terminates the name on success.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut c_char, buf.len()) };
    if rc != 0 {
        return None;
    }

    let end = buf.iter().position(|&b| b == 0)?;
    Some(String::from_utf8_lossy(&buf[..end]).into_owned())
}
