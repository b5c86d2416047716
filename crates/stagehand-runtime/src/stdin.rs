use crate::decision::StdinState;
use std::os::unix::fs::{FileTypeExt, MetadataExt};

const STDIN_LINK: &str = "/proc/self/fd/0";
const NULL_DEVICE: &str = "/dev/null";

/// Inspect the process's stdin. A terminal or any non-null stream counts as
/// open; the null device or an unreadable descriptor counts as closed.
pub fn detect() -> StdinState {
    if stdin_is_terminal() {
        return StdinState::Terminal;
    }
    let stdin = std::fs::metadata(STDIN_LINK).ok();
    let null = std::fs::metadata(NULL_DEVICE).ok();
    classify(
        false,
        stdin.map(|m| (m.file_type().is_char_device(), m.rdev())),
        null.map(|m| m.rdev()),
    )
}

#[allow(unsafe_code)]
fn stdin_is_terminal() -> bool {
    // SAFETY: isatty only inspects the descriptor and has no preconditions.
    unsafe { libc::isatty(libc::STDIN_FILENO) == 1 }
}

/// `stdin` is `(is_char_device, rdev)` of fd 0, if it could be inspected.
pub fn classify(is_terminal: bool, stdin: Option<(bool, u64)>, null_rdev: Option<u64>) -> StdinState {
    if is_terminal {
        return StdinState::Terminal;
    }
    match stdin {
        None => StdinState::Closed,
        Some((true, rdev)) if Some(rdev) == null_rdev => StdinState::Closed,
        Some(_) => StdinState::Open,
    }
}
