use super::{
    core_error, host_environment, json_pretty, print_warnings, spin_fail, spin_ok, spinner,
    EXIT_SUCCESS,
};
use stagehand_core::ENTRY_BINARY_NAME;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory next to the configuration whose contents land in the image's
/// installation directory.
pub const INSTALLATION_DIR: &str = "installation";

pub fn run(
    config: &Path,
    output: &Path,
    entry_binary: Option<&Path>,
    json: bool,
) -> Result<u8, String> {
    let pb = if json {
        None
    } else {
        Some(spinner("compiling project..."))
    };

    let compiled = match stagehand_core::compile_file(config, &host_environment()) {
        Ok(c) => c,
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "compilation failed");
            }
            return Err(core_error(e));
        }
    };

    let written = match compiled.artifacts.write_to(output) {
        Ok(n) => n,
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "writing artifacts failed");
            }
            return Err(core_error(e));
        }
    };

    let source_dir = config.parent().unwrap_or_else(|| Path::new("."));
    let installed = copy_installation(&source_dir.join(INSTALLATION_DIR), output)?;
    let entry = match entry_binary {
        Some(path) => Some(path.to_path_buf()),
        None => sibling_entry_binary(),
    };
    let entry_copied = match entry {
        Some(ref path) if path.is_file() => {
            copy_entry_binary(path, &output.join(ENTRY_BINARY_NAME))?;
            true
        }
        _ => {
            warn!("{ENTRY_BINARY_NAME} binary not found; copy it into the build context before building images");
            false
        }
    };

    if let Some(ref pb) = pb {
        spin_ok(pb, &format!("compiled {}", compiled.project.name));
    }

    if json {
        let payload = serde_json::json!({
            "project": compiled.project.name,
            "fingerprint": compiled.fingerprint.hash,
            "output": output.display().to_string(),
            "artifacts": written,
            "installation_files": installed,
            "entry_binary": entry_copied,
            "warnings": compiled.warnings,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        print_warnings(&compiled.warnings);
        println!("fingerprint: {}", compiled.fingerprint.short);
        println!("artifacts:   {written}");
        println!("output:      {}", output.display());
    }
    Ok(EXIT_SUCCESS)
}

/// `stagehand-entry` installed beside the running executable.
fn sibling_entry_binary() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(ENTRY_BINARY_NAME))
}

fn copy_entry_binary(from: &Path, to: &Path) -> Result<(), String> {
    fs::copy(from, to).map_err(|e| format!("failed to copy {}: {e}", from.display()))?;
    fs::set_permissions(to, fs::Permissions::from_mode(0o755))
        .map_err(|e| format!("failed to set permissions on {}: {e}", to.display()))?;
    debug!("copied {} to {}", from.display(), to.display());
    Ok(())
}

/// Mirror `source` into `<output>/installation`, which always exists
/// afterwards since every Dockerfile copies it. The previous copy is removed
/// first. Returns the number of files.
fn copy_installation(source: &Path, output: &Path) -> Result<usize, String> {
    let dest = output.join(INSTALLATION_DIR);
    if same_dir(source, &dest) {
        return Ok(0);
    }
    if dest.exists() {
        fs::remove_dir_all(&dest)
            .map_err(|e| format!("failed to clear {}: {e}", dest.display()))?;
    }
    fs::create_dir_all(&dest).map_err(|e| format!("failed to create {}: {e}", dest.display()))?;
    if !source.is_dir() {
        return Ok(0);
    }
    copy_tree(source, &dest)
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn copy_tree(from: &Path, to: &Path) -> Result<usize, String> {
    let entries =
        fs::read_dir(from).map_err(|e| format!("failed to read {}: {e}", from.display()))?;
    let mut count = 0;
    for entry in entries {
        let entry = entry.map_err(|e| format!("failed to read {}: {e}", from.display()))?;
        let path = entry.path();
        let target = to.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|e| format!("failed to stat {}: {e}", path.display()))?;
        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| format!("failed to create {}: {e}", target.display()))?;
            count += copy_tree(&path, &target)?;
        } else {
            // fs::copy keeps permission bits, so executable scripts stay executable.
            fs::copy(&path, &target)
                .map_err(|e| format!("failed to copy {}: {e}", path.display()))?;
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installation_dir_is_created_when_absent() {
        let out = tempfile::tempdir().unwrap();
        let count = copy_installation(&out.path().join("missing"), out.path()).unwrap();
        assert_eq!(count, 0);
        assert!(out.path().join(INSTALLATION_DIR).is_dir());
    }

    #[test]
    fn installation_tree_is_mirrored_with_modes() {
        let src = tempfile::tempdir().unwrap();
        let nested = src.path().join("stage-1");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("init.sh"), "#!/bin/sh\n").unwrap();
        fs::set_permissions(nested.join("init.sh"), fs::Permissions::from_mode(0o755)).unwrap();
        fs::write(src.path().join("README"), "notes\n").unwrap();

        let out = tempfile::tempdir().unwrap();
        let count = copy_installation(src.path(), out.path()).unwrap();
        assert_eq!(count, 2);

        let copied = out.path().join("installation/stage-1/init.sh");
        let mode = fs::metadata(&copied).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert!(out.path().join("installation/README").is_file());
    }

    #[test]
    fn scripts_removed_from_source_disappear_from_output() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("old.sh"), "#!/bin/sh\n").unwrap();
        let out = tempfile::tempdir().unwrap();
        copy_installation(src.path(), out.path()).unwrap();
        assert!(out.path().join("installation/old.sh").is_file());

        fs::remove_file(src.path().join("old.sh")).unwrap();
        fs::write(src.path().join("new.sh"), "#!/bin/sh\n").unwrap();
        assert_eq!(copy_installation(src.path(), out.path()).unwrap(), 1);
        assert!(!out.path().join("installation/old.sh").exists());
        assert!(out.path().join("installation/new.sh").is_file());
    }

    #[test]
    fn output_inside_project_keeps_installation_source() {
        let project = tempfile::tempdir().unwrap();
        let src = project.path().join(INSTALLATION_DIR);
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("init.sh"), "#!/bin/sh\n").unwrap();
        copy_installation(&src, project.path()).unwrap();
        assert!(src.join("init.sh").is_file());
    }

    #[test]
    fn entry_binary_is_made_executable() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("built-entry");
        fs::write(&from, "binary").unwrap();
        fs::set_permissions(&from, fs::Permissions::from_mode(0o600)).unwrap();

        let to = dir.path().join(ENTRY_BINARY_NAME);
        copy_entry_binary(&from, &to).unwrap();
        let mode = fs::metadata(&to).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
