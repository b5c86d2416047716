use std::ffi::{OsStr, OsString};
use thiserror::Error;

const SEPARATOR: &str = "--";
const NO_BLOCK: &str = "--no-block";
const VERBOSE: &str = "--verbose";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionError {
    #[error("unknown entrypoint option '{0}' (expected --no-block, --verbose or --)")]
    Unknown(String),
}

/// Entrypoint options parsed from the container's argv.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryOptions {
    pub no_block: bool,
    pub verbose: bool,
    pub command: Vec<OsString>,
}

/// Parse `[-- [--no-block] [--verbose] [--] CMD...]`.
///
/// An argv that does not open with `--` is entirely the command. After the
/// opening `--`, options are read until a bare `--`, the end, or the first
/// token that is not an option, which starts the command.
pub fn parse_options(argv: &[OsString]) -> Result<EntryOptions, OptionError> {
    let mut options = EntryOptions::default();

    let Some((first, rest)) = argv.split_first() else {
        return Ok(options);
    };
    if first.as_os_str() != OsStr::new(SEPARATOR) {
        options.command = argv.to_vec();
        return Ok(options);
    }

    for (idx, token) in rest.iter().enumerate() {
        match token.to_str() {
            Some(SEPARATOR) => {
                options.command = rest[idx + 1..].to_vec();
                return Ok(options);
            }
            Some(NO_BLOCK) => options.no_block = true,
            Some(VERBOSE) => options.verbose = true,
            Some(flag) if flag.starts_with("--") => {
                return Err(OptionError::Unknown(flag.to_owned()));
            }
            _ => {
                options.command = rest[idx..].to_vec();
                return Ok(options);
            }
        }
    }
    Ok(options)
}
