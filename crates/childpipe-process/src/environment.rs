//! Environment block codec.
//!
//! Wire format: zero or more `KEY=VALUE` byte strings, each followed by a
//! NUL, and one extra NUL closing the block. `"ONE=one\0TWO=two\0\0"` holds
//! two entries; `"\0\0"` is a well-formed empty environment.
//!
//! An absent block (`None` at the launcher) means "inherit the parent's
//! environment" and never reaches this module.

use childpipe_common::{ProcessError, ProcessResult};
use std::ffi::{OsStr, OsString};

/// One decoded `KEY=VALUE` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvEntry {
    pub key: OsString,
    pub value: OsString,
}

/// A decoded environment, in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentBlock {
    entries: Vec<EnvEntry>,
}

impl EnvironmentBlock {
    /// Parse and validate a raw environment buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::InvalidEnvironment`] when the buffer has no
    /// NUL at all, is not closed by two NULs, contains an empty entry
    /// before the terminator, or contains an entry without `=`.
    pub fn decode(bytes: &[u8]) -> ProcessResult<Self> {
        if !bytes.contains(&0) {
            return Err(ProcessError::invalid_environment(format!(
                "no NUL byte in {} byte buffer",
                bytes.len()
            )));
        }
        if bytes.len() < 2 || !bytes.ends_with(&[0, 0]) {
            return Err(ProcessError::invalid_environment(
                "buffer must end with two consecutive NUL bytes",
            ));
        }

        // Drop the block terminator; what remains is a run of NUL-closed entries.
        let body = &bytes[..bytes.len() - 1];
        if body == [0u8] {
            return Ok(Self::default());
        }

        let mut entries = Vec::new();
        let mut offset = 0usize;
        for raw in body[..body.len() - 1].split(|b| *b == 0) {
            if raw.is_empty() {
                return Err(ProcessError::invalid_environment(format!(
                    "empty entry at offset {} before the end of the block",
                    offset
                )));
            }
            entries.push(parse_entry(raw, offset)?);
            offset += raw.len() + 1;
        }

        Ok(Self { entries })
    }

    /// Build a block from key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| EnvEntry {
                    key: k.into(),
                    value: v.into(),
                })
                .collect(),
        }
    }

    /// Encode into the wire format accepted by [`EnvironmentBlock::decode`].
    pub fn encode(&self) -> Vec<u8> {
        if self.entries.is_empty() {
            return vec![0, 0];
        }
        let mut out = Vec::new();
        for entry in &self.entries {
            out.extend_from_slice(&os_str_to_bytes(&entry.key));
            out.push(b'=');
            out.extend_from_slice(&os_str_to_bytes(&entry.value));
            out.push(0);
        }
        out.push(0);
        out
    }

    pub fn entries(&self) -> &[EnvEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate as `(key, value)` pairs, ready for `Command::envs`.
    pub fn pairs(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.entries
            .iter()
            .map(|e| (e.key.as_os_str(), e.value.as_os_str()))
    }
}

fn parse_entry(raw: &[u8], offset: usize) -> ProcessResult<EnvEntry> {
    // A leading '=' belongs to the key (Windows keeps per-drive "=C:" entries).
    let split = raw
        .iter()
        .skip(1)
        .position(|b| *b == b'=')
        .map(|p| p + 1)
        .ok_or_else(|| {
            ProcessError::invalid_environment(format!(
                "entry at offset {} has no '=' separator",
                offset
            ))
        })?;

    Ok(EnvEntry {
        key: os_string_from_bytes(&raw[..split])?,
        value: os_string_from_bytes(&raw[split + 1..])?,
    })
}

#[cfg(unix)]
fn os_string_from_bytes(bytes: &[u8]) -> ProcessResult<OsString> {
    use std::os::unix::ffi::OsStrExt;
    Ok(OsStr::from_bytes(bytes).to_os_string())
}

#[cfg(not(unix))]
fn os_string_from_bytes(bytes: &[u8]) -> ProcessResult<OsString> {
    String::from_utf8(bytes.to_vec())
        .map(OsString::from)
        .map_err(|e| ProcessError::invalid_environment(format!("entry is not UTF-8: {}", e)))
}

#[cfg(unix)]
fn os_str_to_bytes(s: &OsStr) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    s.as_bytes().to_vec()
}

#[cfg(not(unix))]
fn os_str_to_bytes(s: &OsStr) -> Vec<u8> {
    s.to_string_lossy().into_owned().into_bytes()
}
