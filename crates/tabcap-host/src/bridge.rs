//! HostCommandBridge: sync subprocess wrapper around the host helper.

use tabcap_core::host::{HostAdapter, HostError};
use tabcap_core::types::TabHandle;

/// Real host bridge using `std::process::Command`.
///
/// Helper contract, one invocation per call:
///
/// ```text
/// <host-cmd> is-pinned <tab>           exit 0, stdout "true" | "false"
/// <host-cmd> is-dirty <tab>            exit 0, stdout "true" | "false"
/// <host-cmd> is-preview <tab>          exit 0, stdout "true" | "false"
/// <host-cmd> close <tab> [--discard]   exit 0 on success
/// ```
pub struct HostCommandBridge {
    host_bin: String,
    base_args: Vec<String>,
}

impl HostCommandBridge {
    pub fn new(host_bin: impl Into<String>) -> Self {
        Self {
            host_bin: host_bin.into(),
            base_args: Vec::new(),
        }
    }

    /// Fixed leading arguments the helper expects before the verb,
    /// e.g. a subcommand or a window id.
    #[must_use]
    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    fn run(&self, args: &[&str]) -> Result<String, HostError> {
        let mut cmd = std::process::Command::new(&self.host_bin);
        cmd.args(&self.base_args);
        cmd.args(args);
        let output = cmd.output().map_err(HostError::Io)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HostError::QueryFailed(format!(
                "exit code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn query_flag(&self, verb: &str, handle: &TabHandle) -> Result<bool, HostError> {
        let reply = self.run(&[verb, handle.as_str()])?;
        parse_flag_reply(&reply)
    }
}

/// Parse a helper flag reply: `true`/`false`, case-insensitive, trimmed.
pub fn parse_flag_reply(reply: &str) -> Result<bool, HostError> {
    match reply.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(HostError::MalformedReply(format!(
            "expected true/false, got {other:?}"
        ))),
    }
}

impl HostAdapter for HostCommandBridge {
    fn is_pinned(&self, handle: &TabHandle) -> Result<bool, HostError> {
        self.query_flag("is-pinned", handle)
    }

    fn is_dirty(&self, handle: &TabHandle) -> Result<bool, HostError> {
        self.query_flag("is-dirty", handle)
    }

    fn is_preview(&self, handle: &TabHandle) -> Result<bool, HostError> {
        self.query_flag("is-preview", handle)
    }

    fn close(&self, handle: &TabHandle, discard_unsaved: bool) -> Result<(), HostError> {
        let result = if discard_unsaved {
            self.run(&["close", handle.as_str(), "--discard"])
        } else {
            self.run(&["close", handle.as_str()])
        };
        match result {
            Ok(_) => Ok(()),
            Err(HostError::QueryFailed(detail)) => Err(HostError::CloseRejected(detail)),
            Err(other) => Err(other),
        }
    }
}
