use std::{future::Future, process::Stdio};

use log::*;
use tokio::time::timeout;

use crate::{config::TransportSettings, error::TransportError, poll::command::remote_command};

/// ssh exits with 255 when it could not reach or authenticate to the node;
/// anything else is the remote command's own status.
const SSH_FAILURE_STATUS: i32 = 255;

/// Runs a shell command on a node and hands back its stdout.
pub trait RemoteExecutor {
    fn run(
        &self,
        node: &str,
        command: &str,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;
}

#[derive(Debug, Clone)]
pub struct SshExecutor {
    transport: TransportSettings,
}

impl SshExecutor {
    pub fn new(transport: TransportSettings) -> Self {
        Self { transport }
    }
}

impl RemoteExecutor for SshExecutor {
    async fn run(&self, node: &str, command: &str) -> Result<String, TransportError> {
        let mut cmd = remote_command(&self.transport, node, command);
        cmd.stdin(Stdio::null());
        debug!(target: node, "Running {:?}", command);
        let limit = self.transport.timeout();
        let output = match timeout(limit, cmd.output()).await {
            Ok(result) => result.map_err(|source| TransportError::Spawn {
                program: self.transport.ssh_program.clone(),
                node: node.to_string(),
                source,
            })?,
            Err(_) => {
                return Err(TransportError::Timeout {
                    node: node.to_string(),
                    timeout: limit,
                });
            }
        };
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            Some(SSH_FAILURE_STATUS) => Err(TransportError::Connection {
                node: node.to_string(),
                stderr,
            }),
            None => Err(TransportError::Killed {
                node: node.to_string(),
            }),
            Some(code) => {
                if !stderr.is_empty() {
                    debug!(target: node, "exit {} stderr: {}", code, stderr);
                }
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
        }
    }
}
