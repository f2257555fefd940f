use std::process::Stdio;

use log::*;

use crate::{config::Settings, error::DiscoveryError, poll::command::local_command};

/// Addresses of the nodes to poll, in the order they were listed.
///
/// A static `nodes` list wins over the discovery command.
pub async fn discover_nodes(settings: &Settings) -> Result<Vec<String>, DiscoveryError> {
    if !settings.nodes.is_empty() {
        info!(target: "Discovery", "Using {} configured nodes", settings.nodes.len());
        return Ok(settings.nodes.clone());
    }
    run_discovery(&settings.discovery_command).await
}

pub async fn run_discovery(command_line: &str) -> Result<Vec<String>, DiscoveryError> {
    let mut cmd = local_command(command_line)
        .ok_or_else(|| DiscoveryError::BadCommand(command_line.to_string()))?;
    cmd.stdin(Stdio::null());
    info!(target: "Discovery", "Running {:?}", command_line);
    let output = cmd.output().await.map_err(|source| DiscoveryError::Spawn {
        command: command_line.to_string(),
        source,
    })?;
    if !output.status.success() {
        return Err(DiscoveryError::Status {
            command: command_line.to_string(),
            status: output.status.to_string(),
        });
    }
    let nodes = parse_node_list(&String::from_utf8_lossy(&output.stdout));
    info!(target: "Discovery", "Found {} nodes", nodes.len());
    Ok(nodes)
}

/// Whitespace separated addresses, duplicates dropped.
pub fn parse_node_list(raw: &str) -> Vec<String> {
    let mut nodes: Vec<String> = Vec::new();
    for token in raw.split_whitespace() {
        if !nodes.iter().any(|n| n == token) {
            nodes.push(token.to_string());
        }
    }
    nodes
}
