use color_eyre::eyre::eyre;
use tokio::process::Command;

use crate::config::TransportSettings;

/// Remote process-table query for one process name.
///
/// The filter runs on the node so only candidate rows cross the wire; the
/// parser re-checks every row anyway.
pub fn process_query(process: &str) -> color_eyre::Result<String> {
    let quoted = shlex::try_quote(process)
        .map_err(|e| eyre!("Bad process name {:?}: {}", process, e))?;
    Ok(format!(
        "ps -eo pid,pcpu,pmem,vsz,comm | grep -F -- {} | grep -v grep",
        quoted
    ))
}

/// `ssh [options] <node> <command>`
///
/// The child gets its own process group so a terminal Ctrl+C reaches only
/// procmon, which then lets the running call finish.
pub fn remote_command(transport: &TransportSettings, node: &str, command: &str) -> Command {
    let mut c = Command::new(&transport.ssh_program);
    c.args(&transport.ssh_options);
    c.arg(node).arg(command);
    #[cfg(unix)]
    c.process_group(0);
    c.kill_on_drop(true);
    c
}

/// Split a configured command line into a ready-to-run `Command`.
pub fn local_command(command_line: &str) -> Option<Command> {
    let strings = shlex::split(command_line)?;
    let program = strings.first()?;
    let mut c = Command::new(program);
    c.args(strings.iter().skip(1));
    Some(c)
}
