use std::path::Path;

use anyhow::Result;
use sysinfo::{get_current_pid, Signal, System};

use super::daemon_path::to_daemon_path;

/// Terminates every process running the daemon executable. SIGTERM first so
/// the daemon can settle its open interval; a hard kill if the platform has
/// no Term.
pub fn kill_previous_servers(name: &Path) {
    let system = System::new_all();
    let current_id = get_current_pid().unwrap();
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| name == *v)
            .is_some()
        {
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
        }
    }
}

/// Shuts down any previous daemon and starts a fresh detached one. The
/// daemon binary is expected to live next to the cli binary.
pub fn restart_server() -> Result<()> {
    let daemon_path = to_daemon_path(
        std::env::current_exe().expect("Can't operate without an executable"),
    );
    kill_previous_servers(&daemon_path);

    let mut command = std::process::Command::new(daemon_path);

    println!("Spawning daemon");
    #[allow(clippy::zombie_processes)]
    let _ = command.spawn()?;
    println!("Success");
    Ok(())
}

pub fn stop_server() {
    let daemon_path = to_daemon_path(
        std::env::current_exe().expect("Can't operate without an executable"),
    );
    kill_previous_servers(&daemon_path);
}
