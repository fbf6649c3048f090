//! Runs the binary with --dry-run so no real ssh process is started.

use assert_cmd::Command;
use predicates::prelude::*;

fn cli_bin() -> Command {
    let mut cmd = Command::cargo_bin("tunelssh").expect("binary should build");
    cmd.env_remove("TUNELSSH_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn prints_help() {
    cli_bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("remoto"));
}

#[test]
fn prints_guide() {
    cli_bin()
        .arg("ayuda")
        .assert()
        .success()
        .stdout(predicate::str::contains("[bind_address:]socks_port"))
        .stdout(predicate::str::contains("tunelssh socks 192.168.1.10 -D 1080"));
}

#[test]
fn local_tunnel_command_line() {
    cli_bin()
        .args([
            "local",
            "192.168.1.10",
            "-L",
            "8080:127.0.0.1:80",
            "-u",
            "ubuntu",
            "-p",
            "22",
            "--dry-run",
        ])
        .assert()
        .success()
        .stdout("ssh -p 22 -L 8080:127.0.0.1:80 -N ubuntu@192.168.1.10\n");
}

#[test]
fn socks_tunnel_command_line() {
    cli_bin()
        .args(["socks", "192.168.1.10", "-D", "1080", "--no-pty", "--dry-run"])
        .assert()
        .success()
        .stdout("ssh -T -p 22 -D 1080 -N 192.168.1.10\n");
}

#[test]
fn remote_command_replaces_no_execute_flag() {
    cli_bin()
        .args([
            "--dry-run",
            "remoto",
            "srv",
            "-R",
            "9090:127.0.0.1:22",
            "-c",
            "tail -f /var/log/syslog",
        ])
        .assert()
        .success()
        .stdout("ssh -p 22 -R 9090:127.0.0.1:22 srv 'tail -f /var/log/syslog'\n");
}

#[test]
fn mode_mismatch_exits_with_two() {
    cli_bin()
        .args(["local", "srv", "-R", "9090:127.0.0.1:22", "--dry-run"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("mode `local`"));
}

#[test]
fn invalid_port_names_the_token() {
    cli_bin()
        .args(["local", "srv", "-L", "8080:127.0.0.1:web", "--dry-run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("`web`"));
}

#[test]
fn missing_forward_is_rejected() {
    cli_bin()
        .args(["socks", "srv", "--dry-run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn interactive_session_saves_settings() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    let script = "socks\n192.168.1.10\nhelp\n1080\nubuntu\n\n\ny\n\n\n\n\n\ny\n";
    cli_bin()
        .arg("--config")
        .arg(&config)
        .arg("--dry-run")
        .write_stdin(script)
        .assert()
        .success()
        .stdout(predicate::str::contains("Example: 1080 or 127.0.0.1:1080"))
        .stdout(predicate::str::contains(
            "ssh -T -p 22 -D 1080 -N ubuntu@192.168.1.10",
        ));

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&config).unwrap()).unwrap();
    assert_eq!(saved["connection"]["host"], "192.168.1.10");
    assert_eq!(saved["connection"]["pty"], false);
    assert_eq!(saved["tunnel"]["kind"], "dynamic");
    assert_eq!(saved["tunnel"]["listen_port"], 1080);

    // Second run starts from the saved values.
    cli_bin()
        .arg("--config")
        .arg(&config)
        .arg("--dry-run")
        .arg("interactivo")
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("Mode (local/remoto/socks) [socks]"));
}

#[test]
fn interactive_end_of_input_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    cli_bin()
        .arg("--config")
        .arg(&config)
        .arg("--dry-run")
        .write_stdin("local\nsrv\n")
        .assert()
        .success();
    assert!(!config.exists());
}

/// Puts a stand-in `ssh` on PATH that records its pid and then idles.
#[cfg(unix)]
fn fake_ssh(dir: &std::path::Path) -> std::ffi::OsString {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("ssh");
    std::fs::write(&script, "#!/bin/sh\necho $$ > \"$FAKE_SSH_PID\"\nexec sleep 30\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    let mut path = dir.as_os_str().to_owned();
    path.push(":");
    path.push(std::env::var_os("PATH").unwrap_or_default());
    path
}

#[cfg(unix)]
fn wait_for<T>(mut ready: impl FnMut() -> Option<T>) -> T {
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
    loop {
        if let Some(value) = ready() {
            return value;
        }
        assert!(std::time::Instant::now() < deadline, "timed out");
        std::thread::sleep(std::time::Duration::from_millis(50));
    }
}

#[cfg(unix)]
fn send_signal(signal: &str, pid: u32) -> bool {
    std::process::Command::new("kill")
        .args([signal, &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap()
        .success()
}

#[cfg(unix)]
#[test]
fn terminate_stops_ssh_before_exiting() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("ssh.pid");
    let mut tool = std::process::Command::new(assert_cmd::cargo::cargo_bin("tunelssh"))
        .args(["socks", "srv", "-D", "1080"])
        .env("PATH", fake_ssh(dir.path()))
        .env("FAKE_SSH_PID", &pid_file)
        .env_remove("TUNELSSH_CONFIG")
        .env_remove("RUST_LOG")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .unwrap();

    let ssh_pid: u32 = wait_for(|| std::fs::read_to_string(&pid_file).ok()?.trim().parse().ok());
    assert!(send_signal("-TERM", tool.id()));
    let status = wait_for(|| tool.try_wait().unwrap());

    assert_eq!(status.code(), Some(130));
    assert!(!send_signal("-0", ssh_pid), "ssh outlived the tool");
}
