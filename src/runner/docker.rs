//! `docker` CLI backed compose runner

use super::{ComposeRunner, ContainerSnapshot, PortBindings};
use crate::error::RunError;
use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Compose runner that shells out to the docker CLI
#[derive(Debug, Clone)]
pub struct DockerCli {
    bin_path: PathBuf,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new(PathBuf::from("docker"))
    }
}

impl DockerCli {
    pub fn new(bin_path: PathBuf) -> Self {
        Self { bin_path }
    }

    fn command_line(&self, args: &[OsString]) -> String {
        let mut line = self.bin_path.to_string_lossy().into_owned();
        for arg in args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Run the docker binary and capture its output whatever the exit status
    async fn exec(&self, args: Vec<OsString>, cwd: Option<&Path>) -> Result<CliOutput, RunError> {
        let command_line = self.command_line(&args);
        tracing::debug!("running {}", command_line);

        let mut cmd = Command::new(&self.bin_path);
        cmd.args(&args).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| RunError::new(None, &command_line, e.to_string()))?;

        Ok(CliOutput {
            command_line,
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run the docker binary and return its stdout
    async fn run(&self, args: Vec<OsString>, cwd: Option<&Path>) -> Result<String, RunError> {
        let output = self.exec(args, cwd).await?;
        if !output.success {
            return Err(output.into_error());
        }
        Ok(output.stdout)
    }
}

/// Captured result of one docker invocation
#[derive(Debug, Clone)]
struct CliOutput {
    command_line: String,
    success: bool,
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl CliOutput {
    fn into_error(self) -> RunError {
        RunError::new(self.exit_code, self.command_line, self.stderr)
    }
}

#[async_trait]
impl ComposeRunner for DockerCli {
    async fn up(&self, compose_file: &Path) -> Result<(), RunError> {
        let args: Vec<OsString> = vec![
            "compose".into(),
            "-f".into(),
            compose_file.as_os_str().to_owned(),
            "up".into(),
            "--detach".into(),
        ];

        // Relative paths in the compose file resolve against its directory
        let cwd = compose_file.parent().filter(|p| p.is_dir());
        self.run(args, cwd).await?;
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSnapshot>, RunError> {
        let ids = self
            .run(vec!["ps".into(), "--quiet".into(), "--no-trunc".into()], None)
            .await?;
        let ids = parse_container_ids(&ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut args: Vec<OsString> = vec!["inspect".into()];
        args.extend(ids.iter().map(OsString::from));
        let output = self.exec(args, None).await?;

        snapshots_from_inspect(output)
    }

    async fn version(&self) -> Result<String, RunError> {
        let args: Vec<OsString> = vec![
            "system".into(),
            "info".into(),
            "--format".into(),
            "{{json .}}".into(),
        ];
        let command_line = self.command_line(&args);
        let json = self.run(args, None).await?;

        parse_server_version(&json)
            .ok_or_else(|| RunError::new(None, command_line, "no ServerVersion in system info"))
    }
}

#[derive(Debug, Deserialize)]
struct InspectedContainer {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "NetworkSettings", default)]
    network_settings: Option<NetworkSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct NetworkSettings {
    #[serde(rename = "Ports", default)]
    ports: Option<PortBindings>,
}

#[derive(Debug, Deserialize)]
struct SystemInfo {
    #[serde(rename = "ServerVersion", default)]
    server_version: Option<String>,
}

fn parse_container_ids(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `docker inspect` output into container snapshots
fn parse_inspect(json: &str) -> Result<Vec<ContainerSnapshot>, serde_json::Error> {
    let containers: Vec<InspectedContainer> = serde_json::from_str(json)?;
    let empty = PortBindings::new();

    Ok(containers
        .iter()
        .map(|c| {
            let ports = c
                .network_settings
                .as_ref()
                .and_then(|n| n.ports.as_ref())
                .unwrap_or(&empty);
            ContainerSnapshot::from_bindings(&c.name, ports)
        })
        .collect())
}

/// Turn an `inspect` invocation into snapshots
///
/// A container that exits between `ps` and `inspect` makes `inspect` fail
/// while still printing the containers it did find. Those are kept.
fn snapshots_from_inspect(output: CliOutput) -> Result<Vec<ContainerSnapshot>, RunError> {
    match parse_inspect(&output.stdout) {
        Ok(containers) if output.success => Ok(containers),
        Ok(containers) => {
            tracing::warn!(
                "some containers vanished during inspect, keeping {}: {}",
                containers.len(),
                output.stderr.trim()
            );
            Ok(containers)
        }
        Err(_) if !output.success => Err(output.into_error()),
        Err(e) => Err(RunError::new(
            None,
            output.command_line,
            format!("unexpected inspect output: {}", e),
        )),
    }
}

fn parse_server_version(json: &str) -> Option<String> {
    let info: SystemInfo = serde_json::from_str(json.trim()).ok()?;
    info.server_version.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{Protocol, PublishedPort};

    const INSPECT: &str = r#"[
  {
    "Id": "4f2a",
    "Name": "/app-web-1",
    "NetworkSettings": {
      "Ports": {
        "80/tcp": [
          { "HostIp": "0.0.0.0", "HostPort": "8080" },
          { "HostIp": "::", "HostPort": "8080" }
        ],
        "443/tcp": null
      }
    }
  },
  {
    "Id": "9c1b",
    "Name": "/app-worker-1",
    "NetworkSettings": { "Ports": {} }
  },
  {
    "Id": "77aa",
    "Name": "/app-host-1",
    "NetworkSettings": { "Ports": null }
  }
]"#;

    #[test]
    fn test_parse_inspect() {
        let containers = parse_inspect(INSPECT).unwrap();
        assert_eq!(containers.len(), 3);

        assert_eq!(containers[0].name, "app-web-1");
        assert_eq!(
            containers[0].published_ports.iter().copied().collect::<Vec<_>>(),
            vec![PublishedPort::new(8080, Protocol::Tcp)]
        );
        assert!(containers[1].published_ports.is_empty());
        assert!(containers[2].published_ports.is_empty());
    }

    fn inspect_output(success: bool, code: i32, stdout: &str, stderr: &str) -> CliOutput {
        CliOutput {
            command_line: "docker inspect 4f2a abc".to_string(),
            success,
            exit_code: Some(code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_inspect_keeps_containers_when_one_vanished() {
        let stdout = r#"[{"Name":"/app-web-1","NetworkSettings":{"Ports":{"80/tcp":[{"HostIp":"0.0.0.0","HostPort":"8080"}]}}}]"#;
        let output = inspect_output(false, 1, stdout, "Error: No such object: abc\n");

        let containers = snapshots_from_inspect(output).unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].name, "app-web-1");
        assert!(containers[0]
            .published_ports
            .contains(&PublishedPort::new(8080, Protocol::Tcp)));
    }

    #[test]
    fn test_inspect_failure_without_output_is_an_error() {
        let output = inspect_output(false, 1, "", "Cannot connect to the Docker daemon\n");

        let err = snapshots_from_inspect(output).unwrap_err();
        assert_eq!(err.exit_code, Some(1));
        assert_eq!(err.command, "docker inspect 4f2a abc");
        assert_eq!(err.stderr, "Cannot connect to the Docker daemon");
    }

    #[test]
    fn test_inspect_garbage_on_success_is_an_error() {
        let err = snapshots_from_inspect(inspect_output(true, 0, "not json", "")).unwrap_err();
        assert_eq!(err.exit_code, None);
        assert!(err.stderr.contains("unexpected inspect output"));
    }

    #[test]
    fn test_parse_container_ids() {
        assert_eq!(parse_container_ids("abc\n\ndef\n"), vec!["abc", "def"]);
        assert!(parse_container_ids("\n").is_empty());
    }

    #[test]
    fn test_parse_server_version() {
        assert_eq!(
            parse_server_version(r#"{"ServerVersion":"24.0.7","Containers":3}"#),
            Some("24.0.7".to_string())
        );
        assert_eq!(parse_server_version(r#"{"ServerVersion":""}"#), None);
        assert_eq!(parse_server_version("not json"), None);
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_run_error() {
        let cli = DockerCli::new(PathBuf::from("/nonexistent/docker-binary"));
        let err = cli.up(Path::new("/nonexistent/docker-compose.yml")).await.unwrap_err();
        assert_eq!(err.exit_code, None);
        assert!(err.command.contains("compose -f /nonexistent/docker-compose.yml up --detach"));
        assert!(!err.stderr.is_empty());
    }
}
