use assert_cmd::Command;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

#[derive(Debug)]
pub struct JwiRun {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
    pub duration: Duration,
}

impl JwiRun {
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

pub struct JwiWorkspace {
    pub temp_dir: TempDir,
    pub root: PathBuf,
}

impl JwiWorkspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let root = temp_dir.path().to_path_buf();
        Self { temp_dir, root }
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.root.join(name);
        fs::write(&path, contents).expect("write workspace file");
        path
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        Path::new(&self.root.join(name)).exists()
    }
}

pub fn run_jwi<I, S>(workspace: &JwiWorkspace, args: I) -> JwiRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_jwi_with_env(workspace, args, std::iter::empty::<(String, String)>())
}

/// Run the binary in the workspace with a clean environment plus `env_vars`.
pub fn run_jwi_with_env<I, S, E, K, V>(workspace: &JwiWorkspace, args: I, env_vars: E) -> JwiRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
    E: IntoIterator<Item = (K, V)>,
    K: AsRef<OsStr>,
    V: AsRef<OsStr>,
{
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("jwi"));
    cmd.current_dir(&workspace.root);
    cmd.env_clear();
    cmd.env("HOME", &workspace.root);
    cmd.env("NO_COLOR", "1");
    cmd.env("RUST_LOG", "jira_worklog_import=debug");
    cmd.args(args);
    cmd.envs(env_vars);

    let start = Instant::now();
    let output = cmd.output().expect("run jwi");
    JwiRun {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        status: output.status,
        duration: start.elapsed(),
    }
}
