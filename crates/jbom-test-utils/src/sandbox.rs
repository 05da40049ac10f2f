//! Temp-dir sandbox for driving the `jbom` binary from tests.
//!
//! Everything lives under an `assert_fs::TempDir` and is cleaned up on drop.
//! Commands run with an isolated `HOME`, colors disabled and `RUST_LOG`
//! cleared so output is stable enough for inline snapshots.
//!
//! ```no_run
//! use jbom_test_utils::Sandbox;
//!
//! let mut sb = Sandbox::new();
//! sb.write("board/board.kicad_pro", "{}");
//! let out = sb.snapshot_run("jbom", ["info", "board"]);
//! assert!(out.contains("Exit Code: 0"));
//! ```

use assert_fs::TempDir;
use assert_fs::fixture::PathChild;
use duct::Expression;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of a command run with [`Sandbox::run_unchecked`].
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub struct Sandbox {
    root: TempDir,
    pub home: PathBuf,
    default_cwd: PathBuf,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox {
    pub fn new() -> Self {
        let root = TempDir::new().expect("create sandbox TempDir");
        let home = root.child("home").to_path_buf();
        fs::create_dir_all(&home).expect("create home dir");
        let default_cwd = root.path().to_path_buf();
        Self {
            root,
            home,
            default_cwd,
        }
    }

    pub fn default_cwd(&self) -> &Path {
        &self.default_cwd
    }

    /// Set the default working directory for commands. Path is relative to sandbox root if not absolute.
    pub fn set_default_cwd<P: AsRef<Path>>(&mut self, cwd: P) -> &mut Self {
        let cwd = cwd.as_ref();
        self.default_cwd = if cwd.is_absolute() {
            cwd.to_path_buf()
        } else {
            self.root_path().join(cwd)
        };
        self
    }

    pub fn root_path(&self) -> &Path {
        self.root.path()
    }

    /// Write/overwrite a file relative to the sandbox root.
    pub fn write<P: AsRef<Path>, S: AsRef<[u8]>>(&mut self, rel: P, contents: S) -> &mut Self {
        let p = self.root_path().join(rel);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(p, contents).expect("write file");
        self
    }

    /// Read a file relative to the sandbox root.
    pub fn read<P: AsRef<Path>>(&self, rel: P) -> String {
        fs::read_to_string(self.root_path().join(rel)).expect("read file")
    }

    /// Build a `duct::Expression` for a cargo binary, pre-wired with the
    /// sandbox env and working directory.
    pub fn cmd<I>(&self, program: &str, args: I, cwd: Option<&Path>) -> Expression
    where
        I: IntoIterator,
        I::Item: AsRef<OsStr>,
    {
        let cargo_bin_path = assert_cmd::cargo::cargo_bin(program)
            .to_string_lossy()
            .to_string();
        let args: Vec<_> = args
            .into_iter()
            .map(|arg| arg.as_ref().to_string_lossy().to_string())
            .collect();

        let working_dir = match cwd {
            Some(dir) if dir.is_absolute() => dir.to_path_buf(),
            Some(dir) => self.root_path().join(dir),
            None => self.default_cwd.clone(),
        };
        self.inject_env(duct::cmd(&cargo_bin_path, args).dir(working_dir))
    }

    /// Run a cargo binary and return stdout. Errors if the process exits with non-zero status.
    pub fn run<I>(&self, program: &str, args: I, cwd: Option<&Path>) -> Result<String, String>
    where
        I: IntoIterator,
        I::Item: AsRef<OsStr>,
    {
        self.cmd(program, args, cwd)
            .read()
            .map_err(|e| format!("command failed: {e}"))
    }

    /// Run a cargo binary capturing stdout, stderr and the exit code.
    pub fn run_unchecked<I>(&self, program: &str, args: I) -> RunOutput
    where
        I: IntoIterator,
        I::Item: AsRef<OsStr>,
    {
        let output = self
            .cmd(program, args, None)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .expect("spawn command");
        RunOutput {
            code: output.status.code(),
            stdout: self.redact(&String::from_utf8_lossy(&output.stdout)),
            stderr: self.redact(&String::from_utf8_lossy(&output.stderr)),
        }
    }

    /// Run a cargo binary and format exit code, stdout and stderr into one
    /// string for snapshotting. Sandbox paths are replaced with `[ROOT]`.
    pub fn snapshot_run<I>(&self, program: &str, args: I) -> String
    where
        I: IntoIterator,
        I::Item: AsRef<OsStr>,
    {
        let out = self.run_unchecked(program, args);
        format!(
            "Exit Code: {}\n--- STDOUT ---\n{}--- STDERR ---\n{}",
            out.code.unwrap_or(-1),
            out.stdout,
            out.stderr
        )
    }

    fn redact(&self, text: &str) -> String {
        let mut text = text.replace('\r', "");
        let mut roots = vec![self.root_path().to_path_buf()];
        if let Ok(canonical) = self.root_path().canonicalize() {
            // macOS temp dirs live behind a /private symlink
            roots.insert(0, canonical);
        }
        for root in roots {
            text = text.replace(root.to_string_lossy().as_ref(), "[ROOT]");
        }
        text
    }

    pub fn inject_env(&self, expr: Expression) -> Expression {
        let mut env_map: HashMap<String, String> = HashMap::new();
        if let Ok(path) = std::env::var("PATH") {
            env_map.insert("PATH".into(), path);
        }
        env_map.insert("HOME".into(), self.home.to_string_lossy().into_owned());
        env_map.insert(
            "XDG_CONFIG_HOME".into(),
            self.home.to_string_lossy().into_owned(),
        );
        env_map.insert("NO_COLOR".into(), "1".into());
        env_map.insert("CLICOLOR".into(), "0".into());
        expr.full_env(&env_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_cwd() {
        let mut sb = Sandbox::new();
        sb.write("a/b/c.txt", "hello");
        assert_eq!(sb.read("a/b/c.txt"), "hello");

        sb.set_default_cwd("a");
        assert_eq!(sb.default_cwd(), sb.root_path().join("a"));
        assert_eq!(
            sb.redact(&format!("{}/x", sb.root_path().display())),
            "[ROOT]/x"
        );
    }
}
