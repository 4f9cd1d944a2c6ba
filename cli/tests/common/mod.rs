//! Runs the `omr` binary in an isolated environment: its own XDG config home, user data
//! directory and working directory, with updates disabled and no inherited `OMR_*` values.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};

pub const TINY_MODELS: &str = r#"
version: "1.0.0"
models:
  tiny-model:
    context_window: 1000
    max_output_tokens: 100
"#;

pub struct Sandbox {
    root: tempfile::TempDir,
    env: Vec<(String, String)>,
}

impl Sandbox {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        for dir in ["xdg", "data", "cwd"] {
            std::fs::create_dir_all(root.path().join(dir)).unwrap();
        }
        Self {
            root,
            env: vec![("OMR_DISABLE_DATA_UPDATES".to_string(), "1".to_string())],
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.retain(|(k, _)| k != key);
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.path("data")
    }

    pub fn write_config(&self, body: &str) {
        let dir = self.path("xdg").join("model-registry");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), body).unwrap();
    }

    pub fn write_data_file(&self, name: &str, body: &str) {
        std::fs::write(self.data_dir().join(name), body).unwrap();
    }

    pub fn run(&self, args: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_omr"));
        for (key, _) in std::env::vars() {
            if key.starts_with("OMR_") {
                cmd.env_remove(&key);
            }
        }
        cmd.env_remove("RUST_LOG")
            .env_remove("LOG_FILE")
            .env("XDG_CONFIG_HOME", self.path("xdg"))
            .env("OMR_DATA_DIR", self.data_dir())
            .current_dir(self.path("cwd"));
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd.args(args).output().expect("failed to run omr binary")
    }

    /// Runs with `--format json` and parses stdout.
    pub fn json(&self, args: &[&str]) -> (i32, serde_json::Value) {
        let mut full = vec!["--format", "json"];
        full.extend_from_slice(args);
        let out = self.run(&full);
        let code = out.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&out.stdout);
        let value = serde_json::from_str(&stdout).unwrap_or_else(|e| {
            panic!(
                "stdout is not json ({}): {}\nstderr: {}",
                e,
                stdout,
                String::from_utf8_lossy(&out.stderr)
            )
        });
        (code, value)
    }
}

pub fn code(out: &Output) -> i32 {
    out.status.code().unwrap_or(-1)
}

pub fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

pub fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}
