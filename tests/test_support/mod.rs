#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

/// Workspace with the artificial login/save delays switched off.
pub fn temp_workspace(prefix: &str) -> PathBuf {
    let p = temp_dir(prefix);
    std::fs::write(
        p.join("portal.toml"),
        "[session]\nlogin_delay_ms = 0\n\n[storage]\nsave_delay_ms = 0\n",
    )
    .expect("write portal.toml");
    p
}

pub struct Sidecar {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn spawn_sidecar() -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_iesportald");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn iesportald");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
        next_id: 0,
    }
}

impl Sidecar {
    /// Send one request and return the full response envelope.
    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");

        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .expect("read response line");
        assert!(!line.trim().is_empty(), "empty response for {}", method);
        let value: serde_json::Value =
            serde_json::from_str(line.trim()).expect("parse response json");
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or(serde_json::Value::Null)
    }

    /// Expect a failure and return its error code.
    pub fn request_err(&mut self, method: &str, params: serde_json::Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .expect("error code")
            .to_string()
    }

    pub fn select(&mut self, workspace: &PathBuf) {
        let _ = self.request_ok(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
    }

    pub fn login(&mut self, username: &str, secret: &str) {
        let res = self.request_ok(
            "auth.login",
            json!({ "username": username, "secret": secret }),
        );
        assert_eq!(res.get("ok").and_then(|v| v.as_bool()), Some(true), "{}", res);
    }
}

pub fn changed_keys(result: &serde_json::Value) -> Vec<String> {
    result
        .get("collections")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}
