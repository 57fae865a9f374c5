//! Shared fixtures: a fake `soffice` and service construction.
//!
//! The fake engine is a POSIX shell script that understands the subset of
//! the office suite's CLI the service uses and follows its naming rule
//! (`{outdir}/{input stem}.{ext}`). It is launched as `sh <script> <mode>
//! <log> …` rather than executed directly, so writing it and running it
//! in the same test never races on the executable bit.

#![allow(dead_code)]

use docconvert::{ConversionService, ServiceConfig, ServiceConfigBuilder};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FAKE_SOFFICE: &str = r#"#!/bin/sh
mode="$1"; shift
log="$1"; shift
echo "$@" >> "$log"

target=""; outdir=""; input=""
while [ $# -gt 0 ]; do
  case "$1" in
    --convert-to) target="$2"; shift 2 ;;
    --outdir) outdir="$2"; shift 2 ;;
    --*) shift ;;
    *) input="$1"; shift ;;
  esac
done

ext="${target%%:*}"
name=$(basename "$input")
stem="${name%.*}"

case "$mode" in
  fail) echo "Error: source file could not be loaded" >&2; exit 81 ;;
  silent) exit 0 ;;
  slow) exec sleep 30 ;;
  fork) sleep 30 & echo $! > "$log.worker"; wait; exit 0 ;;
  doc) [ "$ext" = "docx" ] && ext="doc" ;;
esac

echo "convert $input -> $outdir/$stem.$ext using filter : $target"
{ echo "converted from $name"; cat "$input"; } > "$outdir/$stem.$ext"
"#;

/// Behaviour of one fake engine instance.
#[derive(Debug, Clone, Copy)]
pub enum EngineMode {
    /// Convert and write the expected file.
    Ok,
    /// Exit 81 with a message on stderr.
    Fail,
    /// Exit 0 without writing anything.
    Silent,
    /// Hang well past any test timeout.
    Slow,
    /// Write `.doc` where `.docx` was requested.
    Doc,
    /// Fork a long-lived worker and wait on it, like the real launcher.
    Fork,
}

impl EngineMode {
    fn as_str(self) -> &'static str {
        match self {
            EngineMode::Ok => "ok",
            EngineMode::Fail => "fail",
            EngineMode::Silent => "silent",
            EngineMode::Slow => "slow",
            EngineMode::Doc => "doc",
            EngineMode::Fork => "fork",
        }
    }
}

/// Scratch workspace with upload/result dirs and the fake engine script.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        init_tracing();
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("soffice.sh"), FAKE_SOFFICE).unwrap();
        Self { dir }
    }

    pub fn uploads(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    pub fn converted(&self) -> PathBuf {
        self.dir.path().join("converted")
    }

    /// One line per engine invocation, holding its arguments.
    pub fn engine_log(&self) -> Vec<String> {
        std::fs::read_to_string(self.log_path())
            .unwrap_or_default()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// PID of the worker forked in [`EngineMode::Fork`].
    pub fn worker_pid(&self) -> Option<u32> {
        let mut path = self.log_path().into_os_string();
        path.push(".worker");
        std::fs::read_to_string(path).ok()?.trim().parse().ok()
    }

    fn log_path(&self) -> PathBuf {
        self.dir.path().join("engine.log")
    }

    /// Builder pointed at this workspace and the fake engine in `mode`.
    pub fn config(&self, mode: EngineMode) -> ServiceConfigBuilder {
        ServiceConfig::builder()
            .upload_dir(self.uploads())
            .converted_dir(self.converted())
            .engine_binary("sh")
            .engine_args([
                self.dir.path().join("soffice.sh").display().to_string(),
                mode.as_str().to_string(),
                self.log_path().display().to_string(),
            ])
    }

    pub fn service(&self, mode: EngineMode) -> ConversionService {
        ConversionService::new(self.config(mode).build().unwrap())
    }
}

/// Route library logs to the test harness; `RUST_LOG=debug` shows engine output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Whether `pid` is a live (non-zombie) process.
pub fn process_alive(pid: u32) -> bool {
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        // state follows the parenthesised command name
        return stat
            .rsplit(')')
            .next()
            .and_then(|rest| rest.split_whitespace().next())
            .is_some_and(|state| state != "Z" && state != "X");
    }
    if std::path::Path::new("/proc/self").exists() {
        return false;
    }
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Names of the entries in `dir`, or empty if it does not exist.
pub fn entries(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(rd) => {
            let mut names: Vec<String> = rd
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            names
        }
        Err(_) => Vec::new(),
    }
}

pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n1 0 obj<<>>endobj\ntrailer<<>>\n%%EOF\n";
pub const DOCX_BYTES: &[u8] = b"PK\x03\x04 fake docx payload";
