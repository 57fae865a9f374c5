//! External engine invocation: run the headless office suite and find what it wrote.
//!
//! ## Why locate-then-move?
//!
//! `soffice --convert-to` does not take an output filename. It writes into
//! `--outdir` using the *input's* base name with the target extension, and
//! for some filters it picks a different extension than asked for (legacy
//! `.doc` instead of `.docx`). So every step probes the output directory for
//! the candidates it could have produced and only then moves the winner to
//! where the caller wants it.
//!
//! ## Why a scratch directory per run?
//!
//! Each [`EngineInvoker::convert`] call gets a fresh hidden directory inside
//! the destination directory. Probing is unambiguous (nothing else writes
//! there), the final rename stays on one filesystem, and whatever a killed
//! or failed run left behind disappears with the directory.
//!
//! ## Why a semaphore?
//!
//! Headless office suites lock their user profile. Two processes sharing a
//! profile either fail or silently convert nothing, so launches are gated by
//! a [`Semaphore`] sized from [`ServiceConfig::engine_concurrency`].

use crate::config::ServiceConfig;
use crate::error::DocConvertError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// One `--convert-to` invocation of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStep {
    /// Value passed to `--convert-to`, e.g. `"pdf:writer_pdf_Export"`.
    pub convert_to: &'static str,
    /// Extension the engine is expected to write.
    pub extension: &'static str,
    /// Other extensions the engine may write instead, probed in order.
    pub alternates: &'static [&'static str],
    /// Import filter forced with `--infilter=`, if any.
    pub infilter: Option<&'static str>,
}

impl EngineStep {
    /// Every extension worth probing for, preferred first.
    pub fn candidate_extensions(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.extension).chain(self.alternates.iter().copied())
    }
}

/// Exit status and captured text of one engine process.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// stdout followed by stderr.
    pub output: String,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs the external conversion engine.
#[derive(Debug, Clone)]
pub struct EngineInvoker {
    binary: PathBuf,
    extra_args: Vec<String>,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl EngineInvoker {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            binary: config.engine_binary.clone(),
            extra_args: config.engine_args.clone(),
            timeout: config.engine_timeout(),
            permits: Arc::new(Semaphore::new(config.engine_concurrency.max(1))),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Arguments for one step, binary excluded.
    pub fn command_args(&self, input: &Path, out_dir: &Path, step: &EngineStep) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.extra_args.iter().map(OsString::from).collect();
        args.push("--headless".into());
        if let Some(filter) = step.infilter {
            args.push(format!("--infilter={filter}").into());
        }
        args.push("--convert-to".into());
        args.push(step.convert_to.into());
        args.push("--outdir".into());
        args.push(out_dir.as_os_str().to_owned());
        args.push(input.as_os_str().to_owned());
        args
    }

    /// Run `steps` in order starting from `input` and move the final product
    /// to `output`.
    ///
    /// Each step reads the previous step's product. Intermediates are deleted
    /// as soon as the next step has consumed them; a failed deletion is only
    /// logged. `input` itself is never touched.
    pub async fn convert(
        &self,
        input: &Path,
        steps: &[EngineStep],
        output: &Path,
    ) -> Result<(), DocConvertError> {
        if steps.is_empty() {
            return Err(DocConvertError::Internal("empty engine plan".into()));
        }
        let dest_dir = output
            .parent()
            .ok_or_else(|| DocConvertError::Internal(format!("no parent for {:?}", output)))?;
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| DocConvertError::storage(dest_dir, e))?;

        let scratch = tempfile::Builder::new()
            .prefix(".engine-")
            .tempdir_in(dest_dir)
            .map_err(|e| DocConvertError::storage(dest_dir, e))?;

        let mut current = input.to_path_buf();
        for (i, step) in steps.iter().enumerate() {
            let produced = self.run_step(&current, scratch.path(), step).await?;
            if i > 0 {
                // `current` is the previous step's intermediate.
                if let Err(e) = tokio::fs::remove_file(&current).await {
                    warn!("Failed to remove intermediate {}: {}", current.display(), e);
                }
            }
            current = produced;
        }

        tokio::fs::rename(&current, output)
            .await
            .map_err(|e| DocConvertError::MoveFailed {
                from: current.clone(),
                to: output.to_path_buf(),
                source: e,
            })?;
        debug!("Moved {} to {}", current.display(), output.display());

        if let Err(e) = scratch.close() {
            warn!("Failed to remove engine scratch directory: {}", e);
        }
        Ok(())
    }

    /// Run one step and return the path of the file the engine produced.
    ///
    /// The returned path lives in `out_dir` and is named after `input`, not
    /// after any caller-chosen name.
    pub async fn run_step(
        &self,
        input: &Path,
        out_dir: &Path,
        step: &EngineStep,
    ) -> Result<PathBuf, DocConvertError> {
        let args = self.command_args(input, out_dir, step);
        let outcome = self.execute(&args).await?;

        if !outcome.success() {
            error!(
                "Conversion engine failed on {} ({:?}):\n{}",
                input.display(),
                outcome.code,
                outcome.output
            );
            return Err(DocConvertError::EngineFailed {
                code: outcome.code,
                output: outcome.output,
            });
        }

        match locate_output(out_dir, input, step).await {
            Some(found) => Ok(found),
            None => {
                let expected = expected_output(out_dir, input, step.extension);
                error!(
                    "Conversion engine exited cleanly but wrote no {} output for {}:\n{}",
                    step.extension,
                    input.display(),
                    outcome.output
                );
                Err(DocConvertError::OutputNotFound {
                    expected,
                    output: outcome.output,
                })
            }
        }
    }

    /// Launch the engine with `args`, wait for it, and capture its output.
    ///
    /// The child is spawned with `kill_on_drop` and, on unix, as the leader
    /// of a new process group. `soffice` is a launcher that forks the real
    /// worker, so on timeout the whole group is killed before the permit is
    /// released.
    pub async fn execute(&self, args: &[OsString]) -> Result<ProcessOutcome, DocConvertError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| DocConvertError::Internal("engine pool closed".into()))?;

        info!("Running conversion engine: {}", self.render_command(args));
        let start = Instant::now();

        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = command
            .spawn()
            .map_err(|e| DocConvertError::EngineUnavailable {
                binary: self.binary.display().to_string(),
                source: e,
            })?;
        let pid = child.id();

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| {
                DocConvertError::Internal(format!("failed to wait for conversion engine: {e}"))
            })?,
            Err(_) => {
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                warn!(
                    "Conversion engine exceeded {}s, killed",
                    self.timeout.as_secs()
                );
                return Err(DocConvertError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let outcome = ProcessOutcome {
            code: output.status.code(),
            output: text,
        };
        debug!(
            "Conversion engine finished in {}ms with {:?}:\n{}",
            start.elapsed().as_millis(),
            outcome.code,
            outcome.output.trim_end()
        );
        Ok(outcome)
    }

    fn render_command(&self, args: &[OsString]) -> String {
        let mut parts = vec![self.binary.display().to_string()];
        parts.extend(args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}

/// SIGKILL every process in the group led by `pgid`.
#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    let result = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
    if result != 0 {
        let err = std::io::Error::last_os_error();
        // ESRCH: the group is already gone.
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!("Failed to kill engine process group {}: {}", pgid, err);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

fn expected_output(out_dir: &Path, input: &Path, extension: &str) -> PathBuf {
    let stem = input.file_stem().unwrap_or(input.as_os_str());
    let mut name = stem.to_owned();
    name.push(".");
    name.push(extension);
    out_dir.join(name)
}

/// Find the file the engine wrote for `input`: `{stem}.{ext}` for the step's
/// extension and then each alternate, first existing wins.
pub async fn locate_output(out_dir: &Path, input: &Path, step: &EngineStep) -> Option<PathBuf> {
    for ext in step.candidate_extensions() {
        let candidate = expected_output(out_dir, input, ext);
        if let Ok(meta) = tokio::fs::metadata(&candidate).await {
            if meta.is_file() {
                debug!("Located engine output {}", candidate.display());
                return Some(candidate);
            }
        }
    }
    None
}
