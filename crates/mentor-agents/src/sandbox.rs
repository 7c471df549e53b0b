//! Process-isolated execution of model-generated Python.
//!
//! Code is screened against a denylist, then handed to a fresh `python3 -I`
//! process running a fixed harness. The harness executes the code in a scope
//! built from an explicit capability table and answers with a single JSON
//! object on stdout. On Unix the child also runs under resource limits: no
//! file writes, bounded CPU time and optionally bounded address space.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use mentor_core::{Capabilities, CodeRunner, ExecutionResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const HARNESS: &str = include_str!("sandbox/harness.py");

/// Substrings that reject code before anything runs.
pub const DENYLIST: [&str; 9] = [
    "os.",
    "sys.",
    "subprocess",
    "open(",
    "__import__",
    "__builtins__",
    "__subclasses__",
    "eval(",
    "exec(",
];

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Returns the first denylisted pattern found in `code`.
pub fn screen(code: &str) -> Option<&'static str> {
    DENYLIST.iter().copied().find(|pattern| code.contains(pattern))
}

#[derive(Debug, Clone)]
pub struct SandboxSettings {
    pub python: PathBuf,
    pub timeout: Duration,
    pub memory_limit_mb: Option<u64>,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            python: PathBuf::from("python3"),
            timeout: Duration::from_secs(10),
            memory_limit_mb: None,
        }
    }
}

#[derive(Serialize)]
struct HarnessRequest<'a> {
    code: &'a str,
    use_sympy: bool,
}

#[derive(Deserialize)]
struct HarnessReply {
    stdout: Option<String>,
    error: Option<String>,
}

/// Kills and reaps the child on every exit path.
struct KillOnDrop(Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        if let Ok(None) = self.0.try_wait() {
            let _ = self.0.kill();
        }
        let _ = self.0.wait();
    }
}

pub struct PythonSandbox {
    settings: SandboxSettings,
}

impl PythonSandbox {
    pub fn new(settings: SandboxSettings) -> Self {
        Self { settings }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.settings.python);
        cmd.args(["-I", "-B", "-c", HARNESS])
            .env_clear()
            .current_dir(std::env::temp_dir())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(path) = std::env::var_os("PATH") {
            cmd.env("PATH", path);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;

            let cpu_secs = self.settings.timeout.as_secs() + 1;
            let memory_bytes = self.settings.memory_limit_mb.map(|mb| mb * 1024 * 1024);
            // Runs in the forked child; only async-signal-safe calls allowed.
            unsafe {
                cmd.pre_exec(move || {
                    let cpu = libc::rlimit {
                        rlim_cur: cpu_secs as libc::rlim_t,
                        rlim_max: cpu_secs as libc::rlim_t,
                    };
                    if libc::setrlimit(libc::RLIMIT_CPU, &cpu) != 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                    let no_files = libc::rlimit {
                        rlim_cur: 0,
                        rlim_max: 0,
                    };
                    if libc::setrlimit(libc::RLIMIT_FSIZE, &no_files) != 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                    if let Some(bytes) = memory_bytes {
                        let memory = libc::rlimit {
                            rlim_cur: bytes as libc::rlim_t,
                            rlim_max: bytes as libc::rlim_t,
                        };
                        if libc::setrlimit(libc::RLIMIT_AS, &memory) != 0 {
                            return Err(std::io::Error::last_os_error());
                        }
                    }
                    Ok(())
                });
            }
        }

        cmd
    }

    fn run(&self, code: &str, capabilities: Capabilities) -> Result<String, String> {
        let request = serde_json::to_vec(&HarnessRequest {
            code,
            use_sympy: capabilities.use_sympy,
        })
        .map_err(|e| format!("failed to encode request: {e}"))?;

        let child = self
            .command()
            .spawn()
            .map_err(|e| format!("failed to start {}: {e}", self.settings.python.display()))?;
        let mut child = KillOnDrop(child);

        let stdout = child.0.stdout.take().map(spawn_reader);
        let stderr = child.0.stderr.take().map(spawn_reader);

        if let Some(mut stdin) = child.0.stdin.take() {
            // A child that died early closes the pipe; its status tells the rest.
            if let Err(e) = stdin.write_all(&request) {
                debug!(error = %e, "sandbox stdin closed early");
            }
        }

        let start = Instant::now();
        let status = loop {
            match child.0.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() > self.settings.timeout {
                        drop(child);
                        return Err(format!(
                            "execution timed out after {}s",
                            self.settings.timeout.as_secs_f32()
                        ));
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(format!("error waiting for interpreter: {e}")),
            }
        };

        let stdout = stdout.map(join_reader).unwrap_or_default();
        let stderr = stderr.map(join_reader).unwrap_or_default();

        let reply = stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .and_then(|line| serde_json::from_str::<HarnessReply>(line).ok());

        match reply {
            Some(HarnessReply {
                error: Some(error), ..
            }) => Err(error),
            Some(HarnessReply {
                stdout: Some(out), ..
            }) => Ok(out.trim().to_string()),
            _ if !status.success() => {
                let tail: String = stderr.trim().chars().rev().take(300).collect();
                let tail: String = tail.chars().rev().collect();
                if tail.is_empty() {
                    Err(format!("interpreter exited with {status}"))
                } else {
                    Err(tail)
                }
            }
            _ => Err("malformed reply from interpreter".to_string()),
        }
    }
}

impl Default for PythonSandbox {
    fn default() -> Self {
        Self::new(SandboxSettings::default())
    }
}

impl CodeRunner for PythonSandbox {
    fn execute(&self, code: &str, capabilities: Capabilities) -> ExecutionResult {
        if let Some(pattern) = screen(code) {
            warn!(pattern, "rejected generated code");
            return ExecutionResult::Failed(format!("Security Violation: '{pattern}' is not allowed"));
        }

        let started = Instant::now();
        let result = match self.run(code, capabilities) {
            Ok(out) => ExecutionResult::Output(out),
            Err(e) => ExecutionResult::Failed(e),
        };
        debug!(
            sympy = capabilities.use_sympy,
            ok = result.stdout().is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sandbox run"
        );
        result
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpreter_has(check: &str) -> bool {
        Command::new("python3")
            .args(["-I", "-c", check])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn python_available() -> bool {
        interpreter_has("pass")
    }

    fn sympy_available() -> bool {
        interpreter_has("import sympy")
    }

    #[test]
    fn test_screen() {
        assert_eq!(screen("import subprocess"), Some("subprocess"));
        assert_eq!(screen("f = open('x', 'w')"), Some("open("));
        assert_eq!(screen("print(math.comb(5, 2))"), None);
    }

    #[test]
    fn test_denylisted_code_never_runs() {
        let sandbox = PythonSandbox::new(SandboxSettings {
            python: PathBuf::from("/nonexistent/python3"),
            ..SandboxSettings::default()
        });
        let result = sandbox.execute("import subprocess\nprint(1)", Capabilities::NUMERIC);
        let error = result.error().unwrap();
        assert!(error.contains("subprocess"));
        assert!(result.stdout().is_none());
    }

    #[test]
    fn test_spawn_failure_is_an_error_result() {
        let sandbox = PythonSandbox::new(SandboxSettings {
            python: PathBuf::from("/nonexistent/python3"),
            ..SandboxSettings::default()
        });
        let result = sandbox.execute("print(1)", Capabilities::NUMERIC);
        assert!(result.error().unwrap().contains("failed to start"));
    }

    #[test]
    fn test_prints_are_captured() {
        if !python_available() {
            return;
        }
        let sandbox = PythonSandbox::default();
        let result = sandbox.execute(
            "from fractions import Fraction\nprint(Fraction(1, 6) * Fraction(1, 6))\n",
            Capabilities::NUMERIC,
        );
        assert_eq!(result, ExecutionResult::Output("1/36".into()));

        let result = sandbox.execute("print(math.comb(5, 2))", Capabilities::NUMERIC);
        assert_eq!(result.stdout(), Some("10"));
    }

    #[test]
    fn test_output_and_error_are_exclusive() {
        if !python_available() {
            return;
        }
        let sandbox = PythonSandbox::default();
        let result = sandbox.execute("print('partial')\n1 / 0", Capabilities::NUMERIC);
        assert!(result.stdout().is_none());
        assert_eq!(result.error(), Some("division by zero"));

        let silent = sandbox.execute("x = 2 + 2", Capabilities::NUMERIC);
        assert_eq!(silent.stdout(), Some(""));
        assert!(silent.answer().is_none());
    }

    #[test]
    fn test_unlisted_imports_fail() {
        if !python_available() {
            return;
        }
        let sandbox = PythonSandbox::default();
        let result = sandbox.execute("import socket", Capabilities::NUMERIC);
        assert!(result.error().unwrap().contains("not permitted"));
    }

    #[test]
    fn test_symbolic_capability_gating() {
        if !python_available() {
            return;
        }
        let sandbox = PythonSandbox::default();
        let code = "x = symbols('x')\nprint(diff(x**2, x))";

        let numeric = sandbox.execute(code, Capabilities::NUMERIC);
        assert!(numeric.error().unwrap().contains("symbols"));

        let imported = sandbox.execute("from sympy import symbols", Capabilities::NUMERIC);
        assert!(imported.error().is_some());

        if !sympy_available() {
            return;
        }
        let symbolic = sandbox.execute(code, Capabilities::SYMBOLIC);
        assert_eq!(symbolic.stdout(), Some("2*x"));
    }

    #[test]
    fn test_underscore_attributes_are_rejected() {
        if !python_available() {
            return;
        }
        let sandbox = PythonSandbox::default();
        let result = sandbox.execute(
            "from fractions import Fraction\nprint(Fraction.__new__)",
            Capabilities::NUMERIC,
        );
        assert!(result.error().unwrap().contains("not permitted"));

        let hidden = sandbox.execute("import fractions\nprint(fractions.Decimal)", Capabilities::NUMERIC);
        assert!(hidden.error().is_some());
    }

    #[test]
    fn test_sympy_submodules_are_unreachable() {
        if !python_available() || !sympy_available() {
            return;
        }
        let sandbox = PythonSandbox::default();
        let chained = sandbox.execute(
            "m = sympy.external.importtools.import_module('o' + 's')\nprint(m.getcwd())",
            Capabilities::SYMBOLIC,
        );
        assert!(chained.stdout().is_none());
        assert!(chained.error().unwrap().contains("external"));

        let imported = sandbox.execute(
            "from sympy.external.importtools import import_module",
            Capabilities::SYMBOLIC,
        );
        assert!(imported.error().unwrap().contains("not permitted"));

        let star = sandbox.execute("from sympy import *\nprint(Rational(1, 36))", Capabilities::SYMBOLIC);
        assert_eq!(star.stdout(), Some("1/36"));
    }

    #[test]
    fn test_parsed_strings_get_no_builtins() {
        if !python_available() || !sympy_available() {
            return;
        }
        let sandbox = PythonSandbox::default();
        let escape = sandbox.execute(
            "print(simplify('_' + '_import_' + '_(\"os\").getcwd()'))",
            Capabilities::SYMBOLIC,
        );
        assert!(escape.stdout().is_none());
        assert!(escape.error().unwrap().contains("not permitted"));

        let builtin = sandbox.execute("print(simplify('len(\"abc\")'))", Capabilities::SYMBOLIC);
        assert_eq!(builtin.stdout(), Some("len(abc)"));
    }

    #[test]
    fn test_runaway_code_times_out() {
        if !python_available() {
            return;
        }
        let sandbox = PythonSandbox::new(SandboxSettings {
            timeout: Duration::from_secs(1),
            ..SandboxSettings::default()
        });
        let started = Instant::now();
        let result = sandbox.execute("while True:\n    pass", Capabilities::NUMERIC);
        assert!(result.error().is_some());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
