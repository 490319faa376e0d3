//! Child-process execution for the external gettext tools.
//!
//! Every external program (xgettext, msgmerge, an optional template compiler)
//! goes through [`ProcessRunner`] so the pipeline can be exercised in tests
//! without the tools installed.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::process::{Command, ExitStatus, Stdio};

use serde::Serialize;

use crate::error::{GettextError, Result};
use crate::util::shell_quote;

/// Exit code reported when the program itself could not be found.
pub const COMMAND_NOT_FOUND: i32 = 127;

/// An argument vector plus extra environment for one child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub argv: Vec<OsString>,
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            argv: vec![program.into()],
            env: BTreeMap::new(),
        }
    }

    pub fn arg(&mut self, value: impl Into<OsString>) -> &mut Self {
        self.argv.push(value.into());
        self
    }

    pub fn args<I, S>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.argv.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Shell-style rendering used in failure messages.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.argv
            .iter()
            .map(|arg| shell_quote(&arg.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[must_use]
    pub fn arg_strings(&self) -> Vec<String> {
        self.argv
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    pub exit_code: i32,
    pub exit_text: String,
    pub command_line: String,
    pub stderr: String,
}

impl ProcessOutcome {
    #[must_use]
    pub fn from_exit_code(invocation: &Invocation, exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            exit_text: exit_code_text(exit_code).to_string(),
            command_line: invocation.command_line(),
            stderr: stderr.into(),
        }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

pub trait ProcessRunner {
    /// Runs the invocation to completion. Only failures to start the child
    /// (other than a missing program) are returned as errors.
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutcome>;
}

/// Runs invocations as real child processes and blocks until they exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutcome> {
        let Some((program, args)) = invocation.argv.split_first() else {
            return Err(GettextError::config("cannot run an empty command line"));
        };

        tracing::debug!(command = %invocation.command_line(), "spawning child process");

        let output = Command::new(program)
            .args(args)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        match output {
            Ok(output) => {
                let exit_code = exit_code_of(output.status);
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                tracing::debug!(exit_code, "child process finished");
                Ok(ProcessOutcome::from_exit_code(invocation, exit_code, stderr))
            }
            Err(error) if error.kind() == ErrorKind::NotFound => {
                tracing::warn!(program = %program.to_string_lossy(), "program not found");
                Ok(ProcessOutcome::from_exit_code(
                    invocation,
                    COMMAND_NOT_FOUND,
                    error.to_string(),
                ))
            }
            Err(error) => Err(error.into()),
        }
    }
}

fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

/// Conventional shell meaning of an exit code.
#[must_use]
pub fn exit_code_text(code: i32) -> &'static str {
    match code {
        0 => "OK",
        1 => "General error",
        2 => "Misuse of shell builtins",
        126 => "Invoked command cannot execute",
        127 => "Command not found",
        128 => "Invalid exit argument",
        129 => "Hangup",
        130 => "Interrupt",
        131 => "Quit and dump core",
        132 => "Illegal instruction",
        133 => "Trace/breakpoint trap",
        134 => "Process aborted",
        135 => "Bus error: \"access to undefined portion of memory object\"",
        136 => "Floating point exception: \"erroneous arithmetic operation\"",
        137 => "Kill (terminate immediately)",
        138 => "User-defined 1",
        139 => "Segmentation violation",
        140 => "User-defined 2",
        141 => "Write to pipe with no one reading",
        142 => "Signal raised by alarm",
        143 => "Termination (request to terminate)",
        145 => "Child process terminated, stopped (or continued*)",
        146 => "Continue if stopped",
        147 => "Stop executing temporarily",
        148 => "Terminal stop signal",
        149 => "Background process attempting to read from tty (\"in\")",
        150 => "Background process attempting to write to tty (\"out\")",
        151 => "Urgent data available on socket",
        152 => "CPU time limit exceeded",
        153 => "File size limit exceeded",
        154 => "Signal raised by timer counting virtual time: \"virtual timer expired\"",
        155 => "Profiling timer expired",
        157 => "Pollable event",
        159 => "Bad syscall",
        _ => "Unknown error",
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::tempdir;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    use super::{COMMAND_NOT_FOUND, Invocation, ProcessRunner, SystemRunner, exit_code_text};

    fn write_script(path: &Path, body: &str) {
        fs::write(path, body).expect("write script");

        #[cfg(unix)]
        {
            let mut perms = fs::metadata(path).expect("metadata").permissions();
            perms.set_mode(0o755);
            fs::set_permissions(path, perms).expect("set permissions");
        }
    }

    #[test]
    fn exit_code_text_covers_common_codes() {
        assert_eq!(exit_code_text(0), "OK");
        assert_eq!(exit_code_text(1), "General error");
        assert_eq!(exit_code_text(127), "Command not found");
        assert_eq!(exit_code_text(139), "Segmentation violation");
        assert_eq!(exit_code_text(42), "Unknown error");
    }

    #[test]
    fn command_line_quotes_arguments_with_spaces() {
        let mut invocation = Invocation::new("xgettext");
        invocation
            .arg("--output=/tmp/messages.pot")
            .arg("--copyright-holder=Your Name");
        assert_eq!(
            invocation.command_line(),
            "xgettext --output=/tmp/messages.pot '--copyright-holder=Your Name'"
        );
    }

    #[test]
    fn empty_invocation_is_rejected() {
        let invocation = Invocation::default();
        assert!(SystemRunner.run(&invocation).is_err());
    }

    #[test]
    fn missing_program_is_reported_as_command_not_found() {
        let invocation = Invocation::new("blade-gettext-definitely-missing-tool");
        let outcome = SystemRunner.run(&invocation).expect("outcome");
        assert_eq!(outcome.exit_code, COMMAND_NOT_FOUND);
        assert_eq!(outcome.exit_text, "Command not found");
        assert!(!outcome.success());
    }

    #[cfg(unix)]
    #[test]
    fn successful_script_reports_zero_exit() {
        let temp = tempdir().expect("tempdir");
        let script = temp.path().join("ok.sh");
        write_script(&script, "#!/bin/sh\nexit 0\n");

        let outcome = SystemRunner.run(&Invocation::new(&script)).expect("outcome");
        assert!(outcome.success());
        assert_eq!(outcome.exit_text, "OK");
    }

    #[cfg(unix)]
    #[test]
    fn failing_script_captures_exit_code_and_stderr() {
        let temp = tempdir().expect("tempdir");
        let script = temp.path().join("fail.sh");
        write_script(&script, "#!/bin/sh\necho \"bad keyword\" >&2\nexit 3\n");

        let outcome = SystemRunner.run(&Invocation::new(&script)).expect("outcome");
        assert_eq!(outcome.exit_code, 3);
        assert_eq!(outcome.exit_text, "Unknown error");
        assert_eq!(outcome.stderr.trim(), "bad keyword");
        assert!(outcome.command_line.ends_with("fail.sh"));
    }

    #[cfg(unix)]
    #[test]
    fn invocation_environment_reaches_the_child() {
        let temp = tempdir().expect("tempdir");
        let script = temp.path().join("env.sh");
        write_script(
            &script,
            "#!/bin/sh\nif [ \"$LANGUAGE\" = \"fr_FR\" ]; then exit 0; fi\nexit 9\n",
        );

        let mut invocation = Invocation::new(&script);
        invocation.env("LANGUAGE", "fr_FR");
        let outcome = SystemRunner.run(&invocation).expect("outcome");
        assert!(outcome.success(), "unexpected outcome: {outcome:?}");
    }
}
