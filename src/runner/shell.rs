//! Shell interpreter used to run command lines.
//!
//! A command line is never split by us; it is handed to an interpreter as a
//! single argument (`powershell.exe -NoProfile -Command "<line>"` on Windows,
//! `/bin/sh -c "<line>"` elsewhere).

use std::process::Stdio;

use tokio::process::Command;

/// Environment variable that overrides the interpreter program.
pub const SHELL_ENV_VAR: &str = "PSCOMMANDER_SHELL";

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Interpreter program plus the arguments that precede the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl ShellConfig {
    /// An interpreter invoked as `<program> <args...> <command line>`.
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Windows PowerShell.
    pub fn powershell() -> Self {
        Self::new("powershell.exe", ["-NoProfile", "-Command"])
    }

    /// POSIX `sh -c`.
    pub fn posix() -> Self {
        Self::new("/bin/sh", ["-c"])
    }

    /// Platform default, with the program overridable through
    /// `PSCOMMANDER_SHELL`.
    pub fn from_env() -> Self {
        let base = Self::default();
        match std::env::var(SHELL_ENV_VAR) {
            Ok(program) if !program.trim().is_empty() => base.with_program(program.trim()),
            _ => base,
        }
    }

    /// Swap the interpreter program, picking the argument convention that
    /// matches it.
    pub fn with_program(self, program: impl Into<String>) -> Self {
        let program = program.into();
        let args = if is_powershell(&program) {
            Self::powershell().args
        } else if is_cmd(&program) {
            vec!["/C".to_string()]
        } else {
            vec!["-c".to_string()]
        };
        Self { program, args }
    }

    /// Build the child process for `command_line`.
    ///
    /// Output is piped rather than inherited, stdin is closed, the
    /// environment is inherited and no console window is created. The child
    /// is killed if its handle is dropped.
    pub fn command(&self, command_line: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        cmd
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        if cfg!(windows) {
            Self::powershell()
        } else {
            Self::posix()
        }
    }
}

fn program_stem(program: &str) -> String {
    let name = program.rsplit(['/', '\\']).next().unwrap_or(program);
    let name = name.to_ascii_lowercase();
    name.strip_suffix(".exe").map(str::to_string).unwrap_or(name)
}

fn is_powershell(program: &str) -> bool {
    matches!(program_stem(program).as_str(), "powershell" | "pwsh")
}

fn is_cmd(program: &str) -> bool {
    program_stem(program) == "cmd"
}
