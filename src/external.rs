//! Running transforms implemented by external programs.
//!
//! The program is invoked as
//! `[interpreter [-I|-cp libdir]] program value [local args...] [fields]`
//! where `fields` is `name=value#name=value` built from the first entity.
//! The rendered request is written to its stdin and its stdout is expected
//! to hold a rendered response or exception message.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error};

use crate::message::request::{TransformRequest, LOCAL_ARGUMENTS_KEY};
use crate::message::MaltegoMessage;
use crate::transform::TransformError;
use crate::xml::XmlModel;

/// An external transform program.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: String,
    interpreter: Option<String>,
    lib_dir: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl ExternalCommand {
    /// The program name may not contain spaces.
    pub fn new(program: impl Into<String>) -> Result<Self, TransformError> {
        let program = program.into();
        if program.trim().is_empty() || program.contains(' ') {
            return Err(TransformError::InvalidArgs(format!(
                "program name {:?} must be non-empty and contain no spaces",
                program
            )));
        }
        Ok(Self {
            program,
            interpreter: None,
            lib_dir: None,
            working_dir: None,
            env: Vec::new(),
        })
    }

    /// Run the program through an interpreter. Perl and ruby get
    /// `-I <lib_dir>`, java gets `-cp <lib_dir>`.
    pub fn interpreter(mut self, interpreter: impl Into<String>, lib_dir: Option<PathBuf>) -> Self {
        self.interpreter = Some(interpreter.into());
        self.lib_dir = lib_dir;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Full argument vector, command first.
    pub fn command_line(&self, request: &TransformRequest) -> Vec<String> {
        let mut argv = Vec::new();

        if let Some(interpreter) = &self.interpreter {
            argv.push(interpreter.clone());
            if let Some(lib_dir) = &self.lib_dir {
                match interpreter_name(interpreter) {
                    "perl" | "ruby" => argv.extend(["-I".to_string(), lib_dir.display().to_string()]),
                    "java" => argv.extend(["-cp".to_string(), lib_dir.display().to_string()]),
                    _ => {}
                }
            }
        }
        argv.push(self.program.clone());

        let first = request.entities.first();
        argv.push(first.and_then(|e| e.value.clone()).unwrap_or_default());

        if let Some(arguments) = request.parameter(LOCAL_ARGUMENTS_KEY) {
            argv.extend(arguments.split_whitespace().map(str::to_string));
        }

        if let Some(element) = first {
            let fields: Vec<String> = element
                .fields
                .values()
                .map(|f| format!("{}={}", escape(&f.name), escape(f.value.as_deref().unwrap_or(""))))
                .collect();
            if !fields.is_empty() {
                argv.push(fields.join("#"));
            }
        }

        argv
    }

    /// Pipe the rendered request through the program and return its
    /// stdout. A non-zero exit status is an execution error.
    pub fn run(&self, request: &TransformRequest) -> Result<String, TransformError> {
        let argv = self.command_line(request);
        let input = MaltegoMessage::Request(request.clone()).render()?;

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        debug!("Running: {}", argv.join(" "));
        let mut child = cmd
            .spawn()
            .map_err(|e| TransformError::ExecutionError(format!("failed to start {}: {}", argv[0], e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // The program may exit without reading its input.
            match stdin.write_all(input.as_bytes()) {
                Err(e) if e.kind() != ErrorKind::BrokenPipe => {
                    return Err(TransformError::ExecutionError(format!("failed to write request: {}", e)))
                }
                _ => {}
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| TransformError::ExecutionError(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("Transform program {} failed: {}", self.program, stderr);
            return Err(TransformError::ExecutionError(format!(
                "{} exited with {}: {}",
                self.program, output.status, stderr
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run the program and decode the message it printed.
    pub fn run_message(&self, request: &TransformRequest) -> Result<MaltegoMessage, TransformError> {
        let stdout = self.run(request)?;
        Ok(MaltegoMessage::from_xml(&stdout)?)
    }
}

fn interpreter_name(interpreter: &str) -> &str {
    Path::new(interpreter)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(interpreter)
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('#', "\\#").replace('=', "\\=")
}
