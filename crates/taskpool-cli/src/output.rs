//! Shared output layer: pretty, text and JSON for every command.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format` / `--json` flag
//! 2. `FORMAT` env var, then `output` in the config file
//! 3. Pretty if stdout is a TTY, text if piped

use clap::ValueEnum;
use serde::Serialize;
use std::io::{self, Write};
use taskpool_core::error::ErrorCode;

pub const PRETTY_RULE_WIDTH: usize = 72;

pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// Left-aligned key/value line.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<12} {}", format!("{key}:"), value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Human-oriented sections and aligned fields.
    Pretty,
    /// Terse `key=value` lines for pipes and agents.
    Text,
    Json,
}

impl OutputMode {
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }

    /// Map the resolved config string; anything unknown reads as text.
    pub fn from_resolved(resolved: &str) -> Self {
        match resolved {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::Text,
        }
    }
}

/// Pick the mode: an explicit `--format` wins, otherwise the value the
/// config layer resolved from `--json`, `FORMAT`, the file and the TTY.
pub fn resolve_output_mode(format_flag: Option<OutputMode>, resolved: &str) -> OutputMode {
    format_flag.unwrap_or_else(|| OutputMode::from_resolved(resolved))
}

/// Serialize in JSON mode, otherwise hand the value to the text or pretty
/// renderer.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

/// A failure as the CLI reports it.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    /// Pull the [`ErrorCode`] out of the context chain when one was attached.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let code = err.downcast_ref::<ErrorCode>().copied();
        let detail = err
            .chain()
            .map(ToString::to_string)
            .filter(|cause| code.is_none_or(|code| cause != code.code()))
            .collect::<Vec<_>>()
            .join(": ");
        match code {
            Some(code) => Self {
                message: if detail.is_empty() {
                    code.message().to_string()
                } else {
                    format!("{}: {detail}", code.message())
                },
                suggestion: code.hint().map(str::to_string),
                error_code: Some(code.code().to_string()),
            },
            None => Self {
                message: format!("{err:#}"),
                suggestion: None,
                error_code: None,
            },
        }
    }
}

/// Errors go to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({ "error": error });
            serde_json::to_writer_pretty(&mut out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            match &error.error_code {
                Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
                None => writeln!(out, "error: {}", error.message)?,
            }
            if let Some(suggestion) = &error.suggestion {
                writeln!(out, "hint: {suggestion}")?;
            }
        }
    }
    Ok(())
}
