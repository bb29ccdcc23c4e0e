//! Stack-sample frequency reports.
//!
//! Turns a debugger's textual sampling log (one captured stack per line,
//! preceded by a fixed-width timestamp/thread prefix) into a "most common
//! stacks" report. Program counters are optionally mapped back to function
//! names through a [`Symbolizer`].

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Width of the prefix the debugger writes before each sample.
pub const DEFAULT_PREFIX_WIDTH: usize = 42;

/// Number of distinct samples reported by default.
pub const DEFAULT_TOP: usize = 20;

static PC_PATTERN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"0x[0-9a-fA-F]{16}").expect("program counter pattern is valid"));

#[derive(Debug, Error)]
pub enum TraceError {
  #[error("failed to read sample log '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// A program counter and, once resolved, the function containing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
  pub pc: String,
  pub function: Option<String>,
}

impl Frame {
  fn unresolved(pc: String) -> Self {
    Self { pc, function: None }
  }

  /// The function name, or the raw address when unresolved.
  pub fn label(&self) -> &str {
    self.function.as_deref().unwrap_or(&self.pc)
  }
}

/// One distinct stack and how often it was sampled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleEntry {
  pub count: usize,
  /// The sample text with the prefix removed.
  pub stack: String,
  /// Program counters found in the stack, innermost first.
  pub frames: Vec<Frame>,
}

/// The most common samples, most frequent first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SampleReport {
  pub total: usize,
  pub entries: Vec<SampleEntry>,
}

impl SampleReport {
  /// Count samples in `log`.
  ///
  /// The first `prefix_width` characters of every line are dropped; ties are
  /// broken by first appearance.
  pub fn from_log(log: &str, prefix_width: usize, top: usize) -> Self {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    let mut total = 0;

    for line in log.lines() {
      let stack = line.char_indices().nth(prefix_width).map(|(i, _)| &line[i..]).unwrap_or("");
      *counts.entry(stack).or_default() += 1;
      total += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    // stable sort keeps first-appearance order among equal counts
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(top);

    debug!(total, distinct = ranked.len(), "counted samples");

    let entries = ranked
      .into_iter()
      .map(|(stack, count)| SampleEntry {
        count,
        stack: stack.to_string(),
        frames: program_counters(stack).into_iter().map(Frame::unresolved).collect(),
      })
      .collect();

    Self { total, entries }
  }

  /// Read and count a log file.
  pub fn from_file(path: &Path, prefix_width: usize, top: usize) -> Result<Self, TraceError> {
    let bytes = std::fs::read(path).map_err(|source| TraceError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Ok(Self::from_log(&String::from_utf8_lossy(&bytes), prefix_width, top))
  }

  /// Resolve every frame through `symbolizer`, each distinct address once.
  pub fn symbolize(&mut self, symbolizer: &dyn Symbolizer) {
    let mut resolved: HashMap<String, Option<String>> = HashMap::new();

    for frame in self.entries.iter_mut().flat_map(|e| e.frames.iter_mut()) {
      frame.function = resolved
        .entry(frame.pc.clone())
        .or_insert_with(|| symbolizer.symbolize(&frame.pc))
        .clone();
    }
  }

  /// Render the report as text.
  ///
  /// Frames that were not resolved are shown as raw addresses.
  pub fn render(&self) -> String {
    let mut out = String::new();

    for entry in &self.entries {
      let _ = writeln!(out, "{} Times", entry.count);
      for frame in &entry.frames {
        let _ = writeln!(out, "{}", frame.label());
      }
      out.push_str("-----\n");
    }

    out
  }
}

/// Every `0x`-prefixed 64-bit program counter in `stack`, in order.
pub fn program_counters(stack: &str) -> Vec<String> {
  PC_PATTERN.find_iter(stack).map(|m| m.as_str().to_string()).collect()
}

/// Maps a program counter to the function containing it.
pub trait Symbolizer {
  /// `None` when the address cannot be resolved.
  fn symbolize(&self, pc: &str) -> Option<String>;
}

/// Resolves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSymbols;

impl Symbolizer for NoSymbols {
  fn symbolize(&self, _pc: &str) -> Option<String> {
    None
  }
}

/// Resolves addresses with `addr2line -f -e <binary>`.
#[derive(Debug, Clone)]
pub struct Addr2Line {
  binary: PathBuf,
}

impl Addr2Line {
  pub fn new(binary: impl Into<PathBuf>) -> Self {
    Self { binary: binary.into() }
  }
}

impl Symbolizer for Addr2Line {
  fn symbolize(&self, pc: &str) -> Option<String> {
    let output = Command::new("addr2line")
      .arg("-f")
      .arg("-e")
      .arg(&self.binary)
      .arg(pc)
      .output()
      .ok()?;

    if !output.status.success() {
      debug!(pc, status = ?output.status.code(), "addr2line failed");
      return None;
    }

    parse_addr2line(&String::from_utf8_lossy(&output.stdout))
  }
}

/// The function name from `addr2line -f` output, unless it is unknown.
fn parse_addr2line(stdout: &str) -> Option<String> {
  let function = stdout.lines().next()?.trim();
  if function.is_empty() || function == "??" {
    None
  } else {
    Some(function.to_string())
  }
}
