//! Running external commands through the platform shell.
//!
//! Module builds are opaque shell commands (`make module` by default) run with
//! the module directory as working directory. The user's environment is
//! inherited so the module's own toolchain can be found on `PATH`.

use std::io;
use std::path::Path;
use std::process::Output;

use tokio::process::Command;
use tracing::debug;

/// Get the shell binary and the arguments that precede the command string.
///
/// `/bin/sh -c` on Unix and `cmd.exe /C` on Windows unless `override_shell` is
/// given, in which case the argument style is guessed from its name.
pub fn shell_for(override_shell: Option<&str>) -> (String, Vec<String>) {
  if let Some(shell) = override_shell {
    let args = if shell.contains("powershell") || shell.contains("pwsh") {
      vec!["-NoProfile".to_string(), "-Command".to_string()]
    } else if shell.contains("cmd") {
      vec!["/C".to_string()]
    } else {
      vec!["-c".to_string()]
    };
    return (shell.to_string(), args);
  }

  #[cfg(unix)]
  {
    ("/bin/sh".to_string(), vec!["-c".to_string()])
  }

  #[cfg(windows)]
  {
    ("cmd.exe".to_string(), vec!["/C".to_string()])
  }
}

/// Run `cmd` in `cwd` and wait for it to finish.
///
/// The exit status is returned to the caller, not interpreted. Dropping the
/// future (an aborted task) kills the shell.
pub async fn run_shell(cmd: &str, cwd: &Path, shell: Option<&str>) -> io::Result<Output> {
  let (shell_cmd, shell_args) = shell_for(shell);

  debug!(shell = %shell_cmd, cmd, cwd = %cwd.display(), "spawning process");

  let output = Command::new(&shell_cmd)
    .args(&shell_args)
    .arg(cmd)
    .current_dir(cwd)
    .kill_on_drop(true)
    .output()
    .await?;

  let stderr = String::from_utf8_lossy(&output.stderr);
  if !stderr.trim().is_empty() {
    debug!(stderr = %stderr.trim(), "command stderr");
  }

  Ok(output)
}

/// Render the tail of a command's stderr (or stdout) for error messages.
pub fn output_summary(output: &Output) -> String {
  let stderr = String::from_utf8_lossy(&output.stderr);
  let text = if stderr.trim().is_empty() {
    String::from_utf8_lossy(&output.stdout).into_owned()
  } else {
    stderr.into_owned()
  };

  let lines: Vec<&str> = text.trim().lines().collect();
  let start = lines.len().saturating_sub(5);
  lines[start..].join("\n")
}
