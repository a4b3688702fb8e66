//! Command templates for installing dependencies and running test suites.

use std::fmt;
use std::path::{Path, PathBuf};

use aifix_core::domain::project::{NODE_MANIFEST, PYTHON_MANIFEST};
use aifix_core::ProjectKind;

/// Virtualenv directory created inside the checkout.
pub const VENV_DIR: &str = ".venv";

/// Interpreter used when no virtualenv is available.
pub const DEFAULT_PYTHON: &str = "python";

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

fn npm() -> &'static str {
    if cfg!(windows) {
        "npm.cmd"
    } else {
        "npm"
    }
}

/// Test command for `kind`, run with `python` for Python projects.
pub fn test_command(kind: ProjectKind, python: &str) -> CommandSpec {
    match kind {
        ProjectKind::Node => CommandSpec::new(npm(), &["test", "--", "--passWithNoTests"]),
        ProjectKind::Python => CommandSpec::new(
            python,
            &["-m", "pytest", "--maxfail=10", "-v", "--tb=short"],
        ),
    }
}

/// Install command for `kind`, or `None` when the project has no manifest.
pub fn install_command(repo: &Path, kind: ProjectKind, python: &str) -> Option<CommandSpec> {
    match kind {
        ProjectKind::Node if repo.join(NODE_MANIFEST).is_file() => {
            Some(CommandSpec::new(npm(), &["install"]))
        }
        ProjectKind::Python if repo.join(PYTHON_MANIFEST).is_file() => Some(CommandSpec::new(
            python,
            &["-m", "pip", "install", "-r", PYTHON_MANIFEST],
        )),
        _ => None,
    }
}

/// `python -m venv .venv`
pub fn create_venv_command(base_python: &str) -> CommandSpec {
    CommandSpec::new(base_python, &["-m", "venv", VENV_DIR])
}

/// Interpreter path inside the checkout's virtualenv.
pub fn venv_python(repo: &Path) -> PathBuf {
    let venv = repo.join(VENV_DIR);
    if cfg!(windows) {
        venv.join("Scripts").join("python.exe")
    } else {
        venv.join("bin").join("python")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_test_command() {
        let cmd = test_command(ProjectKind::Python, "/repo/.venv/bin/python");
        assert_eq!(cmd.program, "/repo/.venv/bin/python");
        assert_eq!(cmd.args, vec!["-m", "pytest", "--maxfail=10", "-v", "--tb=short"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_node_test_command_display() {
        let cmd = test_command(ProjectKind::Node, DEFAULT_PYTHON);
        assert_eq!(cmd.to_string(), "npm test -- --passWithNoTests");
    }

    #[test]
    fn test_install_command_requires_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(install_command(dir.path(), ProjectKind::Python, "python"), None);
        assert_eq!(install_command(dir.path(), ProjectKind::Node, "python"), None);

        std::fs::write(dir.path().join("requirements.txt"), "pytest\n").unwrap();
        let cmd = install_command(dir.path(), ProjectKind::Python, "py").unwrap();
        assert_eq!(cmd.to_string(), "py -m pip install -r requirements.txt");
        assert_eq!(install_command(dir.path(), ProjectKind::Node, "py"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_venv_paths() {
        assert_eq!(
            venv_python(Path::new("/w/repo")),
            PathBuf::from("/w/repo/.venv/bin/python")
        );
        assert_eq!(
            create_venv_command("python3").to_string(),
            "python3 -m venv .venv"
        );
    }
}
