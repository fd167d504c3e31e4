use std::{
    ffi::{OsStr, OsString},
    fmt::{self, Display},
    path::{Path, PathBuf},
};

/// A single git invocation described as an explicit argument list.
///
/// Arguments are handed to the process verbatim, never through a shell, so
/// refs, URLs and paths may contain spaces or shell metacharacters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommand {
    subcommand: String,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    git_dir: Option<PathBuf>,
}

impl GitCommand {
    pub fn new(subcommand: impl Into<String>) -> Self {
        GitCommand {
            subcommand: subcommand.into(),
            args: Vec::new(),
            current_dir: None,
            git_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_owned()));
        self
    }

    /// Run the command as if git was started in `path` (`git -C <path>`).
    pub fn current_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(path.into());
        self
    }

    /// Point the command at an object store directly (`git --git-dir <path>`).
    pub fn git_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.git_dir = Some(path.into());
        self
    }

    pub fn subcommand(&self) -> &str {
        &self.subcommand
    }

    pub fn working_directory(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Full argument vector, excluding the git binary itself.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut result = Vec::with_capacity(self.args.len() + 5);
        if let Some(dir) = &self.current_dir {
            result.push(OsString::from("-C"));
            result.push(dir.as_os_str().to_owned());
        }
        if let Some(git_dir) = &self.git_dir {
            result.push(OsString::from("--git-dir"));
            result.push(git_dir.as_os_str().to_owned());
        }
        result.push(OsString::from(&self.subcommand));
        result.extend(self.args.iter().cloned());
        result
    }
}

impl Display for GitCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("git")?;
        for arg in self.to_args() {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn renders_overrides_before_subcommand() {
        let command = GitCommand::new("rev-parse")
            .git_dir("/cache/repo")
            .current_dir("/work")
            .args(["--verify", "main^{commit}"]);

        assert_eq!(
            command.to_args(),
            vec![
                OsString::from("-C"),
                OsString::from("/work"),
                OsString::from("--git-dir"),
                OsString::from("/cache/repo"),
                OsString::from("rev-parse"),
                OsString::from("--verify"),
                OsString::from("main^{commit}"),
            ]
        );
        assert_eq!(
            command.to_string(),
            "git -C /work --git-dir /cache/repo rev-parse --verify main^{commit}"
        );
    }

    #[test]
    fn keeps_special_characters_in_a_single_argument() {
        let command = GitCommand::new("clone").arg("/tmp/my repo; rm -rf ~");

        assert_eq!(
            command.to_args().last(),
            Some(&OsString::from("/tmp/my repo; rm -rf ~"))
        );
    }

    #[test]
    fn plain_command_has_no_overrides() {
        let command = GitCommand::new("fetch");

        assert_eq!(command.subcommand(), "fetch");
        assert_eq!(command.working_directory(), None);
        assert_eq!(command.to_string(), "git fetch");
    }
}
