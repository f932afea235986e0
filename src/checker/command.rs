use crate::checker::{Checker, Judgment};
use crate::config::PluginConfig;
use crate::document::DocumentMeta;
use crate::error::CheckerError;
use futures_util::future::{BoxFuture, FutureExt};
use std::io;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

pub const PROJECT_PATH_ENV: &str = "SPELLMUX_PROJECT_PATH";
pub const RELATIVE_PATH_ENV: &str = "SPELLMUX_RELATIVE_PATH";

/// A third-party checker running as an external process.
///
/// The process receives the document text on stdin, with the document location
/// in `SPELLMUX_PROJECT_PATH` and `SPELLMUX_RELATIVE_PATH`, and prints one JSON
/// judgment on stdout:
///
/// ```json
/// {"incorrect": [{"start": 4, "end": 9}], "invertIncorrectAsCorrect": true}
/// ```
///
/// Offsets are char indices into the text it was given.
pub struct CommandChecker {
    config: PluginConfig,
}

impl CommandChecker {
    pub fn new(config: PluginConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    fn wants(&self, meta: &DocumentMeta) -> bool {
        if self.config.extensions.is_empty() {
            return true;
        }
        meta.extension().map_or(false, |ext| {
            self.config
                .extensions
                .iter()
                .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(&ext))
        })
    }

    fn not_found(&self) -> Judgment {
        Judgment::status(format!("Command `{}` was not found.", self.config.command))
    }

    async fn run(&self, meta: &DocumentMeta, text: &str) -> Result<Judgment, CheckerError> {
        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(project) = &meta.project_path {
            command.env(PROJECT_PATH_ENV, project);
        }
        if let Some(relative) = &meta.relative_path {
            command.env(RELATIVE_PATH_ENV, relative);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(checker = %self.config.id, command = %self.config.command, "plugin command not found");
                return Ok(self.not_found());
            }
            Err(error) => return Err(error.into()),
        };

        // Feed stdin while collecting output so a chatty plugin cannot block on a full pipe.
        let stdin = child.stdin.take();
        let write = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(text.as_bytes()).await?;
            }
            Ok::<_, io::Error>(())
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            return Err(CheckerError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if let Err(error) = written {
            if error.kind() != io::ErrorKind::BrokenPipe {
                return Err(error.into());
            }
        }

        let judgment = serde_json::from_slice(&output.stdout)?;
        debug!(checker = %self.config.id, "plugin finished");
        Ok(judgment)
    }
}

impl Checker for CommandChecker {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn priority(&self) -> i32 {
        self.config.priority
    }

    fn status(&self) -> String {
        format!("Runs `{}`.", self.config.command)
    }

    fn provides_spelling(&self, meta: &DocumentMeta) -> bool {
        self.wants(meta)
    }

    fn provides_suggestions(&self, meta: &DocumentMeta) -> bool {
        self.config.suggest_args.is_some() && self.wants(meta)
    }

    fn check<'a>(
        &'a self,
        meta: &'a DocumentMeta,
        text: &'a str,
    ) -> BoxFuture<'a, Result<Judgment, CheckerError>> {
        self.run(meta, text).boxed()
    }

    fn suggest(&self, _meta: &DocumentMeta, word: &str) -> Result<Vec<String>, CheckerError> {
        let Some(args) = &self.config.suggest_args else {
            return Ok(Vec::new());
        };

        let output = std::process::Command::new(&self.config.command)
            .args(args)
            .arg(word)
            .stdin(Stdio::null())
            .output()?;

        if !output.status.success() {
            return Err(CheckerError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::document::DocumentId;
    use std::path::PathBuf;

    fn shell(id: &str, script: &str) -> CommandChecker {
        CommandChecker::new(PluginConfig {
            id: id.to_string(),
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            suggest_args: None,
            priority: 100,
            extensions: Vec::new(),
        })
    }

    fn meta() -> DocumentMeta {
        DocumentMeta::with_path(
            DocumentId::next(),
            Some(PathBuf::from("/work/project")),
            "docs/notes.txt",
        )
    }

    #[tokio::test]
    async fn test_parses_judgment_from_stdout() {
        let checker = shell(
            "plain",
            r#"cat >/dev/null; echo '{"incorrect":[{"start":0,"end":3}]}'"#,
        );
        let judgment = checker.check(&meta(), "abc def").await.unwrap();
        assert_eq!(judgment, Judgment::incorrect([0..3]));
    }

    #[tokio::test]
    async fn test_text_arrives_on_stdin() {
        let checker = shell("echo", r#"printf '{"status":"%s"}' "$(cat)""#);
        let judgment = checker.check(&meta(), "hello there").await.unwrap();
        assert_eq!(judgment, Judgment::status("hello there"));
    }

    #[tokio::test]
    async fn test_document_location_in_environment() {
        let checker = shell(
            "env",
            r#"cat >/dev/null; printf '{"status":"%s|%s"}' "$SPELLMUX_PROJECT_PATH" "$SPELLMUX_RELATIVE_PATH""#,
        );
        let judgment = checker.check(&meta(), "x").await.unwrap();
        assert_eq!(judgment, Judgment::status("/work/project|docs/notes.txt"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_an_error() {
        let checker = shell("failing", "cat >/dev/null; echo oops >&2; exit 3");
        match checker.check(&meta(), "x").await {
            Err(CheckerError::Exit { stderr, .. }) => assert_eq!(stderr, "oops"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_output_is_an_error() {
        let checker = shell("empty", "cat >/dev/null; echo '{}'");
        assert!(matches!(
            checker.check(&meta(), "x").await,
            Err(CheckerError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_command_reports_status() {
        let checker = CommandChecker::new(PluginConfig {
            id: "missing".to_string(),
            command: "spellmux-plugin-that-does-not-exist".to_string(),
            args: Vec::new(),
            suggest_args: None,
            priority: 100,
            extensions: Vec::new(),
        });
        let judgment = checker.check(&meta(), "x").await.unwrap();
        assert!(matches!(judgment, Judgment::Status { .. }));
    }

    #[test]
    fn test_suggest_reads_lines() {
        let mut checker = shell("suggesting", "true");
        checker.config.suggest_args = Some(vec![
            "-c".to_string(),
            r#"printf '%s1\n\n%s2\n' "$1" "$1""#.to_string(),
            "sh".to_string(),
        ]);

        assert!(checker.provides_suggestions(&meta()));
        assert_eq!(checker.suggest(&meta(), "cat").unwrap(), vec!["cat1", "cat2"]);
    }

    #[test]
    fn test_extension_filter() {
        let mut checker = shell("filtered", "true");
        checker.config.extensions = vec![".TXT".to_string()];
        assert!(checker.provides_spelling(&meta()));
        assert!(!checker.provides_spelling(&DocumentMeta::with_path(
            DocumentId::next(),
            None,
            "a.md"
        )));
        assert!(!checker.provides_suggestions(&meta()));
    }

    #[test]
    fn test_status_names_the_command() {
        assert_eq!(shell("plugin", "true").status(), "Runs `sh`.");
    }
}
