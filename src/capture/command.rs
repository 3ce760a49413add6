//! Command templates for the external capture and mux programs

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A fully formed invocation: program, arguments and the file it writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub target: PathBuf,
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Program plus argument template with `{name}` placeholders
///
/// `{output}` always expands to the target path; other placeholders come from
/// the variables passed to [`CommandTemplate::render`]. Unknown placeholders are
/// left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn render(&self, target: &Path, vars: &[(&str, String)]) -> CommandSpec {
        let output = target.to_string_lossy();
        let args = self
            .args
            .iter()
            .map(|arg| {
                let mut rendered = arg.replace("{output}", &output);
                for (name, value) in vars {
                    rendered = rendered.replace(&format!("{{{}}}", name), value);
                }
                rendered
            })
            .collect();

        CommandSpec {
            program: self.program.clone(),
            args,
            target: target.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_expands_placeholders() {
        let template = CommandTemplate::new(
            "arecord",
            &["-D", "{device}", "-r", "{sample_rate}", "{output}"],
        );
        let spec = template.render(
            Path::new("/tmp/rec/temp_audio.wav"),
            &[("device", "hw:0,7".to_string()), ("sample_rate", "16000".to_string())],
        );

        assert_eq!(spec.program, "arecord");
        assert_eq!(spec.args, vec!["-D", "hw:0,7", "-r", "16000", "/tmp/rec/temp_audio.wav"]);
        assert_eq!(spec.target, PathBuf::from("/tmp/rec/temp_audio.wav"));
    }

    #[test]
    fn test_render_keeps_unknown_placeholders() {
        let template = CommandTemplate::new("sh", &["-c", "echo {missing}"]);
        let spec = template.render(Path::new("out"), &[]);
        assert_eq!(spec.args[1], "echo {missing}");
        assert_eq!(spec.to_string(), "sh -c echo {missing}");
    }
}
