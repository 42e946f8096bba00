use crate::{Application, CommandError};

const MODES: [&str; 2] = ["dryrun", "fillcf"];

/// Convolution-function generator application.
/// Required parameters: `vis` (measurement set), `cfcache` (CF cache
/// directory), and `mode` (`dryrun` creates an empty cache, `fillcf`
/// fills it). All other parameters pass through as `key=value` args.
pub struct CoyoteApp {
    binary: String,
}

impl CoyoteApp {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for CoyoteApp {
    fn default() -> Self {
        Self::new("coyote")
    }
}

impl Application for CoyoteApp {
    fn id(&self) -> &'static str {
        "coyote"
    }

    fn build(&self, params: &[(String, String)]) -> Result<String, CommandError> {
        require(params, "vis")?;
        require(params, "cfcache")?;
        let mode = require(params, "mode")?;
        if !MODES.contains(&mode) {
            return Err(CommandError::InvalidParameterValue {
                field: "mode",
                value: mode.to_owned(),
            });
        }

        let mut cmd = String::with_capacity(128);
        cmd.push_str(&self.binary);
        // never prompt when running unattended on a compute node:
        cmd.push_str(" help=noprompt");
        for (key, value) in params {
            if value.is_empty() {
                continue;
            }
            cmd.push(' ');
            cmd.push_str(key);
            cmd.push('=');
            if value.contains(char::is_whitespace) {
                cmd.push('"');
                cmd.push_str(value);
                cmd.push('"');
            } else {
                cmd.push_str(value);
            }
        }
        Ok(cmd)
    }
}

fn require<'a>(
    params: &'a [(String, String)],
    field: &'static str,
) -> Result<&'a str, CommandError> {
    params
        .iter()
        .find(|(k, _)| k == field)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
        .ok_or(CommandError::MissingParameter { field })
}
