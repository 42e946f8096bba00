use std::fmt::Display;

/// Accumulates one batch script's text: shebang, then `#SBATCH`
/// directive lines, then a blank line and the command.
pub struct ScriptBuilder {
    buf: String,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        let mut buf = String::with_capacity(512);
        buf.push_str("#!/bin/bash\n");
        Self { buf }
    }

    pub fn directive<T: Display>(&mut self, key: &str, value: T) -> &mut Self {
        self.buf.push_str(&format!("#SBATCH --{key}={value}\n"));
        self
    }

    pub fn command(mut self, command: &str) -> String {
        self.buf.push('\n');
        self.buf.push_str(command);
        self.buf.push('\n');
        self.buf
    }
}

#[cfg(test)]
mod test {
    use super::ScriptBuilder;

    #[test]
    fn test_builds_directives_then_command() {
        let mut script = ScriptBuilder::new();
        script.directive("job-name", "prep").directive("cpus-per-task", 4);
        let text = script.command("echo hello");
        assert_eq!(
            "#!/bin/bash\n#SBATCH --job-name=prep\n#SBATCH --cpus-per-task=4\n\necho hello\n",
            text
        );
    }
}
