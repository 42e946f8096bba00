use anyhow::{Context, Result};
use colored::Colorize;

use graph::JobGraph;
use model::SchedulerLimits;

use crate::driver::Pipeline;
use crate::fs::Fs;
use crate::gen::{self, ScriptArtifact};
use crate::limits;
use crate::settings::Settings;
use crate::ui::Ui;

/// This struct actually runs the command-line app.
pub struct App {
    /// Interpreted command line settings
    settings: Settings,
    /// Filesystem interface
    fs: Fs,
    /// User interface
    ui: Ui,
}

impl App {
    /// Create a new `App`.
    pub fn new(settings: Settings) -> Self {
        let fs = Fs::new(&settings.output, settings.dry_run);
        let ui = Ui::new(&settings);
        Self { settings, fs, ui }
    }

    /// Run the app: compile the definition and write one script per
    /// stage plus the submission helper into the output directory.
    pub fn run(mut self) -> Result<()> {
        let mut strbuf = String::with_capacity(0); // will be resized later.

        let limits = self.load_limits(&mut strbuf)?;
        let pipeline = Pipeline::new(limits);

        self.read_config_to_buf(&mut strbuf)?;

        self.ui.verbose_progress("Compiling pipeline");
        self.ui.start_timer();
        let graph = pipeline.compile(&strbuf).with_context(|| {
            format!("while compiling pipeline definition {:?}", self.settings.config)
        })?;
        self.ui.done();
        self.ui.print_elapsed("Compiling pipeline")?;

        if graph.is_empty() {
            eprintln!("{}", "No stages defined; nothing to generate.".green());
            return Ok(());
        }

        self.print_summary(&graph);

        let artifacts = gen::render(&graph);

        if self.settings.dry_run {
            eprintln!("{}", "Dry run; not writing any files.".yellow());
            return Ok(());
        }
        let prompt = format!(
            "Write {} scripts to {:?}?",
            artifacts.len() + 1, // plus submit.sh
            self.settings.output
        );
        if !self.ui.confirm(&prompt)? {
            return Ok(());
        }

        self.write_artifacts(&artifacts)?;

        eprintln!("\n{}.", "Script generation complete".green());
        eprintln!("Submit with: sh {:?}", self.fs.submit_path());
        Ok(())
    }

    fn load_limits(&mut self, strbuf: &mut String) -> Result<SchedulerLimits> {
        match &self.settings.limits {
            Some(path) => {
                self.ui.verbose_progress_debug("Reading limits file", path);
                self.fs
                    .read_to_buf(path, strbuf)
                    .with_context(|| format!("while reading limits file {:?}", path))?;
                self.ui.done();
                limits::parse(strbuf)
                    .with_context(|| format!("while parsing limits file {:?}", path))
            }
            None => Ok(SchedulerLimits::default()),
        }
    }

    fn read_config_to_buf(&mut self, strbuf: &mut String) -> Result<()> {
        self.ui.verbose_progress_debug("Reading definition file", &self.settings.config);
        self.fs
            .read_to_buf(&self.settings.config, strbuf)
            .with_context(|| {
                format!("while reading definition file {:?}", self.settings.config)
            })?;
        self.ui.done();
        Ok(())
    }

    fn print_summary(&self, graph: &JobGraph) {
        eprintln!("Pipeline with {} stages:", graph.len());
        for node in graph.iter_ordered() {
            let deps = graph.dep_names(node);
            if deps.is_empty() {
                eprintln!("  {} ({})", node.name.cyan(), node.kind.tag());
            } else {
                eprintln!(
                    "  {} ({}) after: {}",
                    node.name.cyan(),
                    node.kind.tag(),
                    deps.join(", ")
                );
            }
        }
    }

    fn write_artifacts(&mut self, artifacts: &[ScriptArtifact]) -> Result<()> {
        self.fs.ensure_output_dir_exists(self.settings.verbose > 0)?;

        for artifact in artifacts {
            let path = self.fs.script_path(&artifact.stage);
            self.ui.verbose_progress_debug("Writing", &path);
            self.fs.write_file(&path, &artifact.text)?;
            self.ui.done();
        }

        log::info!("writing submission helper");
        let submit = gen::submit_script(artifacts);
        self.fs.write_file(self.fs.submit_path(), &submit)?;
        Ok(())
    }
}
