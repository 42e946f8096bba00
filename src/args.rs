use clap::Parser;

const CMD_NAME: &str = "spg";
const DEFAULT_CONFIG: &str = "pipeline.def";
const DEFAULT_OUTPUT: &str = "scripts";

/// Stores our command-line args format.
#[derive(Parser)]
#[command(name = CMD_NAME, version, about = None, long_about = None)]
pub struct Args {
    /// Pipeline definition file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    #[arg(env = "SLURM_PIPELINE_CONFIG")]
    pub config: String,

    /// Directory to write generated scripts into
    #[arg(short, long, value_name = "DIR", default_value = DEFAULT_OUTPUT)]
    #[arg(env = "SLURM_PIPELINE_OUTPUT")]
    pub output: String,

    /// Scheduler limits file
    #[arg(short, long, value_name = "FILE")]
    #[arg(env = "SLURM_PIPELINE_LIMITS")]
    pub limits: Option<String>,

    /// Bypass user confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Print additional debugging info (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Dry run; print the pipeline summary but don't write anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}
