use colored::Colorize;

fn main() {
    if let Err(e) = slurm_pipeline::run() {
        eprintln!("{} {:?}", "Error:".red(), e);
        std::process::exit(1);
    }
}
