use std::path::PathBuf;

use anyhow::Result;

use crate::args::Args;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("config file {0:?} does not exist")]
    ConfigNotFound(PathBuf),
    #[error("limits file {0:?} does not exist")]
    LimitsNotFound(PathBuf),
}

/// Settings are like Args, except all the logic has
/// been applied so e.g. defaults are added in.
#[derive(Debug)]
pub struct Settings {
    pub config: PathBuf,
    pub output: PathBuf,
    pub limits: Option<PathBuf>,
    pub yes: bool,
    pub verbose: u8,
    pub dry_run: bool,
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let mut config = PathBuf::from(&args.config);
        if config.exists() {
            config = config.canonicalize()?;
        } else {
            return Err(Error::ConfigNotFound(config).into());
        }

        let limits = match args.limits {
            Some(arg) => {
                let mut path = PathBuf::from(&arg);
                if path.exists() {
                    path = path.canonicalize()?;
                } else {
                    return Err(Error::LimitsNotFound(path).into());
                }
                Some(path)
            }
            None => None,
        };

        let output = PathBuf::from(&args.output);

        Ok(Self {
            config,
            output,
            limits,
            yes: args.yes,
            verbose: args.verbose,
            dry_run: args.dry_run,
        })
    }
}
