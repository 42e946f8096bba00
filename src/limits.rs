use anyhow::{Context, Result};

use model::SchedulerLimits;
use syntax::ast;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("a limits file may only contain a [limits] section")]
    NotALimitsSection,
    #[error("unknown limits key '{0}'")]
    UnknownKey(String),
    #[error("invalid value '{value}' for limits key '{key}'")]
    InvalidValue { key: &'static str, value: String },
}

/// Parse limits-file text into a `SchedulerLimits`. Starts from the
/// built-in defaults, so a partial file only changes what it names.
pub fn parse(text: &str) -> Result<SchedulerLimits> {
    let mut limits = SchedulerLimits::default();
    for item in syntax::parse(text)? {
        let assignments = match item {
            ast::Item::Limits(assignments) => assignments,
            _ => return Err(Error::NotALimitsSection.into()),
        };
        for asst in &assignments {
            apply(&mut limits, asst)?;
        }
    }
    Ok(limits)
}

fn apply(limits: &mut SchedulerLimits, asst: &ast::Assignment) -> Result<()> {
    match asst.key {
        "max_cpus" => limits.max_cpus = count(asst, "max_cpus")?,
        "max_gpus" => limits.max_gpus = count(asst, "max_gpus")?,
        "max_mem" => {
            limits.max_mem = scalar(asst, "max_mem")?.parse().context("in [limits]")?;
        }
        "max_walltime" => {
            limits.max_walltime = scalar(asst, "max_walltime")?.parse().context("in [limits]")?;
        }
        "partitions" => {
            limits.partitions = asst
                .value
                .words()
                .iter()
                .map(|w| w.trim())
                .filter(|w| !w.is_empty())
                .map(str::to_owned)
                .collect();
        }
        other => return Err(Error::UnknownKey(other.to_owned()).into()),
    }
    Ok(())
}

fn scalar<'a>(asst: &'a ast::Assignment, key: &'static str) -> Result<&'a str, Error> {
    match &asst.value {
        ast::Value::Literal { val } => Ok(val),
        ast::Value::List { items } => Err(Error::InvalidValue {
            key,
            value: items.join(","),
        }),
    }
}

fn count(asst: &ast::Assignment, key: &'static str) -> Result<u32, Error> {
    let value = scalar(asst, key)?;
    value.trim().parse().map_err(|_| Error::InvalidValue {
        key,
        value: value.to_owned(),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use model::{Memory, Walltime};

    #[test]
    fn test_parse_limits() -> Result<()> {
        let limits = parse(
            "[limits]\n\
             max_cpus = 64\n\
             max_mem = 256GB\n\
             max_walltime = 2-00:00:00\n\
             partitions = batch, gpu\n",
        )?;
        assert_eq!(64, limits.max_cpus);
        assert_eq!(Memory::from_gib(256), limits.max_mem);
        assert_eq!(Walltime::from_secs(2 * 86400), limits.max_walltime);
        assert_eq!(vec!["batch".to_owned(), "gpu".to_owned()], limits.partitions);
        // unnamed fields keep their defaults:
        assert_eq!(8, limits.max_gpus);
        Ok(())
    }

    #[test]
    fn test_empty_file_is_all_defaults() -> Result<()> {
        let limits = parse("")?;
        assert_eq!(128, limits.max_cpus);
        assert!(limits.partitions.is_empty());
        Ok(())
    }

    #[test]
    fn test_rejects_stage_sections() {
        let err = parse("[stage sneaky]\ntype = single\napp = coyote\n").unwrap_err();
        let err = err.downcast_ref::<Error>().unwrap();
        assert!(matches!(err, Error::NotALimitsSection));
    }

    #[test]
    fn test_rejects_unknown_key() {
        let err = parse("[limits]\nmax_quacks = 3\n").unwrap_err();
        let err = err.downcast_ref::<Error>().unwrap();
        assert!(matches!(err, Error::UnknownKey(key) if key == "max_quacks"));
    }
}
