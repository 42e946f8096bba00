use std::str::FromStr;

use crate::JobKind;

#[derive(thiserror::Error, Debug)]
pub enum ResourceError {
    #[error("resource field '{field}' is out of range: {detail}")]
    OutOfRange { field: &'static str, detail: String },
    #[error("can't parse {field} value '{value}'")]
    InvalidUnit { field: &'static str, value: String },
    #[error("'{field}' is only valid for {expected} stages")]
    BadVariantCombination {
        field: &'static str,
        expected: &'static str,
    },
}

/// Memory quantity, stored canonically in MiB.
/// Parsed from `NNN[M|MB|G|GB|T|TB]`; a bare number means MiB,
/// matching sbatch's `--mem` default unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Memory(u64);

impl Memory {
    pub const fn from_mib(mib: u64) -> Self {
        Self(mib)
    }

    pub const fn from_gib(gib: u64) -> Self {
        Self(gib * 1024)
    }

    pub fn mib(&self) -> u64 {
        self.0
    }

    fn parse(s: &str, field: &'static str) -> Result<Self, ResourceError> {
        let invalid = || ResourceError::InvalidUnit {
            field,
            value: s.to_owned(),
        };
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);
        let n: u64 = digits.parse().map_err(|_| invalid())?;
        let mib = match unit.trim().to_ascii_uppercase().as_str() {
            "" | "M" | "MB" => Some(n),
            "G" | "GB" => n.checked_mul(1024),
            "T" | "TB" => n.checked_mul(1024 * 1024),
            _ => return Err(invalid()),
        };
        // a quantity that overflows u64 MiB can never fit under any
        // limit, so reject it instead of wrapping:
        let mib = mib.ok_or_else(|| ResourceError::OutOfRange {
            field,
            detail: format!("'{s}' is too large to represent"),
        })?;
        Ok(Self(mib))
    }
}

impl FromStr for Memory {
    type Err = ResourceError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, "mem")
    }
}

impl std::fmt::Display for Memory {
    /// Formats in the largest unit that divides evenly, as sbatch expects.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 > 0 && self.0 % (1024 * 1024) == 0 {
            write!(f, "{}T", self.0 / (1024 * 1024))
        } else if self.0 > 0 && self.0 % 1024 == 0 {
            write!(f, "{}G", self.0 / 1024)
        } else {
            write!(f, "{}M", self.0)
        }
    }
}

/// Wall-clock time limit, stored canonically in seconds.
/// Accepts SLURM time formats: `D-HH:MM:SS`, `D-HH:MM`, `D-HH`,
/// `HH:MM:SS`, `MM:SS`, and bare minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Walltime(u64);

impl Walltime {
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn secs(&self) -> u64 {
        self.0
    }
}

impl FromStr for Walltime {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ResourceError::InvalidUnit {
            field: "walltime",
            value: s.to_owned(),
        };
        let text = s.trim();
        let (days, clock) = match text.split_once('-') {
            Some((d, rest)) => (d.parse::<u64>().map_err(|_| invalid())?, rest),
            None => (0, text),
        };
        let parts: Vec<&str> = clock.split(':').collect();
        let nums: Vec<u64> = parts
            .iter()
            .map(|p| p.parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<_, _>>()?;
        // without a day prefix, slurm reads 1 field as minutes and
        // 2 fields as minutes:seconds; with one, fields start at hours.
        let (h, m, s) = match (days, nums.as_slice()) {
            (0, [m]) => (0, *m, 0),
            (0, [m, s]) => (0, *m, *s),
            (_, [h]) => (*h, 0, 0),
            (_, [h, m]) => (*h, *m, 0),
            (_, [h, m, s]) => (*h, *m, *s),
            _ => return Err(invalid()),
        };
        // checked arithmetic: an absurd day count must not wrap into
        // a small total that slips under the walltime limit.
        let total = days
            .checked_mul(86400)
            .and_then(|t| h.checked_mul(3600).and_then(|h| t.checked_add(h)))
            .and_then(|t| m.checked_mul(60).and_then(|m| t.checked_add(m)))
            .and_then(|t| t.checked_add(s))
            .ok_or_else(|| ResourceError::OutOfRange {
                field: "walltime",
                detail: format!("'{text}' is too large to represent"),
            })?;
        Ok(Self(total))
    }
}

impl std::fmt::Display for Walltime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let days = self.0 / 86400;
        let (h, m, s) = ((self.0 % 86400) / 3600, (self.0 % 3600) / 60, self.0 % 60);
        if days > 0 {
            write!(f, "{days}-{h:02}:{m:02}:{s:02}")
        } else {
            write!(f, "{h:02}:{m:02}:{s:02}")
        }
    }
}

/// A partially-specified set of resource requests: a stage's overrides,
/// or the file-level `[defaults]` section.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResourceOverrides {
    pub cpus: Option<u32>,
    pub mem: Option<Memory>,
    pub walltime: Option<Walltime>,
    pub gpus: Option<u32>,
    pub partition: Option<String>,
}

impl ResourceOverrides {
    /// Try to consume a `key = value` pair as a resource field.
    /// Returns false (untouched) if the key is not a resource key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<bool, ResourceError> {
        match key {
            "cpus" => {
                self.cpus = Some(parse_count(value, "cpus")?);
            }
            "mem" => {
                self.mem = Some(value.parse()?);
            }
            "walltime" => {
                self.walltime = Some(value.parse()?);
            }
            "gpus" => {
                self.gpus = Some(parse_count(value, "gpus")?);
            }
            "partition" => {
                self.partition = Some(value.to_owned());
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Field-level merge: fields set on `self` win, missing fields
    /// fall back to `base`.
    pub fn merged_over(&self, base: &Self) -> Self {
        Self {
            cpus: self.cpus.or(base.cpus),
            mem: self.mem.or(base.mem),
            walltime: self.walltime.or(base.walltime),
            gpus: self.gpus.or(base.gpus),
            partition: self.partition.clone().or_else(|| base.partition.clone()),
        }
    }
}

fn parse_count(value: &str, field: &'static str) -> Result<u32, ResourceError> {
    value.trim().parse().map_err(|_| ResourceError::InvalidUnit {
        field,
        value: value.to_owned(),
    })
}

/// Per-job maxima enforced by the cluster, plus the set of valid
/// partition names. Supplied by external configuration; the defaults
/// are deliberately permissive.
#[derive(Debug, Clone)]
pub struct SchedulerLimits {
    pub max_cpus: u32,
    pub max_mem: Memory,
    pub max_walltime: Walltime,
    pub max_gpus: u32,
    /// Valid partition names; an empty list accepts any partition.
    pub partitions: Vec<String>,
}

impl Default for SchedulerLimits {
    fn default() -> Self {
        Self {
            max_cpus: 128,
            max_mem: Memory::from_gib(512),
            max_walltime: Walltime::from_secs(7 * 86400),
            max_gpus: 8,
            partitions: Vec::new(),
        }
    }
}

// built-in fallbacks used when neither the stage nor [defaults]
// specifies a field:
const DEFAULT_CPUS: u32 = 1;
const DEFAULT_MEM: Memory = Memory::from_gib(8);
const DEFAULT_WALLTIME: Walltime = Walltime::from_secs(4 * 3600);
const DEFAULT_PARTITION: &str = "standard";
const DEFAULT_GPUS_FOR_GPU_JOB: u32 = 1;

/// Fully-normalized resource request for one job, with every field
/// resolved and validated against the scheduler limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpec {
    pub cpus: u32,
    pub mem: Memory,
    pub walltime: Walltime,
    pub gpus: u32,
    pub partition: String,
}

impl ResourceSpec {
    /// Merge a stage's overrides onto the file defaults, fill in
    /// built-in fallbacks, and validate the result. Pure function.
    pub fn normalize(
        kind: &JobKind,
        overrides: &ResourceOverrides,
        defaults: &ResourceOverrides,
        limits: &SchedulerLimits,
    ) -> Result<Self, ResourceError> {
        let merged = overrides.merged_over(defaults);

        let cpus = merged.cpus.unwrap_or(DEFAULT_CPUS);
        check_range("cpus", cpus as u64, 1, limits.max_cpus as u64)?;

        let mem = merged.mem.unwrap_or(DEFAULT_MEM);
        check_range("mem", mem.mib(), 1, limits.max_mem.mib())?;

        let walltime = merged.walltime.unwrap_or(DEFAULT_WALLTIME);
        check_range("walltime", walltime.secs(), 1, limits.max_walltime.secs())?;

        let gpus = match (kind.is_gpu(), merged.gpus) {
            (true, Some(n)) => {
                check_range("gpus", n as u64, 1, limits.max_gpus as u64)?;
                n
            }
            (true, None) => DEFAULT_GPUS_FOR_GPU_JOB,
            (false, Some(n)) if n > 0 => {
                return Err(ResourceError::BadVariantCombination {
                    field: "gpus",
                    expected: "gpu",
                })
            }
            (false, _) => 0,
        };

        let partition = merged
            .partition
            .unwrap_or_else(|| DEFAULT_PARTITION.to_owned());
        if partition.is_empty() {
            return Err(ResourceError::OutOfRange {
                field: "partition",
                detail: "partition name is empty".to_owned(),
            });
        }
        if !limits.partitions.is_empty() && !limits.partitions.iter().any(|p| *p == partition) {
            return Err(ResourceError::OutOfRange {
                field: "partition",
                detail: format!(
                    "'{}' is not a valid partition (expected one of: {})",
                    partition,
                    limits.partitions.join(", ")
                ),
            });
        }

        Ok(Self {
            cpus,
            mem,
            walltime,
            gpus,
            partition,
        })
    }
}

fn check_range(field: &'static str, val: u64, min: u64, max: u64) -> Result<(), ResourceError> {
    if val < min || val > max {
        Err(ResourceError::OutOfRange {
            field,
            detail: format!("{val} is outside the allowed range {min}..={max}"),
        })
    } else {
        Ok(())
    }
}
