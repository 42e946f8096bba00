use std::str::FromStr;

use crate::ResourceError;

/// Index range of an array stage, inclusive on both ends.
/// Written `array = LO-HI` in the definition file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayRange {
    pub lo: u32,
    pub hi: u32,
}

impl ArrayRange {
    /// Number of array tasks in this range.
    pub fn count(&self) -> u32 {
        self.hi - self.lo + 1
    }
}

impl FromStr for ArrayRange {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ResourceError::InvalidUnit {
            field: "array",
            value: s.to_owned(),
        };
        let (lo, hi) = s.split_once('-').ok_or_else(invalid)?;
        let lo: u32 = lo.trim().parse().map_err(|_| invalid())?;
        let hi: u32 = hi.trim().parse().map_err(|_| invalid())?;
        if lo > hi {
            return Err(ResourceError::OutOfRange {
                field: "array",
                detail: format!("range start {lo} is greater than range end {hi}"),
            });
        }
        Ok(Self { lo, hi })
    }
}

impl std::fmt::Display for ArrayRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.lo, self.hi)
    }
}

/// Execution mode of a job: one task, an indexed set of tasks sharing
/// a script, or a task requiring accelerator resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Single,
    Array {
        range: ArrayRange,
        /// max simultaneously running array tasks (`throttle = N`),
        /// rendered as the `%N` suffix of the `--array` directive.
        throttle: Option<u32>,
    },
    Gpu,
}

impl JobKind {
    /// The tag used in the definition file's `type` key.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Array { .. } => "array",
            Self::Gpu => "gpu",
        }
    }

    pub fn is_gpu(&self) -> bool {
        matches!(self, Self::Gpu)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array { .. })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_array_range() {
        let range: ArrayRange = "0-15".parse().unwrap();
        assert_eq!(ArrayRange { lo: 0, hi: 15 }, range);
        assert_eq!(16, range.count());
        assert_eq!("0-15", range.to_string());
    }

    #[test]
    fn test_array_range_rejects_backwards() {
        assert!(matches!(
            "9-3".parse::<ArrayRange>(),
            Err(ResourceError::OutOfRange { field: "array", .. })
        ));
    }

    #[test]
    fn test_array_range_rejects_garbage() {
        assert!(matches!(
            "all".parse::<ArrayRange>(),
            Err(ResourceError::InvalidUnit { field: "array", .. })
        ));
    }
}
