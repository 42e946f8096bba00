use anyhow::{Context, Result};
use hashbrown::HashMap;

use syntax::ast;

use crate::{ArrayRange, JobKind, ResourceOverrides};

// stage keys with reserved meanings; everything else is an
// application parameter.
const TYPE_KEY: &str = "type";
const APP_KEY: &str = "app";
const AFTER_KEY: &str = "after";
const ARRAY_KEY: &str = "array";
const THROTTLE_KEY: &str = "throttle";

#[derive(thiserror::Error, Debug)]
pub enum DefinitionError {
    #[error("duplicate stage name '{0}'")]
    DuplicateStage(String),
    #[error("stage '{stage}' has unknown job type '{tag}' (expected single, array, or gpu)")]
    UnknownJobType { stage: String, tag: String },
    #[error("stage '{stage}' is missing required key '{key}'")]
    MissingKey { stage: String, key: &'static str },
    #[error("stage '{stage}' depends on '{reference}', which is not defined in this file")]
    UnknownReference { stage: String, reference: String },
    #[error("stage '{stage}': '{key}' is only valid for array stages")]
    MisplacedKey { stage: String, key: &'static str },
    #[error("stage '{stage}' has invalid {key} value '{value}'")]
    InvalidValue {
        stage: String,
        key: String,
        value: String,
    },
    #[error("unknown key '{0}' in [defaults] (expected a resource field)")]
    UnknownDefault(String),
    #[error("a [limits] section belongs in a limits file, not a pipeline definition")]
    MisplacedLimits,
}

/// One named unit of work, as declared in the definition file.
#[derive(Debug)]
pub struct StageSpec {
    /// Stage name, unique within the definition.
    pub name: String,
    /// Job-type variant.
    pub kind: JobKind,
    /// Application identifier (`app = ...`).
    pub app: String,
    /// Application parameters in definition-file order.
    pub params: Vec<(String, String)>,
    /// Names of predecessor stages.
    pub after: Vec<String>,
    /// Per-stage resource overrides (merged over the file defaults).
    pub overrides: ResourceOverrides,
}

/// A parsed, validated pipeline definition: the file-level resource
/// defaults and the stages in definition order. Immutable once loaded.
#[derive(Debug, Default)]
pub struct PipelineDefinition {
    defaults: ResourceOverrides,
    stages: Vec<StageSpec>,
    index: HashMap<String, usize>,
}

impl PipelineDefinition {
    /// Build a definition from parsed sections, validating stage
    /// names, job-type tags, and predecessor references.
    pub fn load(items: Vec<ast::Item>) -> Result<Self> {
        let mut def = Self::default();
        for item in items {
            match item {
                ast::Item::Defaults(assignments) => def.add_defaults(assignments)?,
                ast::Item::Stage(block) => def.add_stage(block)?,
                ast::Item::Limits(_) => return Err(DefinitionError::MisplacedLimits.into()),
            }
        }
        def.check_references()?;
        log::debug!("loaded pipeline definition with {} stages", def.stages.len());
        Ok(def)
    }

    /// Stages in definition-file order.
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// File-level resource defaults.
    pub fn defaults(&self) -> &ResourceOverrides {
        &self.defaults
    }

    /// Position of the named stage in definition order, if it exists.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

// building the definition /////////////
impl PipelineDefinition {
    fn add_defaults(&mut self, assignments: Vec<ast::Assignment>) -> Result<()> {
        for asst in assignments {
            let value = scalar(&asst, "[defaults]")?;
            let recognized = self
                .defaults
                .set(asst.key, value)
                .context("in [defaults] section")?;
            if !recognized {
                return Err(DefinitionError::UnknownDefault(asst.key.to_owned()).into());
            }
        }
        Ok(())
    }

    fn add_stage(&mut self, block: ast::StageBlock) -> Result<()> {
        let name = block.name.to_owned();
        if self.index.contains_key(&name) {
            return Err(DefinitionError::DuplicateStage(name).into());
        }

        let mut tag = None;
        let mut app = None;
        let mut array = None;
        let mut throttle = None;
        let mut after = Vec::new();
        let mut params = Vec::new();
        let mut overrides = ResourceOverrides::default();

        for asst in block.assignments {
            match asst.key {
                TYPE_KEY => tag = Some(scalar(&asst, &name)?.to_owned()),
                APP_KEY => app = Some(scalar(&asst, &name)?.to_owned()),
                AFTER_KEY => {
                    for word in asst.value.words() {
                        let word = word.trim();
                        if word.is_empty() {
                            continue;
                        }
                        // repeated names collapse into a single edge:
                        if !after.iter().any(|dep| dep == word) {
                            after.push(word.to_owned());
                        }
                    }
                }
                ARRAY_KEY => {
                    let value = scalar(&asst, &name)?;
                    let range: ArrayRange = value
                        .parse()
                        .with_context(|| format!("in stage '{name}'"))?;
                    array = Some(range);
                }
                THROTTLE_KEY => {
                    let value = scalar(&asst, &name)?;
                    let n: u32 = value.parse().map_err(|_| DefinitionError::InvalidValue {
                        stage: name.clone(),
                        key: THROTTLE_KEY.to_owned(),
                        value: value.to_owned(),
                    })?;
                    throttle = Some(n);
                }
                key => {
                    let value = scalar(&asst, &name)?;
                    let recognized = overrides
                        .set(key, value)
                        .with_context(|| format!("in stage '{name}'"))?;
                    if !recognized {
                        params.push((key.to_owned(), value.to_owned()));
                    }
                }
            }
        }

        let kind = Self::make_kind(&name, tag, array, throttle)?;
        let app = app.ok_or_else(|| DefinitionError::MissingKey {
            stage: name.clone(),
            key: APP_KEY,
        })?;

        self.index.insert(name.clone(), self.stages.len());
        self.stages.push(StageSpec {
            name,
            kind,
            app,
            params,
            after,
            overrides,
        });
        Ok(())
    }

    fn make_kind(
        name: &str,
        tag: Option<String>,
        array: Option<ArrayRange>,
        throttle: Option<u32>,
    ) -> Result<JobKind> {
        let tag = tag.ok_or_else(|| DefinitionError::MissingKey {
            stage: name.to_owned(),
            key: TYPE_KEY,
        })?;
        let kind = match tag.as_str() {
            "single" => JobKind::Single,
            "gpu" => JobKind::Gpu,
            "array" => {
                let range = array.ok_or_else(|| DefinitionError::MissingKey {
                    stage: name.to_owned(),
                    key: ARRAY_KEY,
                })?;
                return Ok(JobKind::Array { range, throttle });
            }
            _ => {
                return Err(DefinitionError::UnknownJobType {
                    stage: name.to_owned(),
                    tag,
                }
                .into())
            }
        };
        // array/throttle keys on a non-array stage are misplaced:
        if array.is_some() {
            return Err(DefinitionError::MisplacedKey {
                stage: name.to_owned(),
                key: ARRAY_KEY,
            }
            .into());
        }
        if throttle.is_some() {
            return Err(DefinitionError::MisplacedKey {
                stage: name.to_owned(),
                key: THROTTLE_KEY,
            }
            .into());
        }
        Ok(kind)
    }

    fn check_references(&self) -> Result<()> {
        for stage in &self.stages {
            for dep in &stage.after {
                if !self.index.contains_key(dep) {
                    return Err(DefinitionError::UnknownReference {
                        stage: stage.name.clone(),
                        reference: dep.clone(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

fn scalar<'a>(asst: &'a ast::Assignment, stage: &str) -> Result<&'a str, DefinitionError> {
    match &asst.value {
        ast::Value::Literal { val } => Ok(val),
        ast::Value::List { items } => Err(DefinitionError::InvalidValue {
            stage: stage.to_owned(),
            key: asst.key.to_owned(),
            value: items.join(","),
        }),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Memory, ResourceError};

    fn load(text: &str) -> Result<PipelineDefinition> {
        PipelineDefinition::load(syntax::parse(text)?)
    }

    const BASIC: &str = "\
[defaults]
partition = standard
mem = 8GB

[stage dryrun]
type = single
app = coyote
vis = test.ms
cfcache = test.cf
mode = dryrun

[stage fillcf]
type = array
app = coyote
after = dryrun
array = 0-15
throttle = 4
mem = 16GB
vis = test.ms
cfcache = test.cf
mode = fillcf
";

    #[test]
    fn test_load_basic() -> Result<()> {
        let def = load(BASIC)?;
        assert_eq!(2, def.len());
        assert_eq!(Some(Memory::from_gib(8)), def.defaults().mem);

        let fillcf = &def.stages()[1];
        assert_eq!("fillcf", fillcf.name);
        assert_eq!(vec!["dryrun".to_owned()], fillcf.after);
        assert_eq!(Some(Memory::from_gib(16)), fillcf.overrides.mem);
        assert!(fillcf.kind.is_array());
        // reserved keys never leak into app params:
        assert!(fillcf.params.iter().all(|(k, _)| k != "after" && k != "mem"));
        Ok(())
    }

    #[test]
    fn test_empty_definition() -> Result<()> {
        assert!(load("")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_duplicate_stage() {
        let text = "[stage a]\ntype = single\napp = coyote\n\n[stage a]\ntype = single\napp = coyote\n";
        let err = load(text).unwrap_err();
        let err = err.downcast_ref::<DefinitionError>().unwrap();
        assert!(matches!(err, DefinitionError::DuplicateStage(name) if name == "a"));
    }

    #[test]
    fn test_unknown_reference() {
        let text = "[stage a]\ntype = single\napp = coyote\nafter = ghost\n";
        let err = load(text).unwrap_err();
        let err = err.downcast_ref::<DefinitionError>().unwrap();
        assert!(
            matches!(err, DefinitionError::UnknownReference { reference, .. } if reference == "ghost")
        );
    }

    #[test]
    fn test_unknown_job_type() {
        let text = "[stage a]\ntype = mpi\napp = coyote\n";
        let err = load(text).unwrap_err();
        let err = err.downcast_ref::<DefinitionError>().unwrap();
        assert!(matches!(err, DefinitionError::UnknownJobType { tag, .. } if tag == "mpi"));
    }

    #[test]
    fn test_array_requires_range() {
        let text = "[stage a]\ntype = array\napp = coyote\n";
        let err = load(text).unwrap_err();
        let err = err.downcast_ref::<DefinitionError>().unwrap();
        assert!(matches!(err, DefinitionError::MissingKey { key: "array", .. }));
    }

    #[test]
    fn test_throttle_only_on_array() {
        let text = "[stage a]\ntype = single\napp = coyote\nthrottle = 4\n";
        let err = load(text).unwrap_err();
        let err = err.downcast_ref::<DefinitionError>().unwrap();
        assert!(matches!(
            err,
            DefinitionError::MisplacedKey { key: "throttle", .. }
        ));
    }

    #[test]
    fn test_bad_mem_is_resource_error() {
        let text = "[stage a]\ntype = single\napp = coyote\nmem = banana\n";
        let err = load(text).unwrap_err();
        // the underlying kind survives the stage context wrapper:
        let err = err.downcast_ref::<ResourceError>().unwrap();
        assert!(matches!(err, ResourceError::InvalidUnit { field: "mem", .. }));
    }

    #[test]
    fn test_self_reference_passes_load() -> Result<()> {
        // a self-dependency is referentially valid; the graph builder
        // rejects it as a one-node cycle.
        let text = "[stage a]\ntype = single\napp = coyote\nafter = a\n";
        let def = load(text)?;
        assert_eq!(vec!["a".to_owned()], def.stages()[0].after);
        Ok(())
    }

    #[test]
    fn test_unknown_defaults_key() {
        let err = load("[defaults]\ncolor = blue\n").unwrap_err();
        let err = err.downcast_ref::<DefinitionError>().unwrap();
        assert!(matches!(err, DefinitionError::UnknownDefault(key) if key == "color"));
    }
}
