use graph::{JobGraph, JobNode};
use model::JobKind;

mod script_builder;
use script_builder::ScriptBuilder;

/// One generated script, plus the metadata the submission collaborator
/// needs to wire dependencies at submission time. The script text
/// never contains resolved job ids; predecessors are carried by name.
#[derive(Debug)]
pub struct ScriptArtifact {
    /// Originating stage name.
    pub stage: String,
    /// Literal script text.
    pub text: String,
    /// Predecessor stage names, in declaration order.
    pub after: Vec<String>,
}

/// Render every node, in the graph's deterministic order. A
/// predecessor's artifact always precedes its dependents'.
pub fn render(graph: &JobGraph) -> Vec<ScriptArtifact> {
    graph.iter_ordered().map(|node| render_node(graph, node)).collect()
}

fn render_node(graph: &JobGraph, node: &JobNode) -> ScriptArtifact {
    let mut script = ScriptBuilder::new();
    script
        .directive("job-name", &node.name)
        .directive("partition", &node.resources.partition)
        .directive("time", node.resources.walltime)
        .directive("mem", node.resources.mem)
        .directive("cpus-per-task", node.resources.cpus)
        .directive("nodes", 1)
        .directive("ntasks-per-node", 1)
        .directive("export", "ALL");

    // array tasks log per element, everything else per job id:
    match &node.kind {
        JobKind::Array { range, throttle } => {
            script
                .directive("output", format_args!("logs/{}_%A_%a.out", node.name))
                .directive("error", format_args!("logs/{}_%A_%a.err", node.name));
            match throttle {
                Some(t) => script.directive("array", format_args!("{range}%{t}")),
                None => script.directive("array", range),
            };
        }
        _ => {
            script
                .directive("output", format_args!("logs/{}_%j.out", node.name))
                .directive("error", format_args!("logs/{}_%j.err", node.name));
        }
    }

    if node.resources.gpus > 0 {
        script.directive("gres", format_args!("gpu:{}", node.resources.gpus));
    }

    ScriptArtifact {
        stage: node.name.clone(),
        after: graph.dep_names(node).into_iter().map(str::to_owned).collect(),
        text: script.command(&node.command),
    }
}

/// Generate `submit.sh`: a plain shell helper that runs `sbatch` per
/// stage in artifact order, captures each returned job id, and
/// substitutes predecessor ids into `--dependency=afterok:` flags.
/// Stage-name-to-job-id substitution happens at submission time; this
/// crate itself never invokes the scheduler.
pub fn submit_script(artifacts: &[ScriptArtifact]) -> String {
    let mut buf = String::with_capacity(256 + artifacts.len() * 128);
    buf.push_str("#!/bin/bash\n");
    buf.push_str("# Submit the generated scripts in dependency order, wiring each\n");
    buf.push_str("# stage's afterok flag to the job ids of its predecessors.\n");
    buf.push_str("set -euo pipefail\n");
    buf.push_str("cd \"$(dirname \"$0\")\"\n");
    buf.push_str("mkdir -p logs\n");
    buf.push_str("declare -A JOB_IDS\n\n");
    for artifact in artifacts {
        let mut flags = String::new();
        if !artifact.after.is_empty() {
            let deps: Vec<String> = artifact
                .after
                .iter()
                .map(|dep| format!("${{JOB_IDS[{dep}]}}"))
                .collect();
            flags = format!(" --dependency=afterok:{}", deps.join(":"));
        }
        buf.push_str(&format!(
            "JOB_IDS[{stage}]=$(sbatch --parsable{flags} {stage}.sbatch)\n\
             echo \"submitted {stage} as job ${{JOB_IDS[{stage}]}}\"\n",
            stage = artifact.stage,
        ));
    }
    buf
}

#[cfg(test)]
mod test {
    use anyhow::Result;
    use graph::JobGraph;
    use model::{PipelineDefinition, Registry, SchedulerLimits};

    fn compile(text: &str) -> Result<JobGraph> {
        let def = PipelineDefinition::load(syntax::parse(text)?)?;
        JobGraph::build(&def, &SchedulerLimits::default(), &Registry::default())
    }

    const COYOTE_PARAMS: &str = "vis = test.ms\ncfcache = test.cf\nmode = dryrun\n";

    #[test]
    fn test_render_single() -> Result<()> {
        let text = format!(
            "[stage prep]\ntype = single\napp = coyote\ncpus = 4\nmem = 16GB\n{COYOTE_PARAMS}"
        );
        let artifacts = super::render(&compile(&text)?);
        assert_eq!(1, artifacts.len());
        let script = &artifacts[0].text;
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("#SBATCH --job-name=prep\n"));
        assert!(script.contains("#SBATCH --cpus-per-task=4\n"));
        assert!(script.contains("#SBATCH --mem=16G\n"));
        assert!(script.contains("#SBATCH --output=logs/prep_%j.out\n"));
        assert!(!script.contains("--array"));
        assert!(!script.contains("--gres"));
        assert!(script.ends_with("mode=dryrun\n"));
        Ok(())
    }

    #[test]
    fn test_render_array_with_throttle() -> Result<()> {
        let text = format!(
            "[stage fill]\ntype = array\narray = 0-15\nthrottle = 4\napp = coyote\n{COYOTE_PARAMS}"
        );
        let artifacts = super::render(&compile(&text)?);
        let script = &artifacts[0].text;
        assert!(script.contains("#SBATCH --array=0-15%4\n"));
        assert!(script.contains("#SBATCH --output=logs/fill_%A_%a.out\n"));
        Ok(())
    }

    #[test]
    fn test_render_gpu() -> Result<()> {
        let text = format!("[stage g]\ntype = gpu\ngpus = 2\napp = coyote\n{COYOTE_PARAMS}");
        let artifacts = super::render(&compile(&text)?);
        assert!(artifacts[0].text.contains("#SBATCH --gres=gpu:2\n"));
        Ok(())
    }

    #[test]
    fn test_artifacts_carry_predecessor_names_not_ids() -> Result<()> {
        let text = format!(
            "[stage a]\ntype = single\napp = coyote\n{COYOTE_PARAMS}\n\
             [stage b]\ntype = single\napp = coyote\nafter = a\n{COYOTE_PARAMS}"
        );
        let artifacts = super::render(&compile(&text)?);
        assert_eq!(vec!["a".to_owned()], artifacts[1].after);
        assert!(!artifacts[1].text.contains("--dependency"));
        Ok(())
    }

    #[test]
    fn test_submit_script_wires_afterok() -> Result<()> {
        let text = format!(
            "[stage a]\ntype = single\napp = coyote\n{COYOTE_PARAMS}\n\
             [stage b]\ntype = single\napp = coyote\nafter = a\n{COYOTE_PARAMS}"
        );
        let artifacts = super::render(&compile(&text)?);
        let submit = super::submit_script(&artifacts);
        assert!(submit.contains("JOB_IDS[a]=$(sbatch --parsable a.sbatch)"));
        assert!(submit
            .contains("JOB_IDS[b]=$(sbatch --parsable --dependency=afterok:${JOB_IDS[a]} b.sbatch)"));
        // predecessors are always submitted first:
        assert!(submit.find("JOB_IDS[a]").unwrap() < submit.find("JOB_IDS[b]").unwrap());
        Ok(())
    }
}
