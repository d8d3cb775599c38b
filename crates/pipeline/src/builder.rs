//! Recursive pipeline assembly from segment specs.

use flowline_config::SegmentSpec;
use tokio_util::sync::CancellationToken;

use crate::branch::Branch;
use crate::error::{PipelineError, Result};
use crate::parallel::Parallel;
use crate::pipeline::Pipeline;
use crate::registry::SegmentRegistry;
use crate::segment::Segment;

/// Build an unstarted pipeline from an ordered list of segment specs.
///
/// `branch` specs recurse: their `if`/`then`/`else` lists become nested
/// pipelines sharing this pipeline's shutdown token. `jobs > 1` wraps
/// the segment in a parallel fan-out of that many instances.
pub fn build(
    specs: &[SegmentSpec],
    registry: &SegmentRegistry,
    args: &[String],
) -> Result<Pipeline> {
    build_nested(specs, registry, args, CancellationToken::new())
}

fn build_nested(
    specs: &[SegmentSpec],
    registry: &SegmentRegistry,
    args: &[String],
    shutdown: CancellationToken,
) -> Result<Pipeline> {
    let mut stages: Vec<(&'static str, Box<dyn Segment>, bool)> = Vec::with_capacity(specs.len());

    for spec in specs {
        if spec.segment == "branch" {
            if spec.jobs > 1 {
                return Err(PipelineError::construction(
                    "branch",
                    "branch cannot run with jobs > 1; parallelize inside its sub-pipelines",
                ));
            }
            let condition =
                build_nested(&spec.if_branch, registry, args, shutdown.clone())?;
            let then_branch =
                build_nested(&spec.then_branch, registry, args, shutdown.clone())?;
            let else_branch =
                build_nested(&spec.else_branch, registry, args, shutdown.clone())?;
            let bypass = spec
                .config
                .get_expanded("bypass-messages", args)
                .map(|value| {
                    value.parse::<bool>().map_err(|_| {
                        PipelineError::construction(
                            "branch",
                            format!("could not parse bypass-messages value '{value}'"),
                        )
                    })
                })
                .transpose()?
                .unwrap_or(false);
            stages.push((
                "branch",
                Box::new(Branch::new(condition, then_branch, else_branch, bypass)),
                true,
            ));
            continue;
        }

        let factory = registry.lookup(&spec.segment)?;
        let is_filter = factory.is_filter();
        let segment = if spec.jobs > 1 {
            let mut instances = Vec::with_capacity(spec.jobs);
            for _ in 0..spec.jobs {
                instances.push(factory.create(&spec.config, args)?);
            }
            tracing::debug!(segment = factory.name(), jobs = spec.jobs, "parallelized");
            Box::new(Parallel::new(factory.name(), instances)) as Box<dyn Segment>
        } else {
            factory.create(&spec.config, args)?
        };
        stages.push((factory.name(), segment, is_filter));
    }

    Ok(Pipeline::assemble(stages, shutdown))
}
