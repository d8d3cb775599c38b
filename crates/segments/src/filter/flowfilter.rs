//! The `flowfilter` segment evaluates a filter expression against each
//! flow. Matching flows continue downstream; everything else goes to
//! the drop side-band, which inside a `branch` condition selects the
//! `else` path.
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `filter` | `""` | filter expression; the empty filter matches all flows |
//!
//! Expression syntax errors fail segment construction; semantic errors
//! only detectable against a concrete flow (a reversed numeric range)
//! are logged once and the flow is dropped.

use async_trait::async_trait;
use flowline_config::SegmentConfig;
use flowline_filter::{evaluate, parse, Expression};
use flowline_pipeline::{
    optional, PipelineError, Result, Segment, SegmentFactory, SegmentIo, ShutdownHandle,
};

#[cfg(test)]
#[path = "flowfilter_test.rs"]
mod tests;

pub struct FlowFilter {
    expression: Expression,
}

#[async_trait]
impl Segment for FlowFilter {
    fn name(&self) -> &'static str {
        "flowfilter"
    }

    async fn run(self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        let mut reported_error = false;
        while let Ok(flow) = io.rx.recv().await {
            match evaluate(&self.expression, &flow) {
                Ok(true) => {
                    if !io.forward(flow).await {
                        break;
                    }
                }
                Ok(false) => io.drop_flow(flow).await,
                Err(error) => {
                    if !reported_error {
                        tracing::warn!(%error, "filter evaluation failed, dropping flows");
                        reported_error = true;
                    }
                    io.drop_flow(flow).await;
                }
            }
        }
    }
}

pub struct FlowFilterFactory;

impl SegmentFactory for FlowFilterFactory {
    fn create(&self, config: &SegmentConfig, args: &[String]) -> Result<Box<dyn Segment>> {
        let opts = config.expanded(args);
        let filter = optional(&opts, "filter", "");
        let expression = parse(&filter).map_err(|error| {
            PipelineError::construction(self.name(), format!("in '{filter}': {error}"))
        })?;
        Ok(Box::new(FlowFilter { expression }))
    }

    fn name(&self) -> &'static str {
        "flowfilter"
    }

    fn is_filter(&self) -> bool {
        true
    }
}
