//! The `dropfields` segment deletes fields from flows, either keeping
//! or dropping the listed ones.
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `policy` | required | `keep` retains only the listed fields, `drop` clears them |
//! | `fields` | required | comma-separated field names (`SrcAddr,Bytes,...`) |
//!
//! Field names go through the static field table of the flow record;
//! unknown names fail segment construction instead of being skipped
//! silently per flow.

use async_trait::async_trait;
use flowline_config::SegmentConfig;
use flowline_flow::Flow;
use flowline_pipeline::{
    required, PipelineError, Result, Segment, SegmentFactory, SegmentIo, ShutdownHandle,
};

#[cfg(test)]
#[path = "dropfields_test.rs"]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Keep,
    Drop,
}

pub struct DropFields {
    policy: Policy,
    fields: Vec<String>,
}

#[async_trait]
impl Segment for DropFields {
    fn name(&self) -> &'static str {
        "dropfields"
    }

    async fn run(self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        while let Ok(mut flow) = io.rx.recv().await {
            match self.policy {
                Policy::Keep => {
                    let mut reduced = Flow::default();
                    for field in &self.fields {
                        flow.copy_field(field, &mut reduced);
                    }
                    *flow = reduced;
                }
                Policy::Drop => {
                    for field in &self.fields {
                        flow.clear_field(field);
                    }
                }
            }
            if !io.forward(flow).await {
                break;
            }
        }
    }
}

pub struct DropFieldsFactory;

impl SegmentFactory for DropFieldsFactory {
    fn create(&self, config: &SegmentConfig, args: &[String]) -> Result<Box<dyn Segment>> {
        let opts = config.expanded(args);
        let policy = match required(&opts, "policy", self.name())?.as_str() {
            "keep" => Policy::Keep,
            "drop" => Policy::Drop,
            other => {
                return Err(PipelineError::construction(
                    self.name(),
                    format!("policy must be 'keep' or 'drop', got '{other}'"),
                ))
            }
        };

        let fields: Vec<String> = required(&opts, "fields", self.name())?
            .split(',')
            .map(|field| field.trim().to_string())
            .filter(|field| !field.is_empty())
            .collect();
        if fields.is_empty() {
            return Err(PipelineError::construction(
                self.name(),
                "the 'fields' option must name at least one field",
            ));
        }
        for field in &fields {
            if !Flow::has_field(field) {
                return Err(PipelineError::construction(
                    self.name(),
                    format!("flow records have no field named '{field}'"),
                ));
            }
        }

        Ok(Box::new(DropFields { policy, fields }))
    }

    fn name(&self) -> &'static str {
        "dropfields"
    }
}
