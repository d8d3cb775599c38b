//! The `json` segment writes flows as JSON lines to stdout or a file,
//! the counterpart of the `stdin` segment for piping pipelines into
//! each other.
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `filename` | `""` | append to this file; empty writes stdout |
//!
//! Write errors are logged and the flow still continues downstream;
//! sinks never stall the pipeline over their own output.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};

use async_trait::async_trait;
use flowline_config::SegmentConfig;
use flowline_flow::encode_line;
use flowline_pipeline::{
    optional, PipelineError, Result, Segment, SegmentFactory, SegmentIo, ShutdownHandle,
};

#[cfg(test)]
#[path = "json_test.rs"]
mod tests;

enum Target {
    Stdout,
    File(BufWriter<std::fs::File>),
}

pub struct Json {
    target: Target,
}

#[async_trait]
impl Segment for Json {
    fn name(&self) -> &'static str {
        "json"
    }

    async fn run(mut self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        let mut reported_error = false;
        while let Ok(flow) = io.rx.recv().await {
            match encode_line(&flow) {
                Ok(line) => {
                    let result = match &mut self.target {
                        Target::Stdout => {
                            let stdout = std::io::stdout();
                            let mut lock = stdout.lock();
                            writeln!(lock, "{line}")
                        }
                        Target::File(writer) => writeln!(writer, "{line}"),
                    };
                    if let Err(error) = result {
                        if !reported_error {
                            tracing::warn!(%error, "could not write flow, passing it on");
                            reported_error = true;
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "skipping a flow, failed to encode it as JSON");
                }
            }
            if !io.forward(flow).await {
                break;
            }
        }
        if let Target::File(writer) = &mut self.target {
            if let Err(error) = writer.flush() {
                tracing::warn!(%error, "flushing output file failed");
            }
        }
    }
}

pub struct JsonFactory;

impl SegmentFactory for JsonFactory {
    fn create(&self, config: &SegmentConfig, args: &[String]) -> Result<Box<dyn Segment>> {
        let opts = config.expanded(args);
        let filename = optional(&opts, "filename", "");
        let target = if filename.is_empty() {
            tracing::info!(segment = self.name(), "'filename' unset, writing to stdout");
            Target::Stdout
        } else {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&filename)
                .map_err(|error| {
                    PipelineError::construction(
                        self.name(),
                        format!("file specified in 'filename' is not accessible: {error}"),
                    )
                })?;
            Target::File(BufWriter::new(file))
        };
        Ok(Box::new(Json { target }))
    }

    fn name(&self) -> &'static str {
        "json"
    }
}
