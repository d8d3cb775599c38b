//! The `csv` segment prints flows as CSV to stdout or a file.
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `filename` | `""` | write to this file; empty writes stdout |
//! | `fields` | all | comma-separated field names to emit |
//!
//! The header line is written once on startup. Unknown field names are
//! construction errors.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};

use async_trait::async_trait;
use flowline_config::SegmentConfig;
use flowline_flow::Flow;
use flowline_pipeline::{
    optional, PipelineError, Result, Segment, SegmentFactory, SegmentIo, ShutdownHandle,
};

#[cfg(test)]
#[path = "csv_test.rs"]
mod tests;

enum Target {
    Stdout,
    File(BufWriter<std::fs::File>),
}

pub struct Csv {
    target: Target,
    fields: Vec<String>,
}

impl Csv {
    fn write_line(&mut self, line: &str) {
        let result = match &mut self.target {
            Target::Stdout => {
                let stdout = std::io::stdout();
                let mut lock = stdout.lock();
                writeln!(lock, "{line}")
            }
            Target::File(writer) => writeln!(writer, "{line}"),
        };
        if let Err(error) = result {
            tracing::warn!(%error, "could not write csv line");
        }
    }
}

#[async_trait]
impl Segment for Csv {
    fn name(&self) -> &'static str {
        "csv"
    }

    async fn run(mut self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        let header = self.fields.join(",");
        self.write_line(&header);

        while let Ok(flow) = io.rx.recv().await {
            let line = self
                .fields
                .iter()
                .map(|field| flow.format_field(field).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(",");
            self.write_line(&line);
            if !io.forward(flow).await {
                break;
            }
        }

        if let Target::File(writer) = &mut self.target {
            if let Err(error) = writer.flush() {
                tracing::warn!(%error, "flushing csv file failed");
            }
        }
    }
}

pub struct CsvFactory;

impl SegmentFactory for CsvFactory {
    fn create(&self, config: &SegmentConfig, args: &[String]) -> Result<Box<dyn Segment>> {
        let opts = config.expanded(args);

        let fields: Vec<String> = match opts.get("fields") {
            Some(value) if !value.is_empty() => {
                let fields: Vec<String> = value
                    .split(',')
                    .map(|field| field.trim().to_string())
                    .filter(|field| !field.is_empty())
                    .collect();
                for field in &fields {
                    if !Flow::has_field(field) {
                        return Err(PipelineError::construction(
                            self.name(),
                            format!("flow records have no field named '{field}'"),
                        ));
                    }
                }
                fields
            }
            _ => Flow::FIELD_NAMES.iter().map(|f| f.to_string()).collect(),
        };

        let filename = optional(&opts, "filename", "");
        let target = if filename.is_empty() {
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

        Ok(Box::new(Csv { target, fields }))
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}
