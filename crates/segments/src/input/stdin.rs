//! The `stdin` segment reads JSON-encoded flows from stdin or a file
//! and introduces them into the pipeline, next to anything arriving
//! from upstream. Together with the `json` sink this lets pipelines be
//! piped into each other or replayed from recorded files.
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `filename` | `""` | file to read; empty reads stdin |
//! | `eofcloses` | false | gracefully end the pipeline after the file is read |

use std::fs::File;
use std::io::{BufRead, BufReader};

use async_trait::async_trait;
use flowline_config::SegmentConfig;
use flowline_flow::decode_line;
use flowline_pipeline::{
    optional, optional_parsed, PipelineError, Result, Segment, SegmentFactory, SegmentIo,
    ShutdownHandle,
};
use tokio::sync::mpsc;

#[cfg(test)]
#[path = "stdin_test.rs"]
mod tests;

/// Reader-side events handed from the blocking reader thread.
enum LineEvent {
    Line(String),
    Eof,
}

pub struct StdIn {
    filename: String,
    eof_closes: bool,
}

#[async_trait]
impl Segment for StdIn {
    fn name(&self) -> &'static str {
        "stdin"
    }

    async fn run(self: Box<Self>, io: SegmentIo, shutdown: ShutdownHandle) {
        let (line_tx, mut line_rx) = mpsc::channel::<LineEvent>(64);
        let filename = self.filename.clone();

        // plain blocking reads on a separate thread; it ends on EOF or
        // when the segment is gone and the channel closes under it
        std::thread::spawn(move || {
            let source: Box<dyn BufRead + Send> = if filename.is_empty() {
                Box::new(BufReader::new(std::io::stdin()))
            } else {
                match File::open(&filename) {
                    Ok(file) => Box::new(BufReader::new(file)),
                    Err(error) => {
                        tracing::error!(%error, %filename, "cannot reopen input file");
                        let _ = line_tx.blocking_send(LineEvent::Eof);
                        return;
                    }
                }
            };
            for line in source.lines() {
                match line {
                    Ok(line) => {
                        if line.is_empty() {
                            continue;
                        }
                        if line_tx.blocking_send(LineEvent::Line(line)).is_err() {
                            return;
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%error, "skipping a flow, could not read line");
                    }
                }
            }
            let _ = line_tx.blocking_send(LineEvent::Eof);
        });

        let mut lines_open = true;
        loop {
            tokio::select! {
                upstream = io.rx.recv() => match upstream {
                    Ok(flow) => {
                        if !io.forward(flow).await {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                event = line_rx.recv(), if lines_open => match event {
                    Some(LineEvent::Line(line)) => match decode_line(&line) {
                        Ok(flow) => {
                            if !io.forward(Box::new(flow)).await {
                                break;
                            }
                        }
                        Err(error) => {
                            tracing::warn!(%error, "skipping a flow, failed to decode input line");
                        }
                    },
                    Some(LineEvent::Eof) | None => {
                        if self.eof_closes {
                            tracing::info!(
                                filename = %self.filename,
                                "reached end of input, closing pipeline"
                            );
                            shutdown.shutdown_pipeline();
                        }
                        lines_open = false;
                    }
                },
                _ = shutdown.closed() => break,
            }
        }

        // a reader blocked on an interactive stdin only resolves at
        // process exit; dropping the channel ends it on its next line
        drop(line_rx);
    }
}

pub struct StdInFactory;

impl SegmentFactory for StdInFactory {
    fn create(&self, config: &SegmentConfig, args: &[String]) -> Result<Box<dyn Segment>> {
        let opts = config.expanded(args);
        let filename = optional(&opts, "filename", "");
        if !filename.is_empty() && !std::path::Path::new(&filename).is_file() {
            return Err(PipelineError::construction(
                self.name(),
                format!("file specified in 'filename' is not accessible: {filename}"),
            ));
        }
        if filename.is_empty() {
            tracing::info!(segment = self.name(), "'filename' unset, reading stdin");
        }
        Ok(Box::new(StdIn {
            filename,
            eof_closes: optional_parsed(&opts, "eofcloses", false, self.name()),
        }))
    }

    fn name(&self) -> &'static str {
        "stdin"
    }
}
