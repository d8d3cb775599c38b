//! The `diskbuffer` segment absorbs bursts that the downstream side
//! cannot keep up with. Flows pass through a bounded in-memory queue;
//! when the queue fills past a high watermark they are spooled to
//! zstd-compressed JSON files, and when the queue runs near empty the
//! files are replayed back into the pipeline and deleted.
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `bufferdir` | required | writable spool directory |
//! | `queuesize` | 65536 | in-memory queue capacity (min 64) |
//! | `batchsize` | 128 | flows written per spool iteration |
//! | `filesize` | 50 MiB | spool file rotation size |
//! | `maxcachesize` | 1 GiB | total on-disk budget |
//! | `highmemorymark` | 70 | queue fill % starting a spool |
//! | `lowmemorymark` | 30 | queue fill % stopping a spool |
//! | `readingmemorymark` | 5 | queue fill % starting a replay |
//! | `queuestatusinterval` | 0 | seconds between fill logs, 0 disables |
//!
//! # State machine
//!
//! A decider polls the watermarks on a fixed cadence and drives three
//! states; every transition is logged:
//!
//! ```text
//!            fill > high && disk < max
//!   Idle ───────────────────────────────→ Spooling
//!     ↑        fill < low │ queue empty │ file full     │
//!     └────────────────────────────────────────────────┘
//!
//!            fill < reading && files exist
//!   Idle ───────────────────────────────→ Replaying
//!     ↑        fill > low (file boundary)               │
//!     └────────────────────────────────────────────────┘
//! ```
//!
//! Spooling and replaying run inline in the decider, so they are
//! mutually exclusive by construction. A replay that sees the queue
//! shoot past the high watermark stops immediately and persists the
//! still-unread lines of its current file into a `rest_<uuid>` spool
//! file. When the input closes, whatever remains in the queue is
//! drained to one final segment file; termination drops no flows.
//!
//! Spool files are `<uuid>.json.zst`: newline-delimited JSON flows,
//! zstd-compressed. They are the only persisted state; deleting them
//! loses only queued overflow.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytesize::ByteSize;
use flowline_config::SegmentConfig;
use flowline_flow::{decode_line, encode_line};
use flowline_pipeline::{
    flow_channel, optional_parsed, required, FlowBox, FlowReceiver, FlowSender, PipelineError,
    Result, Segment, SegmentFactory, SegmentIo, ShutdownHandle,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[cfg(test)]
#[path = "diskbuffer_test.rs"]
mod tests;

const DEFAULT_QUEUE_SIZE: usize = 65536;
const MIN_QUEUE_SIZE: usize = 64;
const DEFAULT_BATCH_SIZE: usize = 128;
const DEFAULT_HIGH_MARK: usize = 70;
const DEFAULT_LOW_MARK: usize = 30;
const DEFAULT_READING_MARK: usize = 5;
const DEFAULT_FILE_SIZE: u64 = 50 * 1024 * 1024;
const DEFAULT_MAX_CACHE_SIZE: u64 = 1024 * 1024 * 1024;
/// Watermark poll cadence of the decider loop
const DECIDER_CADENCE: Duration = Duration::from_millis(100);
/// How often the aggregate on-disk size is re-scanned
const DISK_SCAN_INTERVAL: Duration = Duration::from_secs(10);
const SPOOL_SUFFIX: &str = ".json.zst";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BufferState {
    Idle,
    Spooling,
    Replaying,
}

pub struct DiskBuffer {
    buffer_dir: PathBuf,
    queue_size: usize,
    batch_size: usize,
    file_size: u64,
    max_cache_size: u64,
    high_mark: usize,
    low_mark: usize,
    reading_mark: usize,
    queue_status_interval: Option<Duration>,
}

/// Bounded MPMC queue with its own fill counter, since the watermark
/// checks need the current length.
struct MemQueue {
    tx: FlowSender,
    rx: FlowReceiver,
    len: AtomicUsize,
    capacity: usize,
}

impl MemQueue {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = flow_channel(capacity);
        Self {
            tx,
            rx,
            len: AtomicUsize::new(0),
            capacity,
        }
    }

    async fn push(&self, flow: FlowBox) {
        // both halves live in this struct, the channel cannot close
        if self.tx.send(flow).await.is_ok() {
            self.len.fetch_add(1, Ordering::Relaxed);
        }
    }

    async fn pop(&self) -> FlowBox {
        let flow = self.rx.recv().await.expect("queue sender half is owned");
        self.len.fetch_sub(1, Ordering::Relaxed);
        flow
    }

    fn try_pop(&self) -> Option<FlowBox> {
        let flow = self.rx.try_recv().ok()?;
        self.len.fetch_sub(1, Ordering::Relaxed);
        Some(flow)
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    fn fill_percent(&self) -> usize {
        self.len() * 100 / self.capacity
    }
}

/// Counts compressed bytes reaching the spool file, for size-based
/// rotation without flushing the encoder.
struct CountingWriter {
    inner: File,
    written: Arc<AtomicU64>,
}

impl Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

struct SpoolFile {
    path: PathBuf,
    writer: BufWriter<zstd::stream::write::AutoFinishEncoder<'static, CountingWriter>>,
    written: Arc<AtomicU64>,
}

impl SpoolFile {
    fn create(dir: &Path, prefix: &str) -> std::io::Result<Self> {
        let path = dir.join(format!("{prefix}{}{SPOOL_SUFFIX}", Uuid::new_v4()));
        let written = Arc::new(AtomicU64::new(0));
        let file = File::create(&path)?;
        let counting = CountingWriter {
            inner: file,
            written: Arc::clone(&written),
        };
        let encoder = zstd::stream::write::Encoder::new(counting, 1)?;
        Ok(Self {
            path,
            writer: BufWriter::with_capacity(64 * 1024, encoder.auto_finish()),
            written,
        })
    }

    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")
    }

    fn compressed_size(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    fn finish(mut self) -> PathBuf {
        if let Err(error) = self.writer.flush() {
            tracing::warn!(%error, file = %self.path.display(), "flushing spool file failed");
        }
        self.path
    }
}

#[async_trait]
impl Segment for DiskBuffer {
    fn name(&self) -> &'static str {
        "diskbuffer"
    }

    async fn run(self: Box<Self>, io: SegmentIo, shutdown: ShutdownHandle) {
        let queue = Arc::new(MemQueue::new(self.queue_size));
        let stop = CancellationToken::new();

        // input pump: upstream into the queue; a full queue blocks and
        // surfaces backpressure upstream
        let in_pump = {
            let queue = Arc::clone(&queue);
            let stop = stop.clone();
            let rx = io.rx.clone();
            tokio::spawn(async move {
                while let Ok(flow) = rx.recv().await {
                    queue.push(flow).await;
                }
                stop.cancel();
            })
        };

        // output pump: queue into the next segment
        let out_pump = {
            let queue = Arc::clone(&queue);
            let stop = stop.clone();
            let tx = io.tx.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        flow = queue.pop() => {
                            if tx.send(flow).await.is_err() {
                                return;
                            }
                        }
                        _ = stop.cancelled() => return,
                    }
                }
            })
        };

        let status = self.queue_status_interval.map(|interval| {
            let queue = Arc::clone(&queue);
            let stop = stop.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {
                            tracing::debug!(
                                fill = queue.len(),
                                capacity = queue.capacity,
                                percent = queue.fill_percent(),
                                "queue status"
                            );
                        }
                        _ = stop.cancelled() => return,
                    }
                }
            })
        });

        self.decide(&queue, &stop, &shutdown).await;

        let _ = in_pump.await;
        let _ = out_pump.await;
        if let Some(status) = status {
            let _ = status.await;
        }
    }
}

impl DiskBuffer {
    /// The decider loop owning the state machine. Spool and replay run
    /// inline, so only one of them can touch the spool directory at a
    /// time.
    async fn decide(
        &self,
        queue: &MemQueue,
        stop: &CancellationToken,
        shutdown: &ShutdownHandle,
    ) {
        let mut state = BufferState::Idle;
        let mut disk = DiskUsage::scan(&self.buffer_dir);
        let mut last_scan = Instant::now();

        loop {
            if stop.is_cancelled() || shutdown.is_closed() {
                break;
            }

            if last_scan.elapsed() >= DISK_SCAN_INTERVAL {
                disk = DiskUsage::scan(&self.buffer_dir);
                last_scan = Instant::now();
            }

            let fill = queue.fill_percent();
            if fill < self.reading_mark && disk.has_files() {
                self.transition(&mut state, BufferState::Replaying);
                self.replay(queue).await;
                self.transition(&mut state, BufferState::Idle);
                disk = DiskUsage::scan(&self.buffer_dir);
                last_scan = Instant::now();
            } else if fill > self.high_mark && disk.total_bytes < self.max_cache_size {
                self.transition(&mut state, BufferState::Spooling);
                self.spool(queue).await;
                self.transition(&mut state, BufferState::Idle);
                disk = DiskUsage::scan(&self.buffer_dir);
                last_scan = Instant::now();
            }

            tokio::select! {
                _ = tokio::time::sleep(DECIDER_CADENCE) => {}
                _ = stop.cancelled() => break,
                _ = shutdown.closed() => break,
            }
        }

        // termination must not lose queued flows: whatever the output
        // pump did not drain goes into one final spool segment
        if queue.len() > 0 {
            tracing::info!(
                remaining = queue.len(),
                "draining the memory queue to disk before exit"
            );
            self.spool_remaining(queue);
        }
    }

    fn transition(&self, state: &mut BufferState, next: BufferState) {
        if *state != next {
            tracing::info!(from = ?*state, to = ?next, "disk buffer state change");
            *state = next;
        }
    }

    /// Write queued flows to spool files until the queue drops under
    /// the low watermark or runs empty. Files rotate at the configured
    /// size.
    async fn spool(&self, queue: &MemQueue) {
        let mut file = match SpoolFile::create(&self.buffer_dir, "") {
            Ok(file) => file,
            Err(error) => {
                tracing::error!(%error, dir = %self.buffer_dir.display(), "cannot create spool file");
                return;
            }
        };
        tracing::debug!(file = %file.path.display(), "spooling to disk");

        let mut wrote_any = false;
        loop {
            for _ in 0..self.batch_size {
                let Some(flow) = queue.try_pop() else {
                    let path = file.finish();
                    if !wrote_any {
                        let _ = std::fs::remove_file(&path);
                    }
                    return;
                };
                self.write_flow(&mut file, &flow);
                wrote_any = true;
            }

            if file.compressed_size() > self.file_size {
                tracing::debug!(
                    file = %file.path.display(),
                    size = file.compressed_size(),
                    "spool file reached its size limit, rotating"
                );
                file.finish();
                match SpoolFile::create(&self.buffer_dir, "") {
                    Ok(next) => file = next,
                    Err(error) => {
                        tracing::error!(%error, "cannot rotate spool file");
                        return;
                    }
                }
            }
            if queue.fill_percent() < self.low_mark {
                file.finish();
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    /// Drain everything still queued into one final segment.
    fn spool_remaining(&self, queue: &MemQueue) {
        let mut file = match SpoolFile::create(&self.buffer_dir, "") {
            Ok(file) => file,
            Err(error) => {
                tracing::error!(%error, "cannot create final spool file, queued flows are lost");
                return;
            }
        };
        let mut count = 0u64;
        while let Some(flow) = queue.try_pop() {
            self.write_flow(&mut file, &flow);
            count += 1;
        }
        let path = file.finish();
        if count == 0 {
            let _ = std::fs::remove_file(&path);
        } else {
            tracing::info!(file = %path.display(), count, "final spool segment written");
        }
    }

    fn write_flow(&self, file: &mut SpoolFile, flow: &flowline_flow::Flow) {
        match encode_line(flow) {
            Ok(line) => {
                if let Err(error) = file.write_line(&line) {
                    tracing::warn!(%error, "skipping a flow, failed to write to spool file");
                }
            }
            Err(error) => {
                tracing::warn!(%error, "skipping a flow, failed to encode it as JSON");
            }
        }
    }

    /// Read spool files back into the pipeline. Each file is consumed
    /// completely and deleted before the next one; the low watermark is
    /// checked between files, the high watermark per line (emergency
    /// stop).
    async fn replay(&self, queue: &MemQueue) {
        let files = DiskUsage::scan(&self.buffer_dir).files;
        tracing::debug!(files = files.len(), "replaying spooled flows");

        for path in files {
            let file = match File::open(&path) {
                Ok(file) => file,
                Err(error) => {
                    tracing::warn!(%error, file = %path.display(), "could not open spool file");
                    continue;
                }
            };
            let decoder = match zstd::stream::read::Decoder::new(file) {
                Ok(decoder) => decoder,
                Err(error) => {
                    tracing::warn!(%error, file = %path.display(), "could not decode spool file");
                    continue;
                }
            };

            let mut lines = BufReader::new(decoder).lines();
            let mut emergency = false;
            while let Some(line) = lines.next() {
                let line = match line {
                    Ok(line) => line,
                    Err(error) => {
                        tracing::warn!(%error, "skipping a flow, could not read spool line");
                        continue;
                    }
                };
                if line.is_empty() {
                    continue;
                }

                if queue.fill_percent() > self.high_mark {
                    tracing::warn!(
                        "queue crossed the high watermark during replay, emergency stop"
                    );
                    self.persist_rest(line, &mut lines);
                    emergency = true;
                    break;
                }

                match decode_line(&line) {
                    Ok(flow) => {
                        // back through the queue, so the output pump
                        // interleaves replayed and live flows
                        queue.push(Box::new(flow)).await;
                    }
                    Err(error) => {
                        tracing::warn!(%error, "skipping a flow, spool line does not decode");
                    }
                }
            }

            if let Err(error) = std::fs::remove_file(&path) {
                tracing::warn!(%error, file = %path.display(), "could not remove spool file");
            }
            if emergency || queue.fill_percent() > self.low_mark {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    /// Emergency stop: persist the current line and everything unread
    /// in the current file into a `rest_` spool segment.
    fn persist_rest(
        &self,
        first_line: String,
        lines: &mut std::io::Lines<BufReader<zstd::stream::read::Decoder<'static, BufReader<File>>>>,
    ) {
        let mut file = match SpoolFile::create(&self.buffer_dir, "rest_") {
            Ok(file) => file,
            Err(error) => {
                tracing::error!(%error, "cannot create rest file, in-flight flows are lost");
                return;
            }
        };
        if let Err(error) = file.write_line(&first_line) {
            tracing::warn!(%error, "failed to write to rest file");
        }
        let mut count = 1u64;
        for line in lines {
            match line {
                Ok(line) if !line.is_empty() => {
                    if let Err(error) = file.write_line(&line) {
                        tracing::warn!(%error, "failed to write to rest file");
                    }
                    count += 1;
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(%error, "could not read spool line into rest file");
                }
            }
        }
        let path = file.finish();
        tracing::info!(file = %path.display(), count, "in-flight replay lines persisted");
    }
}

/// Aggregate spool directory state.
struct DiskUsage {
    files: Vec<PathBuf>,
    total_bytes: u64,
}

impl DiskUsage {
    fn scan(dir: &Path) -> Self {
        let mut files = Vec::new();
        let mut total_bytes = 0u64;
        match std::fs::read_dir(dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    let is_spool = path
                        .file_name()
                        .and_then(|name| name.to_str())
                        .is_some_and(|name| name.ends_with(SPOOL_SUFFIX));
                    if !is_spool {
                        continue;
                    }
                    if let Ok(metadata) = entry.metadata() {
                        total_bytes += metadata.len();
                    }
                    files.push(path);
                }
            }
            Err(error) => {
                tracing::warn!(%error, dir = %dir.display(), "cannot scan spool directory");
            }
        }
        files.sort();
        Self { files, total_bytes }
    }

    fn has_files(&self) -> bool {
        !self.files.is_empty()
    }
}

pub struct DiskBufferFactory;

impl SegmentFactory for DiskBufferFactory {
    fn create(&self, config: &SegmentConfig, args: &[String]) -> Result<Box<dyn Segment>> {
        let opts = config.expanded(args);
        let segment = self.name();

        let buffer_dir = PathBuf::from(required(&opts, "bufferdir", segment)?);
        if !buffer_dir.is_dir() {
            return Err(PipelineError::construction(
                segment,
                format!("bufferdir '{}' must be a directory", buffer_dir.display()),
            ));
        }
        // probe writability up front; a spool failure at runtime would
        // silently disable the overflow behavior
        let probe = buffer_dir.join(format!(".probe_{}", Uuid::new_v4()));
        File::create(&probe)
            .and_then(|_| std::fs::remove_file(&probe))
            .map_err(|error| {
                PipelineError::construction(
                    segment,
                    format!("bufferdir '{}' must be writable: {error}", buffer_dir.display()),
                )
            })?;

        let mut queue_size = optional_parsed(&opts, "queuesize", DEFAULT_QUEUE_SIZE, segment);
        if queue_size < MIN_QUEUE_SIZE {
            tracing::warn!(
                segment,
                queue_size,
                default = DEFAULT_QUEUE_SIZE,
                "queuesize too small, using default"
            );
            queue_size = DEFAULT_QUEUE_SIZE;
        }

        let high_mark = optional_parsed(&opts, "highmemorymark", DEFAULT_HIGH_MARK, segment);
        if !(10..=95).contains(&high_mark) {
            return Err(PipelineError::construction(
                segment,
                "highmemorymark must be between 10 and 95",
            ));
        }
        let low_mark = optional_parsed(&opts, "lowmemorymark", DEFAULT_LOW_MARK, segment);
        if !(5..=70).contains(&low_mark) {
            return Err(PipelineError::construction(
                segment,
                "lowmemorymark must be between 5 and 70",
            ));
        }
        let reading_mark =
            optional_parsed(&opts, "readingmemorymark", DEFAULT_READING_MARK, segment);
        if !(1..=50).contains(&reading_mark) {
            return Err(PipelineError::construction(
                segment,
                "readingmemorymark must be between 1 and 50",
            ));
        }
        if low_mark >= high_mark {
            return Err(PipelineError::construction(
                segment,
                "highmemorymark must be greater than lowmemorymark",
            ));
        }
        if reading_mark >= low_mark {
            return Err(PipelineError::construction(
                segment,
                "lowmemorymark must be greater than readingmemorymark",
            ));
        }

        let file_size = parse_size(&opts, "filesize", DEFAULT_FILE_SIZE, segment);
        let max_cache_size = parse_size(&opts, "maxcachesize", DEFAULT_MAX_CACHE_SIZE, segment);

        let mut batch_size = optional_parsed(&opts, "batchsize", DEFAULT_BATCH_SIZE, segment);
        if batch_size == 0 {
            batch_size = DEFAULT_BATCH_SIZE;
        }

        let status_secs: u64 = optional_parsed(&opts, "queuestatusinterval", 0, segment);
        let queue_status_interval = (status_secs > 0).then(|| Duration::from_secs(status_secs));

        Ok(Box::new(DiskBuffer {
            buffer_dir,
            queue_size,
            batch_size,
            file_size,
            max_cache_size,
            high_mark,
            low_mark,
            reading_mark,
            queue_status_interval,
        }))
    }

    fn name(&self) -> &'static str {
        "diskbuffer"
    }
}

fn parse_size(
    opts: &std::collections::BTreeMap<String, String>,
    key: &str,
    default: u64,
    segment: &str,
) -> u64 {
    match opts.get(key) {
        Some(value) if !value.is_empty() => match value.parse::<ByteSize>() {
            Ok(size) => size.as_u64(),
            Err(_) => {
                tracing::warn!(segment, option = key, value = %value, "could not parse size, using default");
                default
            }
        },
        _ => default,
    }
}
