//! Tests for the diskbuffer segment

use super::*;
use flowline_flow::Flow;

fn flow(sequence_num: u32) -> Flow {
    Flow {
        sequence_num,
        bytes: 100,
        ..Default::default()
    }
}

fn buffer(dir: &Path, queue_size: usize) -> DiskBuffer {
    DiskBuffer {
        buffer_dir: dir.to_path_buf(),
        queue_size,
        batch_size: DEFAULT_BATCH_SIZE,
        file_size: DEFAULT_FILE_SIZE,
        max_cache_size: DEFAULT_MAX_CACHE_SIZE,
        high_mark: DEFAULT_HIGH_MARK,
        low_mark: DEFAULT_LOW_MARK,
        reading_mark: DEFAULT_READING_MARK,
        queue_status_interval: None,
    }
}

fn spool_files(dir: &Path) -> Vec<PathBuf> {
    DiskUsage::scan(dir).files
}

#[test]
fn test_factory_requires_writable_bufferdir() {
    assert!(DiskBufferFactory
        .create(&SegmentConfig::default(), &[])
        .is_err());
    assert!(DiskBufferFactory
        .create(
            &SegmentConfig::from_pairs([("bufferdir", "/no/such/directory")]),
            &[]
        )
        .is_err());

    let dir = tempfile::tempdir().unwrap();
    assert!(DiskBufferFactory
        .create(
            &SegmentConfig::from_pairs([("bufferdir", dir.path().to_str().unwrap())]),
            &[]
        )
        .is_ok());
}

#[test]
fn test_factory_validates_watermark_ordering() {
    let dir = tempfile::tempdir().unwrap();
    let base = |pairs: &[(&str, &str)]| {
        let mut all = vec![("bufferdir", dir.path().to_str().unwrap().to_string())];
        all.extend(pairs.iter().map(|(k, v)| (*k, v.to_string())));
        SegmentConfig::from_pairs(all)
    };

    // low above high
    assert!(DiskBufferFactory
        .create(&base(&[("highmemorymark", "40"), ("lowmemorymark", "60")]), &[])
        .is_err());
    // reading above low
    assert!(DiskBufferFactory
        .create(&base(&[("readingmemorymark", "40")]), &[])
        .is_err());
    // out of range
    assert!(DiskBufferFactory
        .create(&base(&[("highmemorymark", "99")]), &[])
        .is_err());
    // valid ordering passes
    assert!(DiskBufferFactory
        .create(
            &base(&[
                ("readingmemorymark", "5"),
                ("lowmemorymark", "30"),
                ("highmemorymark", "70"),
            ]),
            &[]
        )
        .is_ok());
}

#[test]
fn test_factory_enforces_minimum_queue_size() {
    let dir = tempfile::tempdir().unwrap();
    let config = SegmentConfig::from_pairs([
        ("bufferdir", dir.path().to_str().unwrap()),
        ("queuesize", "8"),
    ]);
    // warns and falls back rather than failing
    assert!(DiskBufferFactory.create(&config, &[]).is_ok());
}

#[tokio::test]
async fn test_spool_then_replay_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut segment = buffer(dir.path(), 64);
    segment.low_mark = 5; // spool runs until the queue is almost empty

    let queue = MemQueue::new(64);
    for i in 0..10 {
        queue.push(Box::new(flow(i))).await;
    }

    segment.spool(&queue).await;
    assert_eq!(queue.len(), 0);
    let files = spool_files(dir.path());
    assert_eq!(files.len(), 1);

    segment.replay(&queue).await;
    assert!(spool_files(dir.path()).is_empty(), "replayed file deleted");

    let mut sequence = Vec::new();
    while let Some(flow) = queue.try_pop() {
        sequence.push(flow.sequence_num);
    }
    assert_eq!(sequence, (0..10).collect::<Vec<u32>>());
}

#[tokio::test]
async fn test_replay_skips_garbage_lines() {
    let dir = tempfile::tempdir().unwrap();
    let segment = buffer(dir.path(), 64);

    let mut file = SpoolFile::create(dir.path(), "").unwrap();
    file.write_line(&encode_line(&flow(1)).unwrap()).unwrap();
    file.write_line("certainly not a flow").unwrap();
    file.write_line(&encode_line(&flow(2)).unwrap()).unwrap();
    file.finish();

    let queue = MemQueue::new(64);
    segment.replay(&queue).await;

    assert_eq!(queue.len(), 2);
    assert!(spool_files(dir.path()).is_empty());
}

/// The spec's handoff scenario: flows injected well above the
/// downstream rate must all arrive, and a clean shutdown leaves no
/// spool files behind.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_burst_handoff_conserves_flows() {
    let dir = tempfile::tempdir().unwrap();
    let segment: Box<dyn Segment> = Box::new(DiskBuffer {
        buffer_dir: dir.path().to_path_buf(),
        queue_size: 100,
        batch_size: 16,
        file_size: DEFAULT_FILE_SIZE,
        max_cache_size: DEFAULT_MAX_CACHE_SIZE,
        high_mark: 70,
        low_mark: 30,
        reading_mark: 5,
        queue_status_interval: None,
    });

    let (in_tx, in_rx) = flow_channel(4);
    let (out_tx, out_rx) = flow_channel(1);
    let task = tokio::spawn(segment.run(
        SegmentIo {
            rx: in_rx,
            tx: out_tx,
            drops: None,
        },
        ShutdownHandle::default(),
    ));

    const COUNT: u32 = 200;
    let consumer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Ok(flow) = out_rx.recv().await {
            seen.push(flow.sequence_num);
            // downstream is deliberately slower than the producer
            tokio::time::sleep(Duration::from_millis(2)).await;
            if seen.len() == COUNT as usize {
                break;
            }
        }
        seen
    });

    // the producer stops, but the input stays open until the slow
    // consumer has drained memory and disk
    for i in 0..COUNT {
        in_tx.send(Box::new(flow(i))).await.unwrap();
    }

    let mut seen = tokio::time::timeout(Duration::from_secs(60), consumer)
        .await
        .expect("all flows arrive downstream in finite time")
        .unwrap();

    drop(in_tx);
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("segment terminates")
        .unwrap();

    seen.sort_unstable();
    assert_eq!(seen, (0..COUNT).collect::<Vec<u32>>());
    assert!(
        spool_files(dir.path()).is_empty(),
        "spool directory empty after clean drain"
    );
}

#[tokio::test]
async fn test_input_close_drains_queue_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let segment: Box<dyn Segment> = Box::new(buffer(dir.path(), 64));

    let (in_tx, in_rx) = flow_channel(16);
    // room for everything, so the conservation count is simple
    let (out_tx, out_rx) = flow_channel(32);
    let task = tokio::spawn(segment.run(
        SegmentIo {
            rx: in_rx,
            tx: out_tx,
            drops: None,
        },
        ShutdownHandle::default(),
    ));

    for i in 0..10 {
        in_tx.send(Box::new(flow(i))).await.unwrap();
    }
    drop(in_tx);
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("segment terminates")
        .unwrap();

    let mut delivered = 0;
    while let Ok(_flow) = out_rx.try_recv() {
        delivered += 1;
    }

    let mut spooled = 0;
    for path in spool_files(dir.path()) {
        let decoder = zstd::stream::read::Decoder::new(File::open(path).unwrap()).unwrap();
        spooled += BufReader::new(decoder).lines().count();
    }

    assert_eq!(delivered + spooled, 10, "no flow lost on input close");
}
