#[cfg(test)]
mod tests {
    use std::sync::{mpsc, Arc, RwLock};
    use std::thread;

    use rusty_tsbuf::{
        gorilla::{read_gorilla_int, write_gorilla_int},
        read_checkpoint, write_checkpoint, BatchMergeDecoder, BitCursorWriter, BufferConfig,
        Result, SeriesSnapshot, TimeDiffBuffer, TimeSeries, TsBufError, XorBuffer,
    };

    #[test]
    fn test_concrete_scenario() {
        let mut timestamps = TimeDiffBuffer::with_capacity(64);
        let mut values = XorBuffer::with_capacity(64);
        for (timestamp, value) in [(1000, 1.0), (1010, 1.0), (1021, 2.0), (1030, 2.0)] {
            timestamps.push(timestamp).unwrap();
            values.push(value).unwrap();
        }

        let residuals = timestamps
            .residuals()
            .snapshot()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(residuals, vec![1, -2]);
        assert!(values.writer().written_bits() < 4 * 32);

        let decoder =
            BatchMergeDecoder::new([timestamps.snapshot()], [values.snapshot()]).unwrap();
        let samples = decoder.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(
            samples,
            vec![(1000, 1.0), (1010, 1.0), (1021, 2.0), (1030, 2.0)]
        );
    }

    #[test]
    fn test_jitter_rejection() {
        let mut timestamps = TimeDiffBuffer::with_capacity(64);
        timestamps.push(0).unwrap();
        timestamps.push(1).unwrap();
        assert!(matches!(
            timestamps.push(3_000_000_000),
            Err(TsBufError::JitterOutOfRange { .. })
        ));
        assert_eq!(timestamps.len(), 2);
    }

    #[test]
    fn test_gorilla_ints_through_public_api() {
        let mut writer = BitCursorWriter::with_capacity(16);
        for value in [0, 1, -256, 256, -2048] {
            write_gorilla_int(value, &mut writer).unwrap();
        }
        // 1 + 9 + 12 + 16 + 16 bits
        assert_eq!(writer.written_bits(), 54);

        let mut reader = writer.snapshot().reader();
        for value in [0, 1, -256, 256, -2048] {
            assert_eq!(read_gorilla_int(&mut reader).unwrap(), value);
        }
    }

    #[test]
    fn test_capacity_boundary_keeps_prefix() {
        let mut values = XorBuffer::with_capacity(8);
        let mut pushed = Vec::new();
        let mut value = 1.0f32;
        loop {
            match values.push(value) {
                Ok(()) => pushed.push(value),
                Err(_) => break,
            }
            value += 0.37;
        }
        let before = values.snapshot().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(before, pushed);

        assert!(values.push(value).is_err());
        let after = values.snapshot().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(after, pushed);
    }

    #[test]
    fn test_snapshot_decoded_on_other_threads() {
        let mut series = TimeSeries::new("net.rx", BufferConfig::new(32, 32)).unwrap();
        let (sender, receiver) = mpsc::channel::<(usize, SeriesSnapshot)>();

        let reader = thread::spawn(move || {
            let mut checked = 0;
            for (count, snapshot) in receiver {
                let decoder = snapshot.into_decoder().unwrap();
                let samples = decoder.collect::<Result<Vec<(i64, f32)>>>().unwrap();
                assert_eq!(samples.len(), count);
                for (i, (timestamp, value)) in samples.into_iter().enumerate() {
                    assert_eq!(timestamp, 1_000 + i as i64 * 15);
                    assert_eq!(value, (i % 11) as f32);
                }
                checked += 1;
            }
            checked
        });

        for i in 0..500usize {
            series.put(1_000 + i as i64 * 15, (i % 11) as f32).unwrap();
            if i % 50 == 0 {
                sender.send((i + 1, series.snapshot())).unwrap();
            }
        }
        drop(sender);

        assert_eq!(reader.join().unwrap(), 10);
        assert!(series.value_buffers().len() > 1);
    }

    #[test]
    fn test_snapshots_taken_under_lock() {
        let series = Arc::new(RwLock::new(
            TimeSeries::new("cpu.user", BufferConfig::new(16, 16)).unwrap(),
        ));

        let reader = {
            let series = Arc::clone(&series);
            thread::spawn(move || {
                let mut last_len = 0;
                for _ in 0..50 {
                    // The lock is only held while freezing the buffers
                    let snapshot = series.read().unwrap().snapshot();
                    let samples = snapshot
                        .into_decoder()
                        .unwrap()
                        .collect::<Result<Vec<_>>>()
                        .unwrap();
                    assert!(samples.len() >= last_len);
                    for (i, (timestamp, value)) in samples.iter().enumerate() {
                        assert_eq!(*timestamp, i as i64 * 100);
                        assert_eq!(*value, i as f32);
                    }
                    last_len = samples.len();
                    thread::yield_now();
                }
            })
        };

        for i in 0..300i64 {
            series.write().unwrap().put(i * 100, i as f32).unwrap();
        }
        reader.join().unwrap();
        assert_eq!(series.read().unwrap().len(), 300);
    }

    #[test]
    fn test_many_readers_same_series() {
        let mut series = TimeSeries::new("disk.io", BufferConfig::default()).unwrap();
        for i in 0..1_000i64 {
            series.put(i * 1_000, (i as f32).sin()).unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let snapshot = series.snapshot();
                thread::spawn(move || {
                    snapshot
                        .into_decoder()
                        .unwrap()
                        .collect::<Result<Vec<_>>>()
                        .unwrap()
                })
            })
            .collect();

        // The writer keeps going while the readers decode
        for i in 1_000..2_000i64 {
            series.put(i * 1_000, (i as f32).sin()).unwrap();
        }

        for handle in handles {
            let samples = handle.join().unwrap();
            assert_eq!(samples.len(), 1_000);
            assert_eq!(samples[999], (999_000, (999f32).sin()));
        }
    }

    #[test]
    fn test_checkpoint_file_roundtrip() {
        let config = BufferConfig::new(128, 128);
        let mut all = Vec::new();
        for shard in 0..5i64 {
            let mut series = TimeSeries::new(format!("shard-{}", shard), config.clone()).unwrap();
            for i in 0..(shard * 40) {
                series.put(shard * 7 + i * 250, (shard * i) as f32 / 3.0).unwrap();
            }
            all.push(series);
        }

        let snapshots: Vec<_> = all.iter().map(TimeSeries::snapshot).collect();
        let mut buffer = Vec::new();
        write_checkpoint(&config, &snapshots, &mut buffer).unwrap();

        let checkpoint = read_checkpoint(&buffer).unwrap();
        assert_eq!(checkpoint.config, config);
        for (restored, original) in checkpoint.series.iter().zip(&all) {
            assert_eq!(restored.shard_id(), original.shard_id());
            let restored = restored
                .snapshot()
                .into_decoder()
                .unwrap()
                .collect::<Result<Vec<_>>>()
                .unwrap();
            let original = original
                .snapshot()
                .into_decoder()
                .unwrap()
                .collect::<Result<Vec<_>>>()
                .unwrap();
            assert_eq!(restored, original);
        }

        let truncated = &buffer[..buffer.len() - 1];
        assert!(read_checkpoint(truncated).is_err());
    }
}
