//! `ordering_contract` 集成测试：验证乱序、并发写入最终以分片序号顺序交付。
//!
//! # 测试目标（Why）
//! - 分片完成顺序随机时，读取方拼接出的字节必须与按序拼接的原始数据完全一致；
//! - 尾块不足一个分片时，关闭操作必须把它完整冲刷出去；
//! - 序号存在缺口时，保持“截断后正常结束”的既定行为，不擅自修复。
//!
//! # 结构安排（How）
//! - 每个测试通过公开 API 构造读写两端，生产者运行在独立线程，主线程充当唯一消费者。

use std::{
    io::{BufRead, Read},
    thread,
    time::Duration,
};

use spark_reassembly::{ReassemblyConfig, ReassemblyError, WriteAt, channel};

/// 生成可辨识的测试负载。
fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// 每个分片一个线程并发写入，`delay` 决定各线程的启动延迟。
fn write_chunks_concurrently<W>(writer: &W, src: &[u8], part_size: usize, delay: impl Fn(usize) -> u64)
where
    W: WriteAt + Sync,
{
    thread::scope(|scope| {
        for (index, chunk) in src.chunks(part_size).enumerate() {
            let wait = delay(index);
            scope.spawn(move || {
                thread::sleep(Duration::from_millis(wait));
                let written = writer
                    .write_at(chunk, (index * part_size) as u64)
                    .expect("并发写入不应失败");
                assert_eq!(written, chunk.len());
            });
        }
    });
}

/// 三个 10 字节分片以任意线程顺序写入，读取结果按序拼接。
#[test]
fn three_chunks_in_arbitrary_thread_order() {
    let config = ReassemblyConfig::default()
        .with_part_size(10)
        .with_concurrency(4);
    let (writer, mut reader) = channel(config).expect("配置合法");

    let producer = thread::spawn(move || {
        let src = b"AAAAAAAAAABBBBBBBBBBCCCCCCCCCC";
        write_chunks_concurrently(&writer, src, 10, |index| (2 - index as u64) * 20);
        writer.close().expect("关闭");
    });

    let mut out = String::new();
    reader.read_to_string(&mut out).expect("读取");
    producer.join().expect("生产者线程不应 panic");
    assert_eq!(out, "AAAAAAAAAABBBBBBBBBBCCCCCCCCCC");
}

/// 第 0 个分片最后到达时，其余分片必须等待，最终顺序不变。
///
/// # 契约校验（What）
/// - 20 个分片、默认并发度（就绪队列容量 10），首个分片延迟 100ms；
/// - 读取结果等于原始数据的前 `20 * part_size` 字节。
#[test]
fn slow_first_chunk_does_not_reorder_stream() {
    let src = payload(4_000);
    let chunks = 20;
    let part_size = src.len() / chunks;
    let expected = src[..chunks * part_size].to_vec();

    let config = ReassemblyConfig::default().with_part_size(part_size as u64);
    let (writer, mut reader) = channel(config).expect("配置合法");

    let producer = {
        let src = expected.clone();
        thread::spawn(move || {
            write_chunks_concurrently(&writer, &src, part_size, |index| {
                if index == 0 { 100 } else { 0 }
            });
            writer.close().expect("关闭");
        })
    };

    let mut actual = Vec::new();
    reader.read_to_end(&mut actual).expect("读取");
    producer.join().expect("生产者线程不应 panic");
    assert_eq!(actual, expected);
    let stats = reader.stats();
    assert_eq!(stats.promoted_chunks, chunks as u64);
    assert_eq!(stats.bytes_read, actual.len() as u64);
}

/// 尾块不足一个分片时，关闭后仍被完整交付。
#[test]
fn short_final_chunk_is_flushed_on_close() {
    let src = payload(47);
    let config = ReassemblyConfig::default()
        .with_part_size(10)
        .with_concurrency(3);
    let (writer, mut reader) = channel(config).expect("配置合法");

    let producer = {
        let src = src.clone();
        thread::spawn(move || {
            write_chunks_concurrently(&writer, &src, 10, |index| (index as u64 % 3) * 5);
            writer.close().expect("关闭");
        })
    };

    let mut out = Vec::new();
    reader.read_to_end(&mut out).expect("读取");
    producer.join().expect("生产者线程不应 panic");
    assert_eq!(out, src);
}

/// 分片 2 缺失：读取方只收到分片 0 与 1，然后正常结束。
#[test]
fn missing_chunk_truncates_stream_at_gap() {
    let config = ReassemblyConfig::default()
        .with_part_size(4)
        .with_concurrency(4);
    let (writer, mut reader) = channel(config).expect("配置合法");
    writer.write_at(b"0000", 0).expect("写入分片 0");
    writer.write_at(b"1111", 4).expect("写入分片 1");
    writer.write_at(b"3333", 12).expect("写入分片 3");
    writer.close().expect("缺口不会让关闭失败");

    let mut out = Vec::new();
    reader.read_to_end(&mut out).expect("缺口截断后以 EOF 结束");
    assert_eq!(out, b"00001111");
    let stats = reader.stats();
    assert_eq!(stats.stranded_chunks, 1);
    assert_eq!(stats.promoted_chunks, 2);
}

/// 同一分片分多次追加写入时，按到达顺序拼接。
#[test]
fn appends_within_a_chunk_keep_arrival_order() {
    let config = ReassemblyConfig::default()
        .with_part_size(6)
        .with_concurrency(2);
    let (writer, mut reader) = channel(config).expect("配置合法");
    writer.write_at(b"def", 6).expect("分片 1 前半");
    writer.write_at(b"abc", 0).expect("分片 0 前半");
    writer.write_at(b"ghi", 9).expect("分片 1 后半");
    writer.write_at(b"123", 3).expect("分片 0 后半");
    writer.close().expect("关闭");

    let mut out = String::new();
    reader.read_to_string(&mut out).expect("读取");
    assert_eq!(out, "abc123defghi");
}

/// 读取端可作为 `BufRead` 使用，行可以跨越分片边界。
#[test]
fn buf_read_lines_span_chunk_boundaries() {
    let text = "alpha\nbravo charlie\ndelta\n";
    let config = ReassemblyConfig::default()
        .with_part_size(4)
        .with_concurrency(8);
    let (writer, reader) = channel(config).expect("配置合法");

    let producer = thread::spawn(move || {
        write_chunks_concurrently(&writer, text.as_bytes(), 4, |index| (index as u64 % 4) * 3);
        writer.close().expect("关闭");
    });

    let lines: Vec<String> = reader
        .lines()
        .collect::<Result<_, _>>()
        .expect("按行读取");
    producer.join().expect("生产者线程不应 panic");
    assert_eq!(lines, vec!["alpha", "bravo charlie", "delta"]);
}

/// 已交付给读取方的分片不可再写。
#[test]
fn late_write_to_promoted_chunk_is_rejected() {
    let config = ReassemblyConfig::default()
        .with_part_size(2)
        .with_concurrency(2);
    let (writer, _reader) = channel(config).expect("配置合法");
    writer.write_at(b"ok", 0).expect("写入分片 0");
    let err = writer
        .write_at(b"!", 1)
        .expect_err("分片 0 已晋升");
    assert!(matches!(
        err,
        ReassemblyError::ChunkAlreadyPromoted { chunk: 0, cursor: 1 }
    ));
    writer.write_at(b"go", 2).expect("其它分片不受影响");
}

/// 通过 `WriteAt` 抽象写入时错误以 `io::Error` 形式返回。
#[test]
fn write_at_trait_maps_errors_to_io() {
    let (writer, _reader) = channel(ReassemblyConfig::default().with_part_size(2)).expect("配置合法");
    writer.close().expect("关闭");
    let err = WriteAt::write_at(&writer, b"xx", 0).expect_err("关闭后不可写");
    assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
}
