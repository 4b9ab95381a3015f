use criterion::{criterion_group, criterion_main, Criterion};
use rawserial::{MockSerialPort, SerialPort};
use std::hint::black_box;
use std::time::Duration;

pub fn bench_mock_write(c: &mut Criterion) {
    let port = MockSerialPort::new("bench0");
    let frame = vec![0xA5u8; 256];
    c.bench_function("mock_write_256", |b| {
        b.iter(|| {
            let n = port.write_bytes(black_box(&frame)).unwrap();
            port.clear_write_log();
            black_box(n);
        })
    });
}

pub fn bench_mock_read(c: &mut Criterion) {
    let port = MockSerialPort::new("bench0");
    let mut buf = [0u8; 256];
    c.bench_function("mock_read_256", |b| {
        b.iter(|| {
            port.enqueue_read(&[0x5Au8; 256]);
            let n = port.read_bytes(black_box(&mut buf)).unwrap();
            black_box(n);
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(300))
        .measurement_time(Duration::from_secs(2));
    targets = bench_mock_write, bench_mock_read
}
criterion_main!(benches);
