// Criterion benchmarks for proxyrpc-client
//
// Run benchmarks with:
//   cargo bench -p proxyrpc-client
//
// For detailed output with plots:
//   cargo bench -p proxyrpc-client -- --save-baseline main

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use futures_util::future::BoxFuture;
use proxyrpc_client::{
    contract, get_proxy, Backoff, Channel, ChannelCreationError, ChannelHandle, Connector,
    Contract, Fault, OperationDescriptor, ProviderKind, ProxyCache, ProxyConfig,
};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Runtime;

contract! {
    pub contract Echo {
        client EchoClient;
        blocking EchoBlockingClient;

        fn echo(message: String) -> String;
        fn sum(values: Vec<i64>) -> i64;
    }
}

/// Answers with the first argument; every `fail_every`-th call faults instead.
struct LoopbackChannel {
    calls: AtomicU64,
    fail_every: u64,
}

impl Channel for LoopbackChannel {
    fn invoke<'a>(
        &'a self,
        _operation: &'a OperationDescriptor,
        args: &'a [Value],
    ) -> BoxFuture<'a, Result<Value, Fault>> {
        Box::pin(async move {
            let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
            if self.fail_every > 0 && n % self.fail_every == 0 {
                return Err(Fault::Transport("injected".into()));
            }
            Ok(args.first().cloned().unwrap_or(Value::Null))
        })
    }
}

#[derive(Clone)]
struct LoopbackConnector {
    fail_every: u64,
}

impl Connector for LoopbackConnector {
    fn connect(&self) -> BoxFuture<'_, Result<ChannelHandle, ChannelCreationError>> {
        Box::pin(async move {
            Ok(Arc::new(LoopbackChannel {
                calls: AtomicU64::new(0),
                fail_every: self.fail_every,
            }) as ChannelHandle)
        })
    }
}

fn config() -> ProxyConfig {
    ProxyConfig::default()
        .with_max_attempts(3)
        .with_backoff(Backoff::None)
}

fn bench_proxy_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("proxy_lookup");

    let cache = ProxyCache::new();
    let descriptor = Echo::descriptor().unwrap();
    let kind = ProviderKind::of::<LoopbackConnector>();
    cache.get_or_generate(&descriptor, kind).unwrap();

    group.bench_function("cache_hit", |b| {
        b.iter(|| cache.get_or_generate(black_box(&descriptor), kind));
    });

    group.bench_function("get_proxy", |b| {
        b.iter(|| get_proxy::<Echo, _>(LoopbackConnector { fail_every: 0 }, config()));
    });

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    let runtime = Runtime::new().unwrap();

    let healthy = get_proxy::<Echo, _>(LoopbackConnector { fail_every: 0 }, config()).unwrap();
    group.bench_function("echo", |b| {
        b.to_async(&runtime)
            .iter(|| async { healthy.echo(black_box("hello".to_string())).await });
    });

    let values: Vec<i64> = (0..256).collect();
    group.bench_function("sum_256", |b| {
        b.to_async(&runtime)
            .iter(|| async { healthy.proxy().dispatch("sum", vec![Value::from(values.clone())]).await });
    });

    // The second call on each channel faults and forces a recreation
    let flaky = get_proxy::<Echo, _>(LoopbackConnector { fail_every: 2 }, config()).unwrap();
    group.bench_function("echo_with_retry", |b| {
        b.to_async(&runtime)
            .iter(|| async { flaky.echo(black_box("hello".to_string())).await });
    });

    group.finish();
}

criterion_group!(benches, bench_proxy_lookup, bench_dispatch);
criterion_main!(benches);
