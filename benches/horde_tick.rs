//! Host simulation benchmarks
//!
//! Measures one director tick and the snapshot path at growing horde sizes.
//!
//! Run with: cargo bench --bench horde_tick

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use horde_coop_server::game::ai::TargetView;
use horde_coop_server::game::constants::net::SCHEDULER_DT;
use horde_coop_server::game::enemy::EnemyKind;
use horde_coop_server::game::ports::{NpcAttack, PlayerDamageSink, Target};
use horde_coop_server::game::HordeDirector;
use horde_coop_server::metrics::Metrics;
use horde_coop_server::net::protocol::{encode, ClientMessage, RoomState};
use horde_coop_server::relay::Relay;
use horde_coop_server::util::vec2::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

struct DiscardAttacks;

impl PlayerDamageSink for DiscardAttacks {
    fn on_attack(&mut self, attack: NpcAttack) {
        black_box(attack);
    }
}

/// A running director with `extra` enemies on top of the initial horde
fn director_with(extra: usize) -> HordeDirector {
    let mut director = HordeDirector::new(Box::new(DiscardAttacks), StdRng::seed_from_u64(1));
    director.start(&RoomState::default(), &[]);
    let mut rng = StdRng::seed_from_u64(2);
    for _ in 0..extra {
        director.spawn_enemy(EnemyKind::roll(150, &mut rng));
    }
    director
}

/// Players spread around the arena, outside the safe zone
fn targets(count: usize) -> Vec<TargetView> {
    let mut rng = StdRng::seed_from_u64(3);
    (0..count)
        .map(|_| {
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let radius = rng.gen_range(10.0..60.0);
            TargetView {
                target: Target::Remote(Uuid::new_v4()),
                position: Vec2::from_angle(angle) * radius,
            }
        })
        .collect()
}

fn bench_director_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("director_tick");
    group.sample_size(50);

    for count in [8usize, 32, 128, 512] {
        let players = targets(4);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut director = director_with(count.saturating_sub(8));
            b.iter(|| {
                director.tick(black_box(SCHEDULER_DT), &players);
                black_box(director.drain_events());
            });
        });
    }

    group.finish();
}

fn bench_snapshot_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_encode");
    group.sample_size(50);

    for count in [8usize, 32, 128, 512] {
        let director = director_with(count.saturating_sub(8));
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let msg = ClientMessage::NpcStateSync(director.registry().snapshot());
                black_box(encode(&msg))
            });
        });
    }

    group.finish();
}

fn bench_relay_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("relay_fanout");
    group.sample_size(50);

    for peers in [2usize, 4, 8, 16] {
        let mut relay = Relay::new(Arc::new(Metrics::new()));
        let ids: Vec<_> = (0..peers).map(|_| relay.connect().0).collect();
        let host = ids[0];
        let snapshot = director_with(24).registry().snapshot();

        group.throughput(Throughput::Elements(peers as u64));
        group.bench_with_input(BenchmarkId::from_parameter(peers), &peers, |b, _| {
            b.iter(|| {
                let fx = relay.on_message(host, ClientMessage::NpcStateSync(snapshot.clone()));
                black_box(fx.sends.len())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_director_tick,
    bench_snapshot_encode,
    bench_relay_fanout
);
criterion_main!(benches);
