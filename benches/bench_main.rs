use std::hint::black_box;

use bevy_dream_tree::foliage::{FoliageConfig, FoliageGenerator};
use bevy_dream_tree::layout::LayoutGenerator;
use bevy_dream_tree::ornaments::{OrnamentConfig, OrnamentGenerator};
use bevy_dream_tree::transform::{FrameTick, InstanceBuffer, MotionProfile};
use criterion::{Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn bench_foliage_layout(c: &mut Criterion) {
    let generator = FoliageGenerator::new(FoliageConfig::default());
    c.bench_function("foliage_layout_4000", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| generator.generate(black_box(4000), &mut rng))
    });
}

fn bench_ornament_layout(c: &mut Criterion) {
    let generator = OrnamentGenerator::new(OrnamentConfig::default());
    c.bench_function("ornament_layout_all", |b| {
        let mut rng = StdRng::seed_from_u64(2);
        b.iter(|| generator.generate_all(&mut rng))
    });
}

fn bench_foliage_frame(c: &mut Criterion) {
    let population =
        FoliageGenerator::new(FoliageConfig::default()).generate(4000, &mut StdRng::seed_from_u64(3));
    let motion = MotionProfile::foliage();
    let mut buffer = InstanceBuffer::with_capacity(population.len());
    let mut frame = 0u32;
    c.bench_function("foliage_frame_4000", |b| {
        b.iter(|| {
            frame = frame.wrapping_add(1);
            let tick = FrameTick::new(1.0 / 60.0, frame as f32 / 60.0, 0.5);
            buffer.write_morph(&population, &motion, black_box(&tick));
        })
    });
}

criterion_group!(
    benches,
    bench_foliage_layout,
    bench_ornament_layout,
    bench_foliage_frame
);
criterion_main!(benches);
