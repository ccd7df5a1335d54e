use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use stagegrid_core::{
    AttackPayload, Battle, Cell, Element, EntityId, EntitySpec, StageDefinition, StatusEffectKind,
    Team, Traits,
};

fn fighter(team: Team) -> EntitySpec {
    EntitySpec::new(team, 10_000).with_traits(Traits::GROUNDED | Traits::STUNNABLE)
}

/// A wide stage with one row of enemies facing one row of players.
fn crowded_battle() -> (Battle, Vec<EntityId>) {
    let mut battle = Battle::from_stage(&StageDefinition::rectangle(16, 6, 8));
    let mut enemies = Vec::new();
    for y in 0..6 {
        battle
            .spawn(&fighter(Team::Player), Cell::new(2, y))
            .expect("player spawn");
        enemies.push(
            battle
                .spawn(&fighter(Team::Enemy), Cell::new(12, y))
                .expect("enemy spawn"),
        );
    }
    battle.take_events();
    (battle, enemies)
}

fn bench_resolve_attack(c: &mut Criterion) {
    let payload = AttackPayload::new(25)
        .with_element(Element::Fire)
        .with_status(StatusEffectKind::Bleeding);

    c.bench_function("resolve_attack", |b| {
        b.iter_batched(
            crowded_battle,
            |(mut battle, enemies)| {
                for &enemy in &enemies {
                    battle.mark_for_death(enemy);
                    black_box(battle.resolve_attack(enemy, &payload));
                }
                battle
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_tick_with_statuses(c: &mut Criterion) {
    let (mut battle, enemies) = crowded_battle();
    for &enemy in &enemies {
        battle.apply_status(enemy, StatusEffectKind::Burning);
        battle.apply_damage_over_time(enemy, stagegrid_core::DamageOverTime::new(1, 0.05, 1.0e6));
    }

    c.bench_function("tick_with_statuses", |b| {
        b.iter(|| {
            battle.step();
            black_box(battle.take_events());
        });
    });
}

fn bench_move_and_land(c: &mut Criterion) {
    c.bench_function("move_and_land", |b| {
        b.iter_batched(
            crowded_battle,
            |(mut battle, enemies)| {
                for &enemy in &enemies {
                    let _ = battle.move_by(enemy, 1, 0);
                }
                battle.tick(black_box(0.1));
                battle
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_resolve_attack, bench_tick_with_statuses, bench_move_and_land);
criterion_main!(benches);
