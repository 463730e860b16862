use chrono::{NaiveDate, Utc};
use common::{ItemCategory, ItemId, Role, UserId};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use domain::{Caller, Count, CountService, LineInput, NewCount, NewLine, Review, Tally};
use store::{InMemoryStore, InventoryStore, ItemRecord};

fn item(name: String, created_by: UserId) -> ItemRecord {
    let now = Utc::now();
    ItemRecord {
        id: ItemId::new(),
        name,
        description: None,
        category: ItemCategory::Other,
        unit_of_measure: "units".to_string(),
        par_level: 10,
        current_quantity: 5,
        created_by,
        created_at: now,
        updated_at: now,
    }
}

fn bench_tally(c: &mut Criterion) {
    c.bench_function("domain/tally_significance", |b| {
        b.iter(|| {
            let mut significant = 0;
            for expected in 0..100 {
                let tally = Tally::new(expected, 50).unwrap();
                if tally.has_significant_discrepancy() {
                    significant += 1;
                }
            }
            significant
        });
    });
}

fn bench_add_lines(c: &mut Criterion) {
    let mut group = c.benchmark_group("domain/add_lines");

    for size in [10, 100, 500] {
        let inputs: Vec<LineInput> = (0..size)
            .map(|i| LineInput {
                item_id: ItemId::new(),
                expected_quantity: i,
                actual_quantity: i + 1,
                notes: None,
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &inputs, |b, inputs| {
            b.iter(|| {
                let mut count = Count::open(
                    UserId::new(),
                    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                    None,
                );
                count.add_lines(inputs.clone(), Utc::now()).unwrap();
                count
            });
        });
    }

    group.finish();
}

fn bench_full_lifecycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/create_add_submit_approve", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryStore::new();
                let staff = Caller::new(UserId::new(), Role::Staff);
                let manager = Caller::new(UserId::new(), Role::Manager);

                let mut lines = Vec::new();
                for i in 0..20 {
                    let record = item(format!("Item {i}"), manager.user_id);
                    lines.push(NewLine {
                        item_id: record.id,
                        actual_quantity: i,
                        notes: None,
                    });
                    store.insert_item(record).await.unwrap();
                }

                let service = CountService::new(store);
                let count = service.create(&staff, NewCount::default()).await.unwrap();
                service.add_lines(&staff, count.id(), lines).await.unwrap();
                service.submit(&staff, count.id(), None).await.unwrap();
                service
                    .review(&manager, count.id(), Review::approve())
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_tally, bench_add_lines, bench_full_lifecycle);
criterion_main!(benches);
