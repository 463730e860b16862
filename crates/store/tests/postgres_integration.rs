//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration
//! ```

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use common::{CountId, CountLineId, CountStatus, ItemCategory, ItemId, Role, UserId};
use serial_test::serial;
use sqlx::PgPool;
use store::{
    CountLineRecord, CountOrder, CountQuery, CountRecord, InventoryStore, ItemQuery, ItemRecord,
    PostgresStore, SaveOptions, StockChange, StoreError, UserRecord, Version,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("store=debug")
        .with_test_writer()
        .try_init();
}

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_inventory_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE count_items, counts, items, users")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

async fn seed_user(store: &PostgresStore, email: &str, role: Role) -> UserRecord {
    let now = Utc::now();
    let user = UserRecord {
        id: UserId::new(),
        email: email.to_string(),
        hashed_password: "hash".to_string(),
        full_name: "Test User".to_string(),
        role,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    store.insert_user(user.clone()).await.unwrap();
    user
}

async fn seed_item(store: &PostgresStore, name: &str, quantity: i32, owner: UserId) -> ItemRecord {
    let now = Utc::now();
    let item = ItemRecord {
        id: ItemId::new(),
        name: name.to_string(),
        description: Some("test item".to_string()),
        category: ItemCategory::Dairy,
        unit_of_measure: "liters".to_string(),
        par_level: 10,
        current_quantity: quantity,
        created_by: owner,
        created_at: now,
        updated_at: now,
    };
    store.insert_item(item.clone()).await.unwrap();
    item
}

fn draft(created_by: UserId, date: NaiveDate, lines: Vec<CountLineRecord>) -> CountRecord {
    let now = Utc::now();
    CountRecord {
        id: CountId::new(),
        count_date: date,
        status: CountStatus::Draft,
        created_by,
        submitted_at: None,
        reviewed_by: None,
        reviewed_at: None,
        rejection_reason: None,
        notes: None,
        created_at: now,
        updated_at: now,
        version: Version::initial(),
        lines,
    }
}

fn line(item_id: ItemId, expected: i32, actual: i32) -> CountLineRecord {
    let now = Utc::now();
    CountLineRecord {
        id: CountLineId::new(),
        item_id,
        expected_quantity: expected,
        actual_quantity: actual,
        discrepancy: actual - expected,
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

#[tokio::test]
#[serial]
async fn users_round_trip_and_unique_email() {
    let store = get_test_store().await;
    let user = seed_user(&store, "alice@example.com", Role::Manager).await;

    let found = store
        .find_user_by_email("ALICE@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, user.id);
    assert_eq!(found.role, Role::Manager);

    let mut duplicate = user.clone();
    duplicate.id = UserId::new();
    let err = store.insert_user(duplicate).await.unwrap_err();
    assert!(matches!(err, StoreError::UniqueViolation { field: "email", .. }));
}

#[tokio::test]
#[serial]
async fn referenced_user_cannot_be_deleted() {
    let store = get_test_store().await;
    let owner = seed_user(&store, "owner@example.com", Role::Manager).await;
    seed_item(&store, "Milk", 4, owner.id).await;

    let err = store.delete_user(owner.id).await.unwrap_err();
    assert!(matches!(err, StoreError::StillReferenced { .. }));
}

#[tokio::test]
#[serial]
async fn items_filter_by_category_and_low_stock() {
    let store = get_test_store().await;
    let owner = seed_user(&store, "owner@example.com", Role::Manager).await;
    seed_item(&store, "Butter", 3, owner.id).await;
    seed_item(&store, "Cream", 12, owner.id).await;

    let low = store.list_items(ItemQuery::low_stock()).await.unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].name, "Butter");

    let dairy = store
        .list_items(ItemQuery {
            category: Some(ItemCategory::Dairy),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(dairy.len(), 2);

    let produce = store
        .list_items(ItemQuery {
            category: Some(ItemCategory::Produce),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(produce.is_empty());
}

#[tokio::test]
#[serial]
async fn count_round_trip_with_lines() {
    let store = get_test_store().await;
    let staff = seed_user(&store, "staff@example.com", Role::Staff).await;
    let owner = seed_user(&store, "owner@example.com", Role::Manager).await;
    let milk = seed_item(&store, "Milk", 5, owner.id).await;

    let count = draft(staff.id, day(1), vec![line(milk.id, 5, 3)]);
    let id = count.id;
    let version = store.insert_count(count).await.unwrap();
    assert_eq!(version, Version::first());

    let stored = store.get_count(id).await.unwrap().unwrap();
    assert_eq!(stored.status, CountStatus::Draft);
    assert_eq!(stored.lines.len(), 1);
    assert_eq!(stored.lines[0].discrepancy, -2);
}

#[tokio::test]
#[serial]
async fn second_draft_for_same_day_conflicts() {
    let store = get_test_store().await;
    let staff = seed_user(&store, "staff@example.com", Role::Staff).await;

    store.insert_count(draft(staff.id, day(1), vec![])).await.unwrap();
    let err = store
        .insert_count(draft(staff.id, day(1), vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateDraft { .. }));
}

#[tokio::test]
#[serial]
async fn stale_version_is_rejected() {
    let store = get_test_store().await;
    let staff = seed_user(&store, "staff@example.com", Role::Staff).await;
    let count = draft(staff.id, day(1), vec![]);
    let id = count.id;
    store.insert_count(count).await.unwrap();

    let stored = store.get_count(id).await.unwrap().unwrap();
    store
        .save_count(
            stored.clone(),
            SaveOptions::expect_version(Version::first()),
            vec![],
        )
        .await
        .unwrap();

    let err = store
        .save_count(stored, SaveOptions::expect_version(Version::first()), vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ConcurrencyConflict { .. }));
}

#[tokio::test]
#[serial]
async fn approval_writes_stock_in_the_same_transaction() {
    let store = get_test_store().await;
    let staff = seed_user(&store, "staff@example.com", Role::Staff).await;
    let manager = seed_user(&store, "manager@example.com", Role::Manager).await;
    let milk = seed_item(&store, "Milk", 5, manager.id).await;

    let count = draft(staff.id, day(2), vec![line(milk.id, 5, 8)]);
    let id = count.id;
    store.insert_count(count).await.unwrap();

    let mut approved = store.get_count(id).await.unwrap().unwrap();
    approved.status = CountStatus::Approved;
    approved.reviewed_by = Some(manager.id);
    approved.reviewed_at = Some(Utc::now());

    let version = store
        .save_count(
            approved,
            SaveOptions::expect_version(Version::first()),
            vec![StockChange::Set {
                item_id: milk.id,
                quantity: 8,
            }],
        )
        .await
        .unwrap();
    assert_eq!(version, Version::new(2));

    let milk = store.get_item(milk.id).await.unwrap().unwrap();
    assert_eq!(milk.current_quantity, 8);
}

#[tokio::test]
#[serial]
async fn missing_item_rolls_back_approval() {
    let store = get_test_store().await;
    let staff = seed_user(&store, "staff@example.com", Role::Staff).await;
    let manager = seed_user(&store, "manager@example.com", Role::Manager).await;
    let milk = seed_item(&store, "Milk", 5, manager.id).await;
    let ghost = ItemId::new();

    let count = draft(
        staff.id,
        day(3),
        vec![line(milk.id, 5, 8), line(ghost, 1, 2)],
    );
    let id = count.id;
    store.insert_count(count).await.unwrap();

    let mut approved = store.get_count(id).await.unwrap().unwrap();
    approved.status = CountStatus::Approved;

    let err = store
        .save_count(
            approved,
            SaveOptions::expect_version(Version::first()),
            vec![
                StockChange::Set {
                    item_id: milk.id,
                    quantity: 8,
                },
                StockChange::Set {
                    item_id: ghost,
                    quantity: 2,
                },
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ItemNotFound(id) if id == ghost));

    let milk = store.get_item(milk.id).await.unwrap().unwrap();
    assert_eq!(milk.current_quantity, 5);
    let count = store.get_count(id).await.unwrap().unwrap();
    assert_eq!(count.status, CountStatus::Draft);
    assert_eq!(count.version, Version::first());
}

#[tokio::test]
#[serial]
async fn adjust_refuses_negative_stock() {
    let store = get_test_store().await;
    let owner = seed_user(&store, "owner@example.com", Role::Manager).await;
    let milk = seed_item(&store, "Milk", 2, owner.id).await;

    let err = store
        .apply_stock(vec![StockChange::Adjust {
            item_id: milk.id,
            delta: -5,
        }])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::QuantityOutOfRange { .. }));

    let updated = store
        .apply_stock(vec![StockChange::Adjust {
            item_id: milk.id,
            delta: 3,
        }])
        .await
        .unwrap();
    assert_eq!(updated[0].current_quantity, 5);
}

#[tokio::test]
#[serial]
async fn pending_counts_order_by_submission() {
    let store = get_test_store().await;
    let staff = seed_user(&store, "staff@example.com", Role::Staff).await;

    let mut ids = Vec::new();
    for d in 1..=3 {
        let count = draft(staff.id, day(d), vec![]);
        ids.push(count.id);
        store.insert_count(count).await.unwrap();
    }
    // Submit in reverse date order
    for id in ids.iter().rev() {
        let mut count = store.get_count(*id).await.unwrap().unwrap();
        count.status = CountStatus::Submitted;
        count.submitted_at = Some(Utc::now());
        store
            .save_count(count, SaveOptions::new(), vec![])
            .await
            .unwrap();
    }

    let pending = store
        .list_counts(CountQuery {
            status: Some(CountStatus::Submitted),
            order: CountOrder::SubmittedAtDesc,
            ..Default::default()
        })
        .await
        .unwrap();
    let order: Vec<_> = pending.iter().map(|c| c.id).collect();
    assert_eq!(order, ids);
}

#[tokio::test]
#[serial]
async fn deleting_count_removes_lines() {
    let store = get_test_store().await;
    let staff = seed_user(&store, "staff@example.com", Role::Staff).await;
    let count = draft(staff.id, day(4), vec![line(ItemId::new(), 1, 1)]);
    let id = count.id;
    store.insert_count(count).await.unwrap();

    assert!(store.delete_count(id, SaveOptions::new()).await.unwrap());

    let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM count_items WHERE count_id = $1")
        .bind(id.as_uuid())
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(orphans, 0);
}

#[tokio::test]
#[serial]
async fn item_edit_keeps_stock_written_since_read() {
    let store = get_test_store().await;
    let owner = seed_user(&store, "owner@example.com", Role::Manager).await;
    let milk = seed_item(&store, "Milk", 5, owner.id).await;

    // An approval lands between the edit's read and its write
    let mut edited = store.get_item(milk.id).await.unwrap().unwrap();
    store
        .apply_stock(vec![StockChange::Set {
            item_id: milk.id,
            quantity: 8,
        }])
        .await
        .unwrap();

    edited.description = Some("Whole milk".to_string());
    let stored = store.update_item(edited.clone(), None).await.unwrap();
    assert_eq!(stored.current_quantity, 8);
    assert_eq!(stored.description.as_deref(), Some("Whole milk"));

    let err = store
        .update_item(
            edited.clone(),
            Some(StockChange::Adjust {
                item_id: milk.id,
                delta: -9,
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::QuantityOutOfRange { .. }));

    let stored = store
        .update_item(
            edited,
            Some(StockChange::Set {
                item_id: milk.id,
                quantity: 2,
            }),
        )
        .await
        .unwrap();
    assert_eq!(stored.current_quantity, 2);
    assert_eq!(
        store.get_item(milk.id).await.unwrap().unwrap().current_quantity,
        2
    );
}

#[tokio::test]
#[serial]
async fn concurrent_approvals_write_stock_once() {
    let store = get_test_store().await;
    let staff = seed_user(&store, "staff@example.com", Role::Staff).await;
    let manager = seed_user(&store, "manager@example.com", Role::Manager).await;
    let milk = seed_item(&store, "Milk", 5, manager.id).await;

    let count = draft(staff.id, day(4), vec![line(milk.id, 5, 8)]);
    let id = count.id;
    store.insert_count(count).await.unwrap();

    let mut approved = store.get_count(id).await.unwrap().unwrap();
    approved.status = CountStatus::Approved;
    approved.reviewed_by = Some(manager.id);

    // Adjust makes a double application visible in the final quantity
    let milk_id = milk.id;
    let approve = |store: PostgresStore, count: CountRecord| async move {
        store
            .save_count(
                count,
                SaveOptions::expect_version(Version::first()),
                vec![StockChange::Adjust {
                    item_id: milk_id,
                    delta: 3,
                }],
            )
            .await
    };
    let (first, second) = tokio::join!(
        approve(store.clone(), approved.clone()),
        approve(store.clone(), approved)
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(StoreError::ConcurrencyConflict { .. })))
    );

    let milk = store.get_item(milk.id).await.unwrap().unwrap();
    assert_eq!(milk.current_quantity, 8);
    assert_eq!(
        store.get_count(id).await.unwrap().unwrap().version,
        Version::new(2)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn count_reads_see_header_and_lines_from_one_write() {
    let store = get_test_store().await;
    let staff = seed_user(&store, "staff@example.com", Role::Staff).await;
    let owner = seed_user(&store, "owner@example.com", Role::Manager).await;
    let milk = seed_item(&store, "Milk", 5, owner.id).await;

    let milk_id = milk.id;
    let count = draft(staff.id, day(5), vec![line(milk_id, 5, 1)]);
    let id = count.id;
    store.insert_count(count).await.unwrap();

    // Each write stores its own version number as the line's actual quantity
    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for _ in 0..20 {
                let mut count = store.get_count(id).await.unwrap().unwrap();
                let read = count.version;
                count.lines = vec![line(milk_id, 5, read.next().as_i64() as i32)];
                store
                    .save_count(count, SaveOptions::expect_version(read), vec![])
                    .await
                    .unwrap();
            }
        })
    };

    while !writer.is_finished() {
        let count = store.get_count(id).await.unwrap().unwrap();
        assert_eq!(count.lines.len(), 1);
        assert_eq!(
            i64::from(count.lines[0].actual_quantity),
            count.version.as_i64()
        );
    }
    writer.await.unwrap();
}
