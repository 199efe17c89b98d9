//! Relation batch loading against the scripted driver

mod common;

use std::sync::Arc;

use serde_json::{json, Value};

use common::{fixture_registry, row, MemoryDriver, Post, User};
use relic_orm::{
    Adapter, BatchConfig, EntityManager, PostgresAdapter, QueryOptions, RelationManager,
    Repository,
};

async fn manager(driver: &Arc<MemoryDriver>) -> EntityManager {
    let adapter: Arc<dyn Adapter> = Arc::new(PostgresAdapter::new(driver.clone()));
    adapter.connect().await.expect("connect");
    EntityManager::new(fixture_registry(), adapter)
}

fn user_row(id: i64) -> relic_orm::Row {
    row(&[
        ("id", Value::from(id)),
        ("email", Value::from(format!("user{}@example.com", id))),
        ("active", json!(true)),
    ])
}

#[tokio::test]
async fn one_to_many_issues_a_single_query_for_fifty_parents() {
    let driver = MemoryDriver::new();
    driver.queue_rows((1..=50).map(user_row).collect());
    // Two posts for user 1, one for user 2, none for the rest.
    driver.queue_rows(vec![
        row(&[("id", json!(10)), ("user_id", json!(1)), ("title", json!("a"))]),
        row(&[("id", json!(11)), ("user_id", json!(1)), ("title", json!("b"))]),
        row(&[("id", json!(12)), ("user_id", json!(2)), ("title", json!("c"))]),
    ]);
    let em = manager(&driver).await;

    let users = em
        .find::<User>(QueryOptions::new().with_relations(vec!["posts".to_string()]))
        .await
        .expect("find with relations");
    assert_eq!(users.len(), 50);

    // One SELECT for users, exactly one for the posts relation.
    let selects = driver.executed_matching("SELECT");
    assert_eq!(selects.len(), 2);
    assert!(selects[1].starts_with("SELECT * FROM posts WHERE user_id IN ("));

    // Every parent gets a list; absent rows mean an empty one.
    assert_eq!(users[0].read().posts.len(), 2);
    assert_eq!(users[1].read().posts.len(), 1);
    for user in &users[2..] {
        assert!(user.read().posts.is_empty());
    }
}

#[tokio::test]
async fn many_to_one_assigns_null_for_missing_rows() {
    let driver = MemoryDriver::new();
    driver.queue_rows(vec![
        row(&[("id", json!(10)), ("user_id", json!(1)), ("title", json!("a"))]),
        row(&[("id", json!(11)), ("user_id", json!(99)), ("title", json!("orphan"))]),
        row(&[("id", json!(12)), ("user_id", Value::Null), ("title", json!("draft"))]),
    ]);
    // Only user 1 exists.
    driver.queue_rows(vec![user_row(1)]);
    let em = manager(&driver).await;

    let posts = em
        .find::<Post>(QueryOptions::new().with_relations(vec!["author".to_string()]))
        .await
        .expect("find with relations");

    let selects = driver.executed_matching("SELECT");
    assert_eq!(selects.len(), 2);
    assert!(selects[1].starts_with("SELECT * FROM users WHERE id IN ("));

    assert!(posts[0].read().author.is_some());
    // A missing related row is a valid terminal state.
    assert!(posts[1].read().author.is_none());
    assert!(posts[2].read().author.is_none());
}

#[tokio::test]
async fn one_to_one_assigns_at_most_one_match() {
    let driver = MemoryDriver::new();
    driver.queue_rows(vec![user_row(1), user_row(2)]);
    driver.queue_rows(vec![row(&[
        ("id", json!(5)),
        ("user_id", json!(1)),
        ("bio", json!("writes compilers")),
    ])]);
    let em = manager(&driver).await;

    let users = em
        .find::<User>(QueryOptions::new().with_relations(vec!["profile".to_string()]))
        .await
        .expect("find with relations");

    let with_profile = users[0].read();
    let without_profile = users[1].read();
    assert_eq!(
        with_profile
            .profile
            .as_ref()
            .and_then(|p| p.read().bio.clone())
            .as_deref(),
        Some("writes compilers")
    );
    assert!(without_profile.profile.is_none());
}

#[tokio::test]
async fn many_to_many_loads_through_the_join_table() {
    let driver = MemoryDriver::new();
    driver.queue_rows(vec![user_row(1), user_row(2)]);
    // Join rows: user 1 -> tags 100, 101; user 2 -> tag 100.
    driver.queue_rows(vec![
        row(&[("user_id", json!(1)), ("tag_id", json!(100))]),
        row(&[("user_id", json!(1)), ("tag_id", json!(101))]),
        row(&[("user_id", json!(2)), ("tag_id", json!(100))]),
    ]);
    driver.queue_rows(vec![
        row(&[("id", json!(100)), ("label", json!("rust"))]),
        row(&[("id", json!(101)), ("label", json!("databases"))]),
    ]);
    let em = manager(&driver).await;

    let users = em
        .find::<User>(QueryOptions::new().with_relations(vec!["tags".to_string()]))
        .await
        .expect("find with relations");

    let selects = driver.executed_matching("SELECT");
    // Users, join rows, targets: the relation costs two queries, never one
    // per row.
    assert_eq!(selects.len(), 3);
    assert!(selects[1].starts_with("SELECT * FROM user_tags WHERE user_id IN ("));
    assert!(selects[2].starts_with("SELECT * FROM tags WHERE id IN ("));

    let first = users[0].read();
    let labels: Vec<String> = first.tags.iter().map(|t| t.read().label.clone()).collect();
    assert_eq!(labels, vec!["rust".to_string(), "databases".to_string()]);
    assert_eq!(users[1].read().tags.len(), 1);

    // Shared tags resolve to the same instance through the identity map.
    let shared_first = first.tags[0].clone();
    let shared_second = users[1].read().tags[0].clone();
    assert!(Arc::ptr_eq(&shared_first, &shared_second));
}

#[tokio::test]
async fn batched_loading_chunks_the_membership_list() {
    let driver = MemoryDriver::new();
    driver.queue_rows((1..=5).map(user_row).collect());
    let em = manager(&driver).await;
    let users = em.find::<User>(QueryOptions::new()).await.expect("find");
    driver.clear_journal();

    let loader = RelationManager::with_config(&em, BatchConfig { max_batch_size: 2 });
    loader
        .load_batched::<User>(&users, &["posts".to_string()])
        .await
        .expect("batched load");

    // ceil(5 / 2) chunks, one posts query each.
    let selects = driver.executed_matching("SELECT");
    assert_eq!(selects.len(), 3);
    for select in &selects {
        assert!(select.starts_with("SELECT * FROM posts WHERE user_id IN ("));
    }
}

#[tokio::test]
async fn unknown_relation_name_is_an_error() {
    let driver = MemoryDriver::new();
    driver.queue_rows(vec![user_row(1)]);
    let em = manager(&driver).await;
    let users = em.find::<User>(QueryOptions::new()).await.expect("find");

    let loader = RelationManager::new(&em);
    let result = loader.load::<User>(&users, &["followers".to_string()]).await;
    assert!(matches!(result, Err(relic_orm::OrmError::Relationship(_))));
}

#[tokio::test]
async fn empty_where_in_short_circuits_without_a_query() {
    let driver = MemoryDriver::new();
    let em = Arc::new(manager(&driver).await);
    let repo = Repository::<User>::new(em);

    let found = repo.find_where_in("id", vec![]).await.expect("empty in");
    assert!(found.is_empty());
    assert!(driver.executed().is_empty());
}

#[tokio::test]
async fn non_empty_where_in_expands_parameters() {
    let driver = MemoryDriver::new();
    driver.queue_rows(vec![user_row(1), user_row(2)]);
    let em = Arc::new(manager(&driver).await);
    let repo = Repository::<User>::new(em);

    let found = repo
        .find_where_in("id", vec![json!(1), json!(2)])
        .await
        .expect("where in");
    assert_eq!(found.len(), 2);
    assert_eq!(
        driver.executed_sql()[0],
        "SELECT * FROM users WHERE id IN ($1, $2)"
    );
}
