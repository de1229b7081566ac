//! Product ratings kept in step with reviews.

use befit_api::db::{RepositoryError, ReviewRepository};
use befit_core::ProductId;
use befit_integration_tests::fixtures;
use rust_decimal::Decimal;
use sqlx::PgPool;

async fn average_rating(pool: &PgPool, product_id: ProductId) -> Decimal {
    sqlx::query_scalar("SELECT average_rating FROM befit.products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .expect("average rating")
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires running database (DATABASE_URL)"]
async fn test_average_rating_follows_every_review_change(pool: PgPool) {
    let product = fixtures::product(&pool, "Whey Isolate", Decimal::new(89_900, 2), 10).await;
    let ana = fixtures::user(&pool, "ana@example.com").await;
    let luis = fixtures::user(&pool, "luis@example.com").await;
    let ana_order = fixtures::delivered_order(&pool, ana).await;
    let luis_order = fixtures::delivered_order(&pool, luis).await;
    let repo = ReviewRepository::new(&pool);

    let first = repo
        .create(ana, product, ana_order, 5, Some("Mixes well"))
        .await
        .expect("first review");
    assert_eq!(average_rating(&pool, product).await, Decimal::new(5, 0));

    let second = repo
        .create(luis, product, luis_order, 2, None)
        .await
        .expect("second review");
    assert_eq!(average_rating(&pool, product).await, Decimal::new(35, 1));

    let updated = repo
        .update(first.id, Some(3), Some(None))
        .await
        .expect("update review");
    assert_eq!(updated.rating, 3);
    assert!(updated.review_text.is_none());
    assert_eq!(average_rating(&pool, product).await, Decimal::new(25, 1));

    repo.delete(second.id).await.expect("delete review");
    assert_eq!(average_rating(&pool, product).await, Decimal::new(3, 0));

    repo.delete(first.id).await.expect("delete review");
    assert_eq!(average_rating(&pool, product).await, Decimal::ZERO);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires running database (DATABASE_URL)"]
async fn test_rating_only_update_keeps_the_text(pool: PgPool) {
    let product = fixtures::product(&pool, "Creatine", Decimal::new(49_900, 2), 10).await;
    let ana = fixtures::user(&pool, "ana@example.com").await;
    let order = fixtures::delivered_order(&pool, ana).await;
    let repo = ReviewRepository::new(&pool);

    let review = repo
        .create(ana, product, order, 4, Some("No clumps"))
        .await
        .expect("create review");
    let updated = repo
        .update(review.id, Some(5), None)
        .await
        .expect("update review");

    assert_eq!(updated.review_text.as_deref(), Some("No clumps"));
    assert_eq!(average_rating(&pool, product).await, Decimal::new(5, 0));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires running database (DATABASE_URL)"]
async fn test_second_review_of_a_product_conflicts(pool: PgPool) {
    let product = fixtures::product(&pool, "BCAA", Decimal::new(39_900, 2), 10).await;
    let ana = fixtures::user(&pool, "ana@example.com").await;
    let order = fixtures::delivered_order(&pool, ana).await;
    let repo = ReviewRepository::new(&pool);

    repo.create(ana, product, order, 4, None)
        .await
        .expect("create review");
    let err = repo
        .create(ana, product, order, 1, None)
        .await
        .expect_err("duplicate review");

    assert!(matches!(err, RepositoryError::Conflict(_)));
    assert_eq!(average_rating(&pool, product).await, Decimal::new(4, 0));
}
