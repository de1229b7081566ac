//! Point expiry against a real database.

use befit_api::models::BatchExpireReport;
use befit_api::services::LoyaltyService;
use befit_core::UserId;
use befit_integration_tests::fixtures;
use chrono::NaiveDate;
use sqlx::PgPool;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

async fn member(pool: &PgPool, user_id: UserId, tier_level: i32, points: i32, expires: NaiveDate) {
    sqlx::query(
        r"
        INSERT INTO befit.user_loyalty (user_id, tier_id, total_points, points_expiration_date)
        SELECT $1, id, $2, $3 FROM befit.loyalty_tiers WHERE tier_level = $4
        ",
    )
    .bind(user_id)
    .bind(points)
    .bind(expires)
    .bind(tier_level)
    .execute(pool)
    .await
    .expect("insert member");
}

async fn balance(pool: &PgPool, user_id: UserId) -> (i32, i32, Option<NaiveDate>) {
    sqlx::query_as(
        "SELECT ul.total_points, t.tier_level, ul.points_expiration_date \
         FROM befit.user_loyalty ul JOIN befit.loyalty_tiers t ON t.id = ul.tier_id \
         WHERE ul.user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("member balance")
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires running database (DATABASE_URL)"]
async fn test_expiry_run_resets_only_members_past_their_date(pool: PgPool) {
    fixtures::seed_tiers(&pool).await;
    let today = date(2026, 10, 14);
    let ana = fixtures::user(&pool, "ana@example.com").await;
    let luis = fixtures::user(&pool, "luis@example.com").await;
    let maria = fixtures::user(&pool, "maria@example.com").await;
    member(&pool, ana, 2, 620, date(2026, 10, 13)).await;
    member(&pool, luis, 1, 0, today).await;
    member(&pool, maria, 1, 300, date(2026, 10, 15)).await;

    let report = LoyaltyService::new(&pool)
        .expire_all(today)
        .await
        .expect("expiry run");

    assert_eq!(
        report,
        BatchExpireReport {
            users_affected: 1,
            total_expired_points: 620,
        }
    );
    assert_eq!(balance(&pool, ana).await, (0, 1, None));
    assert_eq!(balance(&pool, luis).await, (0, 1, None));
    assert_eq!(balance(&pool, maria).await, (300, 1, Some(date(2026, 10, 15))));

    let ledger: Vec<i32> = sqlx::query_scalar(
        "SELECT points_change FROM befit.point_history WHERE event_type = 'expired'",
    )
    .fetch_all(&pool)
    .await
    .expect("ledger");
    assert_eq!(ledger, vec![-620]);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires running database (DATABASE_URL)"]
async fn test_second_expiry_run_finds_nothing(pool: PgPool) {
    fixtures::seed_tiers(&pool).await;
    let today = date(2026, 10, 14);
    let ana = fixtures::user(&pool, "ana@example.com").await;
    member(&pool, ana, 1, 150, date(2026, 10, 1)).await;
    let service = LoyaltyService::new(&pool);

    service.expire_all(today).await.expect("first run");
    let report = service.expire_all(today).await.expect("second run");

    assert_eq!(report, BatchExpireReport::default());
}
