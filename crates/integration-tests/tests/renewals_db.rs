//! Subscription renewals against a real database and a local PayPal stand-in.

use befit_api::services::SubscriptionService;
use befit_core::{PaymentMethodId, SubscriptionId, UserId};
use befit_integration_tests::fixtures::{self, DECLINED_VAULT};
use chrono::NaiveDate;
use sqlx::PgPool;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

async fn subscription(
    pool: &PgPool,
    user_id: UserId,
    method: Option<PaymentMethodId>,
    due: NaiveDate,
) -> SubscriptionId {
    let id: i32 = sqlx::query_scalar(
        r"
        WITH profile AS (
            INSERT INTO befit.fitness_profiles (user_id, fitness_goal)
            VALUES ($1, 'gain_muscle') RETURNING id
        ), plan AS (
            INSERT INTO befit.subscription_plans (name, price)
            VALUES ('Muscle Gain', 799.00) RETURNING id, price
        )
        INSERT INTO befit.subscriptions (
            user_id, profile_id, plan_id, payment_method_id, start_date,
            next_delivery_date, price
        )
        SELECT $1, profile.id, plan.id, $2, $3 - 30, $3, plan.price FROM profile, plan
        RETURNING id
        ",
    )
    .bind(user_id)
    .bind(method)
    .bind(due)
    .fetch_one(pool)
    .await
    .expect("insert subscription");
    SubscriptionId::new(id)
}

async fn state(pool: &PgPool, id: SubscriptionId) -> (String, i32, NaiveDate) {
    sqlx::query_as(
        "SELECT subscription_status::text, failed_payment_attempts, next_delivery_date \
         FROM befit.subscriptions WHERE id = $1",
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .expect("subscription state")
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires running database (DATABASE_URL)"]
async fn test_third_failed_renewal_pauses_the_subscription(pool: PgPool) {
    let ana = fixtures::user(&pool, "ana@example.com").await;
    let today = date(2026, 3, 1);
    let id = subscription(&pool, ana, None, today).await;
    let payments = fixtures::gateways(&fixtures::spawn_paypal().await);
    let service = SubscriptionService::new(&pool, &payments);

    for attempt in 1..=2 {
        let report = service.renew_due(today).await.expect("renewal run");
        assert_eq!((report.failed, report.paused), (1, 0));
        assert_eq!(state(&pool, id).await, ("active".to_string(), attempt, today));
    }

    let report = service.renew_due(today).await.expect("renewal run");
    assert_eq!((report.failed, report.paused), (1, 1));
    assert_eq!(state(&pool, id).await, ("paused".to_string(), 3, today));

    let report = service.renew_due(today).await.expect("renewal run");
    assert_eq!(report.processed, 0);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires running database (DATABASE_URL)"]
async fn test_declined_card_is_retried_on_the_next_run(pool: PgPool) {
    let ana = fixtures::user(&pool, "ana@example.com").await;
    let method = fixtures::paypal_method(&pool, ana, DECLINED_VAULT).await;
    let today = date(2026, 3, 1);
    let id = subscription(&pool, ana, Some(method), today).await;
    let payments = fixtures::gateways(&fixtures::spawn_paypal().await);
    let service = SubscriptionService::new(&pool, &payments);

    service.renew_due(today).await.expect("renewal run");
    service.renew_due(today).await.expect("renewal run");

    assert_eq!(state(&pool, id).await, ("active".to_string(), 2, today));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires running database (DATABASE_URL)"]
async fn test_paid_renewal_writes_an_order_and_moves_the_date(pool: PgPool) {
    let ana = fixtures::user(&pool, "ana@example.com").await;
    let method = fixtures::paypal_method(&pool, ana, "vault-ok").await;
    let today = date(2026, 1, 31);
    let id = subscription(&pool, ana, Some(method), today).await;
    let payments = fixtures::gateways(&fixtures::spawn_paypal().await);

    let report = SubscriptionService::new(&pool, &payments)
        .renew_due(today)
        .await
        .expect("renewal run");

    assert_eq!((report.processed, report.renewed), (1, 1));
    assert_eq!(state(&pool, id).await, ("active".to_string(), 0, date(2026, 2, 28)));

    let (status, reference): (String, Option<String>) = sqlx::query_as(
        "SELECT order_status::text, payment_reference FROM befit.orders WHERE subscription_id = $1",
    )
    .bind(id)
    .fetch_one(&pool)
    .await
    .expect("renewal order");
    assert_eq!(status, "paid");
    assert_eq!(reference.as_deref(), Some("paypal:CAPTURE-1"));
}
