//! Checkout against a real database and a local PayPal stand-in.

use befit_api::config::CommerceConfig;
use befit_api::error::AppError;
use befit_api::models::CheckoutRequest;
use befit_api::services::OrderService;
use befit_core::{OrderStatus, PaymentStatus, UserId};
use befit_integration_tests::fixtures::{self, DECLINED_VAULT};
use rust_decimal::Decimal;
use sqlx::PgPool;

async fn order_count(pool: &PgPool, user_id: UserId) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM befit.orders WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("count orders")
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires running database (DATABASE_URL)"]
async fn test_paid_checkout_takes_stock_and_clears_the_cart(pool: PgPool) {
    fixtures::seed_tiers(&pool).await;
    let ana = fixtures::user(&pool, "ana@example.com").await;
    let whey = fixtures::product(&pool, "Whey Isolate", Decimal::new(89_900, 2), 5).await;
    fixtures::add_to_cart(&pool, ana, whey, 2).await;
    let request = CheckoutRequest {
        address_id: fixtures::address(&pool, ana).await,
        payment_method_id: fixtures::paypal_method(&pool, ana, "vault-ok").await,
    };
    let payments = fixtures::gateways(&fixtures::spawn_paypal().await);
    let commerce = CommerceConfig::default();

    let detail = OrderService::new(&pool, &payments, &commerce)
        .checkout(ana, request)
        .await
        .expect("checkout");

    assert_eq!(detail.order.order_status, OrderStatus::Paid);
    assert_eq!(detail.order.payment_status, PaymentStatus::Paid);
    assert_eq!(detail.order.payment_reference.as_deref(), Some("paypal:CAPTURE-1"));
    assert_eq!(detail.order.subtotal, Decimal::new(179_800, 2));
    assert_eq!(detail.items.len(), 1);
    assert_eq!(fixtures::stock(&pool, whey).await, 3);
    assert_eq!(fixtures::cart_lines(&pool, ana).await, 0);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires running database (DATABASE_URL)"]
async fn test_declined_checkout_leaves_stock_and_cart(pool: PgPool) {
    fixtures::seed_tiers(&pool).await;
    let ana = fixtures::user(&pool, "ana@example.com").await;
    let whey = fixtures::product(&pool, "Whey Isolate", Decimal::new(89_900, 2), 5).await;
    fixtures::add_to_cart(&pool, ana, whey, 2).await;
    let request = CheckoutRequest {
        address_id: fixtures::address(&pool, ana).await,
        payment_method_id: fixtures::paypal_method(&pool, ana, DECLINED_VAULT).await,
    };
    let payments = fixtures::gateways(&fixtures::spawn_paypal().await);
    let commerce = CommerceConfig::default();

    let err = OrderService::new(&pool, &payments, &commerce)
        .checkout(ana, request)
        .await
        .expect_err("declined checkout");

    assert!(matches!(err, AppError::PaymentRequired(_)));
    assert_eq!(err.to_string(), "Payment declined: Instrument declined");
    assert_eq!(fixtures::stock(&pool, whey).await, 5);
    assert_eq!(fixtures::cart_lines(&pool, ana).await, 1);
    assert_eq!(order_count(&pool, ana).await, 0);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires running database (DATABASE_URL)"]
async fn test_checkout_refuses_more_than_the_stock(pool: PgPool) {
    fixtures::seed_tiers(&pool).await;
    let ana = fixtures::user(&pool, "ana@example.com").await;
    let whey = fixtures::product(&pool, "Whey Isolate", Decimal::new(89_900, 2), 1).await;
    fixtures::add_to_cart(&pool, ana, whey, 2).await;
    let request = CheckoutRequest {
        address_id: fixtures::address(&pool, ana).await,
        payment_method_id: fixtures::paypal_method(&pool, ana, "vault-ok").await,
    };
    let payments = fixtures::gateways(&fixtures::spawn_paypal().await);
    let commerce = CommerceConfig::default();

    let err = OrderService::new(&pool, &payments, &commerce)
        .checkout(ana, request)
        .await
        .expect_err("short stock");

    assert_eq!(
        err.to_string(),
        "Insufficient stock for Whey Isolate. Available: 1, requested: 2"
    );
    assert_eq!(fixtures::stock(&pool, whey).await, 1);
    assert_eq!(order_count(&pool, ana).await, 0);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires running database (DATABASE_URL)"]
async fn test_checkout_of_an_empty_cart_is_refused(pool: PgPool) {
    fixtures::seed_tiers(&pool).await;
    let ana = fixtures::user(&pool, "ana@example.com").await;
    let request = CheckoutRequest {
        address_id: fixtures::address(&pool, ana).await,
        payment_method_id: fixtures::paypal_method(&pool, ana, "vault-ok").await,
    };
    let payments = fixtures::gateways(&fixtures::spawn_paypal().await);
    let commerce = CommerceConfig::default();

    let err = OrderService::new(&pool, &payments, &commerce)
        .checkout(ana, request)
        .await
        .expect_err("empty cart");

    assert_eq!(err.to_string(), "Cart is empty");
    assert_eq!(order_count(&pool, ana).await, 0);
}
