//! Checkout and payment settlement against a real database.
//!
//! Needs `DATABASE_URL`; each test seeds its own cabin and seat so the suite
//! can share one database.

mod common;

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Request, StatusCode},
};
use chrono::Months;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

use inhalestays_api::{
    auth::{AuthUser, Role},
    bookings::{self, PaymentOutcome, ZERO_AMOUNT_PAYMENT_ID},
    build_router, db,
    error::AppError,
    pricing::{queries as pricing_queries, services},
    routes::vendors::approve_partner,
};

use common::{
    bearer, booking_status, database, order_id, seed_seat, send, sign, state, today, webhook,
    SeededBooking, WEBHOOK_SECRET,
};

fn student() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        email: None,
        role: Role::Student,
    }
}

fn captured(order_id: &str, payment_id: &str, amount: i64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "amount": amount,
                    "currency": "INR",
                    "status": "captured",
                    "order_id": order_id
                }
            }
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_zero_amount_checkout_settles_immediately() {
    let Some(pool) = database().await else { return };
    let seat = seed_seat(&pool, None, dec!(0)).await;
    let state = state(pool.clone());

    let checkout = bookings::create_booking(&state, &student(), seat.seat_id, 1, None)
        .await
        .unwrap();

    assert!(checkout.order.is_none());
    let receipt = checkout.receipt.unwrap();
    assert_eq!(receipt.receipt.razorpay_payment_id, ZERO_AMOUNT_PAYMENT_ID);
    assert_eq!(checkout.booking.status, "completed");
    assert_eq!(booking_status(&pool, checkout.booking.id).await, "completed");
}

#[tokio::test]
async fn test_gateway_failure_marks_booking_failed() {
    let Some(pool) = database().await else { return };
    let seat = seed_seat(&pool, None, dec!(1000)).await;
    let state = state(pool.clone());
    let user = student();

    // The configured gateway address refuses connections
    assert!(bookings::create_booking(&state, &user, seat.seat_id, 1, None).await.is_err());

    let rows = db::get_user_bookings(&pool, user.user_id, 10, 0).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, "failed");

    // A failed booking does not hold the seat
    let mut tx = pool.begin().await.unwrap();
    services::ensure_seat_available(&mut tx, seat.seat_id, rows[0].start_date, rows[0].end_date)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_pending_booking_holds_seat_for_fifteen_minutes() {
    let Some(pool) = database().await else { return };
    let seat = seed_seat(&pool, None, dec!(0)).await;
    let state = state(pool.clone());

    let held = SeededBooking::pending(Uuid::new_v4()).insert(&pool, &seat).await;

    let err = bookings::create_booking(&state, &student(), seat.seat_id, 1, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    sqlx::query("UPDATE bookings SET created_at = now() - interval '16 minutes' WHERE id = $1")
        .bind(held)
        .execute(&pool)
        .await
        .unwrap();

    let checkout = bookings::create_booking(&state, &student(), seat.seat_id, 1, None)
        .await
        .unwrap();
    assert_eq!(checkout.booking.status, "completed");
}

#[tokio::test]
async fn test_callback_and_webhook_share_one_receipt() {
    let Some(pool) = database().await else { return };
    let seat = seed_seat(&pool, None, dec!(2500)).await;
    let state = state(pool.clone());
    let user_id = Uuid::new_v4();
    let order = order_id();

    let booking = SeededBooking {
        order_id: Some(order.clone()),
        ..SeededBooking::pending(user_id)
    }
    .insert(&pool, &seat)
    .await;

    let first = bookings::complete_payment(&state, &order, "pay_cb", Some(user_id), None)
        .await
        .unwrap();
    let PaymentOutcome::Confirmed(first) = first else {
        panic!("callback did not confirm the booking");
    };

    let body = captured(&order, "pay_cb", 295000);
    let signature = sign(WEBHOOK_SECRET, &body);
    let app = build_router(state.clone());
    let (status, _) = send(app, webhook(&body, Some(&signature))).await;
    assert_eq!(status, StatusCode::OK);

    let receipt = db::get_receipt_for_booking(&pool, booking).await.unwrap().unwrap();
    assert_eq!(receipt.receipt_number, first.receipt.receipt_number);
    assert_eq!(booking_status(&pool, booking).await, "completed");
}

#[tokio::test]
async fn test_payment_after_seat_taken_is_flagged_for_refund() {
    let Some(pool) = database().await else { return };
    let seat = seed_seat(&pool, None, dec!(2500)).await;
    let state = state(pool.clone());
    let order = order_id();

    let lapsed = SeededBooking {
        order_id: Some(order.clone()),
        age_minutes: 20,
        ..SeededBooking::pending(Uuid::new_v4())
    }
    .insert(&pool, &seat)
    .await;
    SeededBooking {
        status: "completed",
        ..SeededBooking::pending(Uuid::new_v4())
    }
    .insert(&pool, &seat)
    .await;

    let outcome = bookings::complete_payment(&state, &order, "pay_late", None, Some(295000))
        .await
        .unwrap();
    assert!(matches!(outcome, PaymentOutcome::RefundDue { ref booking } if booking.id == lapsed));
    assert_eq!(booking_status(&pool, lapsed).await, "refund_due");
    assert!(db::get_receipt_for_booking(&pool, lapsed).await.unwrap().is_none());

    // The webhook retry sees the same outcome instead of an error
    let again = bookings::complete_payment(&state, &order, "pay_late", None, Some(295000))
        .await
        .unwrap();
    assert!(matches!(again, PaymentOutcome::RefundDue { .. }));

    let refunds = db::get_refund_due_bookings(&pool).await.unwrap();
    assert!(refunds.iter().any(|b| b.id == lapsed));
}

#[tokio::test]
async fn test_late_payment_completes_when_seat_still_free() {
    let Some(pool) = database().await else { return };
    let seat = seed_seat(&pool, None, dec!(2500)).await;
    let state = state(pool.clone());
    let order = order_id();

    let booking = SeededBooking {
        order_id: Some(order.clone()),
        age_minutes: 45,
        ..SeededBooking::pending(Uuid::new_v4())
    }
    .insert(&pool, &seat)
    .await;

    let outcome = bookings::complete_payment(&state, &order, "pay_slow", None, None)
        .await
        .unwrap();
    assert!(matches!(outcome, PaymentOutcome::Confirmed(_)));
    assert_eq!(booking_status(&pool, booking).await, "completed");
}

#[tokio::test]
async fn test_capture_after_failure_completes_booking() {
    let Some(pool) = database().await else { return };
    let seat = seed_seat(&pool, None, dec!(2500)).await;
    let state = state(pool.clone());
    let order = order_id();

    let booking = SeededBooking {
        order_id: Some(order.clone()),
        ..SeededBooking::pending(Uuid::new_v4())
    }
    .insert(&pool, &seat)
    .await;

    let failed = json!({
        "event": "payment.failed",
        "payload": { "payment": { "entity": {
            "id": "pay_first", "amount": 295000, "status": "failed",
            "order_id": order, "error_description": "Card declined"
        } } }
    });
    let body = serde_json::to_vec(&failed).unwrap();
    let signature = sign(WEBHOOK_SECRET, &body);
    let (status, _) = send(build_router(state.clone()), webhook(&body, Some(&signature))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking_status(&pool, booking).await, "failed");

    let body = captured(&order, "pay_retry", 295000);
    let signature = sign(WEBHOOK_SECRET, &body);
    let (status, _) = send(build_router(state.clone()), webhook(&body, Some(&signature))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking_status(&pool, booking).await, "completed");
}

#[tokio::test]
async fn test_captured_amount_mismatch_is_flagged_for_refund() {
    let Some(pool) = database().await else { return };
    let seat = seed_seat(&pool, None, dec!(2500)).await;
    let state = state(pool.clone());
    let order = order_id();

    let booking = SeededBooking {
        order_id: Some(order.clone()),
        ..SeededBooking::pending(Uuid::new_v4())
    }
    .insert(&pool, &seat)
    .await;

    let body = captured(&order, "pay_short", 100);
    let signature = sign(WEBHOOK_SECRET, &body);
    let (status, _) = send(build_router(state), webhook(&body, Some(&signature))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking_status(&pool, booking).await, "refund_due");
}

#[tokio::test]
async fn test_renewal_settles_only_dues_quoted_at_checkout() {
    let Some(pool) = database().await else { return };
    let seat = seed_seat(&pool, None, dec!(2500)).await;
    let state = state(pool.clone());
    let user_id = Uuid::new_v4();

    let current = SeededBooking {
        status: "completed",
        ..SeededBooking::pending(user_id)
    }
    .insert(&pool, &seat)
    .await;

    let insert_due = |amount: Decimal| {
        let pool = pool.clone();
        async move {
            sqlx::query_scalar::<_, Uuid>(
                "INSERT INTO dues (user_id, booking_id, due_amount) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(user_id)
            .bind(current)
            .bind(amount)
            .fetch_one(&pool)
            .await
            .unwrap()
        }
    };

    let quoted = insert_due(dec!(500)).await;
    let order = order_id();
    SeededBooking {
        start: today().checked_add_months(Months::new(1)).unwrap(),
        total: dec!(3450),
        order_id: Some(order.clone()),
        settled_due_ids: vec![quoted],
        renewed_from: Some(current),
        ..SeededBooking::pending(user_id)
    }
    .insert(&pool, &seat)
    .await;
    let later = insert_due(dec!(200)).await;

    bookings::complete_payment(&state, &order, "pay_renew", Some(user_id), Some(345000))
        .await
        .unwrap();

    let open = pricing_queries::find_open_dues_for_booking(&pool, current).await.unwrap();
    let open_ids: Vec<Uuid> = open.iter().map(|d| d.id).collect();
    assert_eq!(open_ids, vec![later]);
}

#[tokio::test]
async fn test_lapsed_booking_renews_from_today() {
    let Some(pool) = database().await else { return };
    let seat = seed_seat(&pool, None, dec!(0)).await;
    let state = state(pool.clone());
    let user = student();

    let lapsed_start = today().checked_sub_months(Months::new(3)).unwrap();
    let current = SeededBooking {
        status: "completed",
        start: lapsed_start,
        ..SeededBooking::pending(user.user_id)
    }
    .insert(&pool, &seat)
    .await;

    let checkout = bookings::renew_booking(&state, &user, current, 1, None).await.unwrap();
    assert_eq!(checkout.booking.start_date, today());
    assert_eq!(checkout.booking.status, "completed");
}

#[tokio::test]
async fn test_coupon_usage_never_passes_its_limit() {
    let Some(pool) = database().await else { return };
    let code = format!("FULL{}", Uuid::new_v4().simple());
    let coupon_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO coupons (code, discount_type, value, usage_limit, usage_count)
        VALUES ($1, 'fixed', 100, 2, 1)
        RETURNING id
        "#,
    )
    .bind(&code)
    .fetch_one(&pool)
    .await
    .unwrap();

    // A live checkout holding the coupon takes the last use
    let seat = seed_seat(&pool, None, dec!(2500)).await;
    sqlx::query(
        r#"
        INSERT INTO bookings (user_id, cabin_id, seat_id, start_date, end_date, months, total_price, coupon_id)
        VALUES ($1, $2, $3, CURRENT_DATE, CURRENT_DATE + 30, 1, 2850, $4)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(seat.cabin_id)
    .bind(seat.seat_id)
    .bind(coupon_id)
    .execute(&pool)
    .await
    .unwrap();

    let coupon = pricing_queries::find_coupon_by_code(&pool, &code).await.unwrap().unwrap();
    let mut tx = pool.begin().await.unwrap();
    let err = services::reserve_coupon(&mut tx, &coupon).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(msg) if msg.contains("usage limit")));
    tx.rollback().await.unwrap();

    assert!(pricing_queries::increment_coupon_usage(&pool, coupon_id).await.unwrap());
    assert!(!pricing_queries::increment_coupon_usage(&pool, coupon_id).await.unwrap());

    let count: i32 = sqlx::query_scalar("SELECT usage_count FROM coupons WHERE id = $1")
        .bind(coupon_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

async fn seed_partner(pool: &sqlx::PgPool, owner: Uuid, status: &str) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO partners (user_id, business_name, contact_email, phone, address, status)
        VALUES ($1, 'Quiet Corner Library', 'owner@quietcorner.in', '+91 98765 43210', 'Pune', $2)
        RETURNING id
        "#,
    )
    .bind(owner)
    .bind(status)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn role_of(pool: &sqlx::PgPool, user_id: Uuid) -> Option<String> {
    db::get_user_role(pool, user_id).await.unwrap()
}

#[tokio::test]
async fn test_approval_grants_vendor_role_together() {
    let Some(pool) = database().await else { return };
    let owner = Uuid::new_v4();
    let partner_id = seed_partner(&pool, owner, "pending").await;

    let partner = approve_partner(&pool, partner_id).await.unwrap();
    assert_eq!(partner.status, "approved");
    assert_eq!(role_of(&pool, owner).await.as_deref(), Some("vendor"));

    let err = approve_partner(&pool, partner_id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_rejected_partner_gets_no_vendor_role() {
    let Some(pool) = database().await else { return };
    let owner = Uuid::new_v4();
    let partner_id = seed_partner(&pool, owner, "rejected").await;

    assert!(matches!(
        approve_partner(&pool, partner_id).await,
        Err(AppError::Conflict(_))
    ));
    assert_eq!(role_of(&pool, owner).await, None);
}

fn patch_seat(seat_id: Uuid, user_id: Uuid) -> Request<Body> {
    Request::builder()
        .method("PATCH")
        .uri(format!("/api/v1/seats/{}", seat_id))
        .header(AUTHORIZATION, bearer(user_id))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "price": "1800" }).to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_vendor_employee_manages_partner_seats() {
    let Some(pool) = database().await else { return };
    let partner_id = seed_partner(&pool, Uuid::new_v4(), "approved").await;
    let seat = seed_seat(&pool, Some(partner_id), dec!(2500)).await;

    let employee = Uuid::new_v4();
    let outsider = Uuid::new_v4();
    for user_id in [employee, outsider] {
        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, 'vendor_employee')")
            .bind(user_id)
            .execute(&pool)
            .await
            .unwrap();
    }
    sqlx::query("INSERT INTO partner_employees (partner_id, user_id) VALUES ($1, $2)")
        .bind(partner_id)
        .bind(employee)
        .execute(&pool)
        .await
        .unwrap();

    let app = build_router(state(pool.clone()));
    let (status, body) = send(app.clone(), patch_seat(seat.seat_id, employee)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["price"], "1800");

    let (status, _) = send(app, patch_seat(seat.seat_id, outsider)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
