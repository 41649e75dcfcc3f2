//! End-to-end flows through the HTTP router on the in-memory store.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use naira_storefront::{
    api::{self, AppState},
    config::Config,
    domain::events::EventPublisher,
    store::{Backend, DocumentStore, MemoryStore},
};

fn app() -> (Router, MemoryStore) {
    let memory = MemoryStore::with_data(json!({
        "products": {
            "p1": {"name": "Ankara Tote", "price": 10000.0, "stock": 5, "featured": true,
                   "categories": [{"id": "c1", "name": "Bags", "slug": "bags"}]},
            "p2": {"name": "Beaded Sandal", "price": 4000.0, "sale_price": 3000.0, "stock": 1}
        },
        "categories": {"c1": {"name": "Bags", "slug": "bags"}},
        "coupons": {"k1": {"code": "SAVE10", "discount_type": "percentage", "discount_value": 10.0, "is_active": true}}
    }));
    let config = Config {
        storage_dir: std::env::temp_dir().join(format!("storefront-api-{}", uuid::Uuid::new_v4())),
        ..Config::default()
    };
    let state = AppState::new(&config, Backend::Memory(memory.clone()), EventPublisher::disabled());
    (api::router(state), memory)
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, cart: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    if let Some(cart) = cart {
        request = request.header("x-cart-id", cart);
    }
    let request = match body {
        Some(body) => request.header(header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

async fn sign_up(app: &Router, email: &str, cart: Option<&str>) -> (String, String) {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/v1/auth/signup",
        None,
        cart,
        Some(json!({"email": email, "password": "secret123", "firstName": "Ada", "lastName": "Obi"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (body["token"].as_str().unwrap().to_string(), body["user"]["id"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app();
    let (status, body) = call(&app, Method::GET, "/health", None, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_guest_cart_to_order() {
    let (app, memory) = app();

    let (status, body) = call(&app, Method::POST, "/api/v1/cart/items", None, Some("guest-1"), Some(json!({"productId": "p1", "quantity": 2}))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["summary"]["item_count"], 2);

    let (token, user_id) = sign_up(&app, "ada@example.com", Some("guest-1")).await;

    let (status, body) = call(&app, Method::POST, "/api/v1/cart/coupon", Some(&token), None, Some(json!({"code": "save10"}))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Coupon \"SAVE10\" applied!");
    assert_eq!(body["cart"]["summary"]["total"]["amount"].as_f64(), Some(18_000.0));

    let (status, body) = call(&app, Method::POST, "/api/v1/cart/coupon", Some(&token), None, Some(json!({"code": "nope"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid coupon code.");

    let shipping = json!({
        "shippingAddress": {"firstName": "Ada", "lastName": "Obi", "address": "12 Marina", "city": "Lagos", "state": "Lagos"},
        "paymentMethod": "cod"
    });
    let (status, body) = call(&app, Method::POST, "/api/v1/checkout", Some(&token), None, Some(shipping)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["message"], "Order placed successfully!");
    assert_eq!(body["order"]["total"].as_f64(), Some(20_000.0));

    assert_eq!(memory.get("products/p1/stock").await.unwrap(), Some(json!(3)));
    assert_eq!(memory.get(&format!("users/{user_id}/loyaltyPoints")).await.unwrap(), Some(json!(200)));

    let (_, orders) = call(&app, Method::GET, "/api/v1/account/orders", Some(&token), None, None).await;
    assert_eq!(orders.as_array().map(Vec::len), Some(1));
    let (_, cart) = call(&app, Method::GET, "/api/v1/cart", Some(&token), None, None).await;
    assert_eq!(cart["summary"]["item_count"], 0);
}

#[tokio::test]
async fn test_checkout_requires_sign_in() {
    let (app, _) = app();
    let (status, body) = call(&app, Method::POST, "/api/v1/checkout", None, Some("guest-2"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "No user is logged in.");

    let (status, _) = call(&app, Method::GET, "/api/v1/cart", None, None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_routes_check_the_stored_flag() {
    let (app, memory) = app();
    let (token, user_id) = sign_up(&app, "staff@example.com", None).await;

    let (status, body) = call(&app, Method::GET, "/api/v1/admin/dashboard", Some(&token), None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "You do not have permission to access this page.");

    memory.set(&format!("users/{user_id}/isAdmin"), json!(true)).await.unwrap();
    let (status, body) = call(&app, Method::GET, "/api/v1/admin/dashboard", Some(&token), None, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["totalProducts"], 2);
    assert_eq!(body["lowStock"][0]["id"], "p2");

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/admin/categories",
        Some(&token),
        None,
        Some(json!({"name": "Home Decor"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["slug"], "home-decor");
}

#[tokio::test]
async fn test_product_listing_filters() {
    let (app, _) = app();
    let (status, body) = call(&app, Method::GET, "/api/v1/products?category=bags", None, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (_, body) = call(&app, Method::GET, "/api/v1/products?search=sandal", None, None, None).await;
    assert_eq!(body[0]["id"], "p2");

    let (status, _) = call(&app, Method::GET, "/api/v1/products/ghost", None, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ids_with_encoded_slashes_are_not_found() {
    let (app, _) = app();
    let (status, body) = call(&app, Method::GET, "/api/v1/products/p1%2Fname", None, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");

    let (status, _) = call(&app, Method::PUT, "/api/v1/cart/items/p1%2Fstock", None, Some("guest-3"), Some(json!({"quantity": 2}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_oversized_cart_quantity_is_rejected() {
    let (app, _) = app();
    let (status, body) = call(&app, Method::POST, "/api/v1/cart/items", None, Some("guest-4"), Some(json!({"productId": "p1", "quantity": 4_294_967_295u64}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid quantity");
}
