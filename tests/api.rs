//! End-to-end HTTP tests: a real listener backed by a throwaway SQLite
//! database.

#![allow(clippy::panic, clippy::indexing_slicing)]

mod common;

use restodir::api;
use restodir::app_state::AppState;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use common::{TestDb, sqlite_db};

struct TestServer {
    base: String,
    client: reqwest::Client,
    _db: TestDb,
}

impl TestServer {
    async fn start() -> Self {
        let db = sqlite_db().await;
        let app = api::build_router().with_state(AppState::new(db.db.clone()));
        let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("local addr");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            _db: db,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> (u16, Value) {
        let Ok(response) = request.send().await else {
            panic!("request failed");
        };
        let status = response.status().as_u16();
        let Ok(body) = response.json::<Value>().await else {
            panic!("response is not JSON");
        };
        (status, body)
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        self.send(self.client.get(self.url(path))).await
    }

    async fn create_restaurant(&self, body: Value) -> (u16, Value) {
        self.send(
            self.client
                .post(self.url("/api/v1/restaurants"))
                .header("X-User-Id", "u1")
                .json(&body),
        )
        .await
    }
}

fn error_code(body: &Value) -> Option<u64> {
    body["error"]["code"].as_u64()
}

#[tokio::test]
async fn create_get_and_filter_restaurants() {
    let server = TestServer::start().await;

    let (status, created) = server
        .create_restaurant(json!({
            "name": "Test",
            "city": "Tunja",
            "cuisine": "boyacense",
            "reviews": [
                { "rating": 5, "comment": "excelente" },
                { "rating": 4 }
            ]
        }))
        .await;
    assert_eq!(status, 201);
    assert_eq!(created["restaurant"]["created_by"], "u1");
    assert_eq!(created["reviews"].as_array().map(Vec::len), Some(2));
    let Some(id) = created["restaurant"]["id"].as_str() else {
        panic!("no id in {created}");
    };

    let (status, fetched) = server.get(&format!("/api/v1/restaurants/{id}")).await;
    assert_eq!(status, 200);
    assert_eq!(fetched, created["restaurant"]);

    let (status, _) = server
        .create_restaurant(json!({ "name": "Other", "city": "Duitama" }))
        .await;
    assert_eq!(status, 201);

    let (status, page) = server.get("/api/v1/restaurants?city=Tunja").await;
    assert_eq!(status, 200);
    assert_eq!(page["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(page["data"][0]["id"], id);
    assert_eq!(page["pagination"]["returned"], 1);

    let (status, reviews) = server
        .get(&format!("/api/v1/restaurants/{id}/reviews?rating=5"))
        .await;
    assert_eq!(status, 200);
    assert_eq!(reviews["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(reviews["data"][0]["comment"], "excelente");
}

#[tokio::test]
async fn unknown_filter_is_a_bad_request() {
    let server = TestServer::start().await;
    let (status, body) = server.get("/api/v1/restaurants?colour=red").await;
    assert_eq!(status, 400);
    assert_eq!(error_code(&body), Some(1002));

    let (status, body) = server.get("/api/v1/archives?deleted_at=now").await;
    assert_eq!(status, 400);
    assert_eq!(error_code(&body), Some(1002));
}

#[tokio::test]
async fn writes_require_an_actor() {
    let server = TestServer::start().await;
    let (status, body) = server
        .send(
            server
                .client
                .post(server.url("/api/v1/restaurants"))
                .json(&json!({ "name": "Test", "city": "Tunja" })),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(error_code(&body), Some(1003));

    let (status, page) = server.get("/api/v1/restaurants").await;
    assert_eq!(status, 200);
    assert_eq!(page["data"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn invalid_rating_rejects_the_whole_create() {
    let server = TestServer::start().await;
    let (status, body) = server
        .create_restaurant(json!({
            "name": "Test",
            "city": "Tunja",
            "reviews": [{ "rating": 4 }, { "rating": 7 }]
        }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(error_code(&body), Some(1001));

    let (_, page) = server.get("/api/v1/restaurants").await;
    assert_eq!(page["data"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn delete_archives_restaurant_and_reviews() {
    let server = TestServer::start().await;
    let (_, created) = server
        .create_restaurant(json!({
            "name": "Test",
            "city": "Tunja",
            "reviews": [{ "rating": 5 }, { "rating": 2 }]
        }))
        .await;
    let Some(id) = created["restaurant"]["id"].as_str() else {
        panic!("no id in {created}");
    };

    let (status, archived) = server
        .send(
            server
                .client
                .delete(server.url(&format!("/api/v1/restaurants/{id}?note=closed")))
                .header("X-User-Id", "admin"),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(archived["archive"]["original_id"], id);
    assert_eq!(archived["archive"]["original_table"], "restaurants");
    assert_eq!(archived["archive"]["deleted_by"], "admin");
    assert_eq!(archived["archive"]["note"], "closed");
    assert_eq!(archived["archive"]["data"], created["restaurant"]);
    assert_eq!(archived["archived_reviews"].as_array().map(Vec::len), Some(2));

    let (status, body) = server.get(&format!("/api/v1/restaurants/{id}")).await;
    assert_eq!(status, 404);
    assert_eq!(error_code(&body), Some(2001));

    let (status, archives) = server
        .get(&format!("/api/v1/archives?original_id={id}"))
        .await;
    assert_eq!(status, 200);
    assert_eq!(archives["data"].as_array().map(Vec::len), Some(1));
    let Some(archive_id) = archives["data"][0]["id"].as_str() else {
        panic!("no archive id in {archives}");
    };
    let (status, record) = server.get(&format!("/api/v1/archives/{archive_id}")).await;
    assert_eq!(status, 200);
    assert_eq!(record["original_id"], id);

    let (status, body) = server
        .send(
            server
                .client
                .delete(server.url(&format!("/api/v1/restaurants/{id}")))
                .header("X-User-Id", "admin"),
        )
        .await;
    assert_eq!(status, 404);
    assert_eq!(error_code(&body), Some(2001));
}

#[tokio::test]
async fn review_lifecycle() {
    let server = TestServer::start().await;
    let (_, created) = server
        .create_restaurant(json!({ "name": "Test", "city": "Tunja" }))
        .await;
    let Some(restaurant_id) = created["restaurant"]["id"].as_str() else {
        panic!("no id in {created}");
    };

    let (status, review) = server
        .send(
            server
                .client
                .post(server.url(&format!("/api/v1/restaurants/{restaurant_id}/reviews")))
                .header("X-User-Id", "u2")
                .json(&json!({ "rating": 3, "comment": "regular" })),
        )
        .await;
    assert_eq!(status, 201);
    let Some(review_id) = review["id"].as_str() else {
        panic!("no id in {review}");
    };

    let (status, patched) = server
        .send(
            server
                .client
                .patch(server.url(&format!("/api/v1/reviews/{review_id}")))
                .header("X-User-Id", "u3")
                .json(&json!({ "rating": 4 })),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(patched["rating"], 4);
    assert_eq!(patched["comment"], "regular");
    assert_eq!(patched["created_by"], "u2");
    assert_eq!(patched["updated_by"], "u3");

    let (status, archived) = server
        .send(
            server
                .client
                .delete(server.url(&format!("/api/v1/reviews/{review_id}")))
                .header("X-User-Id", "u3"),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(archived["original_table"], "reviews");
    assert_eq!(archived["data"], patched);

    let (status, _) = server.get(&format!("/api/v1/reviews/{review_id}")).await;
    assert_eq!(status, 404);
    let (status, _) = server.get(&format!("/api/v1/restaurants/{restaurant_id}")).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn health_reports_pool_state() {
    let server = TestServer::start().await;
    let (status, body) = server.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["backend"], "sqlite");
    assert_eq!(body["database"]["lifecycle"], "ready");
    assert_eq!(body["database"]["max_connections"], 15);
}
