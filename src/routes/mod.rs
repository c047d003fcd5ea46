pub mod comment;
pub mod dto;
pub mod post;
pub mod profile;
pub mod query_monitor;
pub mod user;

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::config::AppConfig;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(
            web::scope("/api/v1")
                .service(web::scope("/users").configure(user::config))
                .service(web::scope("/posts").configure(post::config))
                .service(web::scope("/comments").configure(comment::config))
                .service(web::scope("/profiles").configure(profile::config)),
        );
}

async fn index(config: web::Data<AppConfig>) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": format!("Hello from {}!", config.app_name) }))
}

#[cfg(test)]
mod tests {
    use actix_web::{middleware, test, web, App};
    use serde_json::{json, Value};

    use super::*;
    use crate::db::memory_db;
    use crate::response::{json_error_handler, path_error_handler, query_error_handler, QUERY_COUNT_HEADER};
    use crate::routes::query_monitor::{query_monitor, PROCESS_TIME_HEADER};
    use crate::seed::{seed_demo_data, SeedPlan};
    use crate::store::Store;

    fn test_config() -> AppConfig {
        AppConfig {
            app_name: "N+1 Query Lab".to_string(),
            environment: "test".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            sqlite_path: String::new(),
            database_url: Some("sqlite::memory:".to_string()),
            log_level: "debug".to_string(),
            seed_demo_data: false,
        }
    }

    macro_rules! test_app {
        ($db:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(test_config()))
                    .app_data(web::Data::new($db))
                    .app_data(web::JsonConfig::default().error_handler(json_error_handler))
                    .app_data(web::QueryConfig::default().error_handler(query_error_handler))
                    .app_data(web::PathConfig::default().error_handler(path_error_handler))
                    .wrap(middleware::from_fn(query_monitor))
                    .configure(config),
            )
            .await
        };
    }

    async fn seeded(plan: SeedPlan) -> sea_orm::DatabaseConnection {
        let db = memory_db().await;
        seed_demo_data(&Store::new(db.clone()), plan).await.unwrap();
        db
    }

    fn header<B>(resp: &actix_web::dev::ServiceResponse<B>, name: &str) -> Option<String> {
        resp.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    #[actix_rt::test]
    async fn index_says_hello() {
        let app = test_app!(memory_db().await);
        let body: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(body, json!({ "message": "Hello from N+1 Query Lab!" }));
    }

    #[actix_rt::test]
    async fn list_reports_query_count_per_strategy() {
        let app = test_app!(seeded(SeedPlan::default()).await);

        let req = test::TestRequest::get()
            .uri("/api/v1/users/?optimized=false&include=posts")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(header(&resp, QUERY_COUNT_HEADER).as_deref(), Some("11"));
        assert!(header(&resp, PROCESS_TIME_HEADER).is_some());
        let naive: Value = test::read_body_json(resp).await;

        let req = test::TestRequest::get()
            .uri("/api/v1/users/?optimized=true&include=posts")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(header(&resp, QUERY_COUNT_HEADER).as_deref(), Some("2"));
        let batch: Value = test::read_body_json(resp).await;

        assert_eq!(naive, batch);
        let users = batch["data"].as_array().unwrap();
        assert_eq!(users.len(), 10);
        for user in users {
            assert_eq!(user["posts"].as_array().unwrap().len(), 3);
            assert!(user.get("profile").is_none());
        }
    }

    #[actix_rt::test]
    async fn list_defaults_to_posts_and_profile() {
        let app = test_app!(seeded(SeedPlan {
            users: 2,
            posts_per_user: 1,
            comments_per_post: 0,
        })
        .await);
        let req = test::TestRequest::get().uri("/api/v1/users/?optimized=true").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(header(&resp, QUERY_COUNT_HEADER).as_deref(), Some("3"));
        let body: Value = test::read_body_json(resp).await;
        let first = &body["data"][0];
        assert_eq!(first["name"], "User 1");
        assert_eq!(first["posts"].as_array().unwrap().len(), 1);
        assert_eq!(first["profile"]["bio"], "Bio for user 1");
    }

    #[actix_rt::test]
    async fn unknown_include_is_invalid_field() {
        let app = test_app!(memory_db().await);
        let req = test::TestRequest::get().uri("/api/v1/users/?include=likes").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 5);
    }

    #[actix_rt::test]
    async fn create_user_validates_and_enforces_unique_email() {
        let app = test_app!(memory_db().await);
        let payload = json!({ "name": "Ada", "email": "ada@example.com" });

        let req = test::TestRequest::post().uri("/api/v1/users/").set_json(&payload).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 0);
        assert_eq!(body["data"]["id"], 1);
        assert_eq!(body["data"]["email"], "ada@example.com");

        let req = test::TestRequest::post().uri("/api/v1/users/").set_json(&payload).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 4);

        let req = test::TestRequest::post()
            .uri("/api/v1/users/")
            .set_json(json!({ "name": "Bob", "email": "not-an-email" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 1);
    }

    #[actix_rt::test]
    async fn bulk_create_rejects_malformed_items() {
        let app = test_app!(memory_db().await);
        let req = test::TestRequest::post()
            .uri("/api/v1/users/bulk")
            .set_json(json!([
                { "name": "Ada", "email": "ada@example.com" },
                { "name": "", "email": "bob@example.com" }
            ]))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 1);

        let req = test::TestRequest::post()
            .uri("/api/v1/users/bulk")
            .set_json(json!([
                { "name": "Ada", "email": "ada@example.com" },
                { "name": "Bob", "email": "bob@example.com" }
            ]))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[actix_rt::test]
    async fn post_for_missing_user_is_constraint_violation() {
        let app = test_app!(memory_db().await);
        let req = test::TestRequest::post()
            .uri("/api/v1/posts/")
            .set_json(json!({ "userId": 404, "title": "orphan", "content": "nobody wrote this" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 4);
    }

    #[actix_rt::test]
    async fn post_requires_title_and_content() {
        let app = test_app!(seeded(SeedPlan {
            users: 1,
            posts_per_user: 0,
            comments_per_post: 0,
        })
        .await);
        let req = test::TestRequest::post()
            .uri("/api/v1/posts/")
            .set_json(json!({ "userId": 1, "title": "no body" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 1);

        let req = test::TestRequest::post()
            .uri("/api/v1/posts/")
            .set_json(json!({ "userId": 1, "title": "  ", "content": "text" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 1);

        let req = test::TestRequest::post()
            .uri("/api/v1/posts/")
            .set_json(json!({ "userId": 1, "title": "hello", "content": "text" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 0);
        assert_eq!(body["data"]["content"], "text");
    }

    #[actix_rt::test]
    async fn unparsable_id_uses_the_envelope() {
        let app = test_app!(memory_db().await);
        let req = test::TestRequest::get().uri("/api/v1/users/99999999999").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], 1);
        assert!(body["data"].is_null());

        let req = test::TestRequest::delete().uri("/api/v1/posts/99999999999").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 1);
    }

    #[actix_rt::test]
    async fn second_profile_is_constraint_violation() {
        let app = test_app!(seeded(SeedPlan {
            users: 1,
            posts_per_user: 0,
            comments_per_post: 0,
        })
        .await);
        let req = test::TestRequest::post()
            .uri("/api/v1/profiles/")
            .set_json(json!({ "userId": 1, "bio": "again", "birthDate": "1990-01-31" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 4);
    }

    #[actix_rt::test]
    async fn projections_only_return_requested_fields() {
        let app = test_app!(seeded(SeedPlan {
            users: 2,
            posts_per_user: 0,
            comments_per_post: 0,
        })
        .await);

        let req = test::TestRequest::get().uri("/api/v1/users/names-only").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(header(&resp, QUERY_COUNT_HEADER).as_deref(), Some("1"));
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"][1], json!({ "id": 2, "name": "User 2" }));

        let req = test::TestRequest::get().uri("/api/v1/users/fields?fields=email").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"][0], json!({ "email": "user1@example.com" }));

        let req = test::TestRequest::get()
            .uri("/api/v1/users/fields?fields=id,createdAt")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let row = body["data"][0].as_object().unwrap();
        assert_eq!(row.len(), 2);
        let created = row["createdAt"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(created).is_ok(), "{}", created);
        assert_eq!(created.split('.').nth(1).map(str::len), Some("123+00:00".len()));

        let req = test::TestRequest::get().uri("/api/v1/users/1").to_request();
        let detail: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(row["createdAt"], detail["data"]["createdAt"]);

        let req = test::TestRequest::get()
            .uri("/api/v1/users/fields?fields=id,password")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 5);

        let req = test::TestRequest::get().uri("/api/v1/users/fields").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 5);
    }

    #[actix_rt::test]
    async fn post_count_includes_users_without_posts() {
        let db = seeded(SeedPlan {
            users: 2,
            posts_per_user: 2,
            comments_per_post: 1,
        })
        .await;
        let app = test_app!(db);
        let req = test::TestRequest::post()
            .uri("/api/v1/users/")
            .set_json(json!({ "name": "New", "email": "new@example.com" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let new_id = body["data"]["id"].clone();

        let req = test::TestRequest::get().uri("/api/v1/users/stats/post-count").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(header(&resp, QUERY_COUNT_HEADER).as_deref(), Some("1"));
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["data"],
            json!([
                { "id": 1, "name": "User 1", "email": "user1@example.com", "postCount": 2 },
                { "id": 2, "name": "User 2", "email": "user2@example.com", "postCount": 2 },
                { "id": new_id, "name": "New", "email": "new@example.com", "postCount": 0 }
            ])
        );

        let req = test::TestRequest::get()
            .uri("/api/v1/users/stats/count?relation=posts")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"][2], json!({ "id": new_id, "count": 0 }));

        let req = test::TestRequest::get()
            .uri("/api/v1/posts/stats/count?relation=comments")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 4);
        assert!(body["data"].as_array().unwrap().iter().all(|c| c["count"] == 1));
    }

    #[actix_rt::test]
    async fn delete_user_cascades_to_posts() {
        let app = test_app!(seeded(SeedPlan {
            users: 2,
            posts_per_user: 2,
            comments_per_post: 1,
        })
        .await);

        let req = test::TestRequest::delete().uri("/api/v1/users/1").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 0);

        let req = test::TestRequest::get().uri("/api/v1/users/1?include=posts").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 0);
        assert!(body["data"].is_null());

        let req = test::TestRequest::get().uri("/api/v1/posts/?optimized=true").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let posts = body["data"].as_array().unwrap();
        assert_eq!(posts.len(), 2);
        assert!(posts.iter().all(|p| p["userId"] == 2));

        let req = test::TestRequest::delete().uri("/api/v1/users/1").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 3);
    }

    #[actix_rt::test]
    async fn update_user_changes_fields() {
        let app = test_app!(seeded(SeedPlan {
            users: 2,
            posts_per_user: 0,
            comments_per_post: 0,
        })
        .await);
        let req = test::TestRequest::put()
            .uri("/api/v1/users/1")
            .set_json(json!({ "name": "Renamed" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["name"], "Renamed");
        assert_eq!(body["data"]["email"], "user1@example.com");

        let req = test::TestRequest::put()
            .uri("/api/v1/users/1")
            .set_json(json!({ "email": "user2@example.com" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 4);

        let req = test::TestRequest::put()
            .uri("/api/v1/users/77")
            .set_json(json!({ "name": "Ghost" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 3);
    }

    #[actix_rt::test]
    async fn comment_and_post_detail() {
        let app = test_app!(seeded(SeedPlan {
            users: 2,
            posts_per_user: 1,
            comments_per_post: 0,
        })
        .await);
        let req = test::TestRequest::post()
            .uri("/api/v1/comments/")
            .set_json(json!({ "postId": 1, "userId": 2, "content": "hello" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["postId"], 1);

        let req = test::TestRequest::post()
            .uri("/api/v1/comments/")
            .set_json(json!({ "postId": 9, "userId": 2, "content": "hello" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], 4);

        let req = test::TestRequest::get()
            .uri("/api/v1/posts/1?include=comments")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(header(&resp, QUERY_COUNT_HEADER).as_deref(), Some("2"));
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["comments"][0]["content"], "hello");
        assert_eq!(body["data"]["comments"][0]["userId"], 2);
    }
}
