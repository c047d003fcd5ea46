use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::entity::post;
use crate::error::AppError;
use crate::fetch::{self, Relation, Strategy};
use crate::response::counted;
use crate::routes::dto::{
    check_length, required_text, to_post_dto, to_post_with_relations, CountDto, CountQuery, FetchQuery,
    TITLE_MAX_LEN,
};
use crate::store::{Kind, NewPost, PostChanges, Store};

const DEFAULT_INCLUDE: &str = "comments";

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/")
            .route(web::get().to(list))
            .route(web::post().to(create)),
    )
    .service(web::resource("/stats/count").route(web::get().to(relation_count)))
    .service(
        web::resource("/{id:\\d+}")
            .route(web::get().to(detail))
            .route(web::put().to(update))
            .route(web::delete().to(remove)),
    );
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostRequest {
    user_id: Option<i32>,
    title: Option<String>,
    content: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePostRequest {
    title: Option<String>,
    content: Option<String>,
}

async fn list(
    db: web::Data<DatabaseConnection>,
    query: web::Query<FetchQuery>,
) -> Result<HttpResponse, AppError> {
    let relations = Relation::parse_list(Kind::Post, query.include.as_deref().unwrap_or(DEFAULT_INCLUDE))?;
    let strategy = Strategy::from_optimized(query.optimized.unwrap_or(false));

    let store = Store::new(db.get_ref().clone());
    let posts = fetch::fetch::<post::Entity>(&store, strategy, &relations).await?;
    let list = posts.into_iter().map(to_post_with_relations).collect::<Vec<_>>();
    Ok(counted(&store, Some(list)))
}

async fn create(
    db: web::Data<DatabaseConnection>,
    payload: web::Json<CreatePostRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = payload
        .user_id
        .ok_or_else(|| AppError::param_error("userId cannot be null"))?;
    let input = NewPost {
        user_id,
        title: required_text(payload.title.as_deref(), "title", TITLE_MAX_LEN)?,
        content: required_text(payload.content.as_deref(), "content", usize::MAX)?,
    };

    let store = Store::new(db.get_ref().clone());
    let post = store.create_post(input).await?;
    Ok(counted(&store, Some(to_post_dto(post))))
}

async fn detail(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    query: web::Query<FetchQuery>,
) -> Result<HttpResponse, AppError> {
    let relations = Relation::parse_list(Kind::Post, query.include.as_deref().unwrap_or_default())?;
    let store = Store::new(db.get_ref().clone());
    let post = fetch::fetch_one::<post::Entity>(&store, *path, &relations).await?;
    Ok(counted(&store, post.map(to_post_with_relations)))
}

async fn update(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    payload: web::Json<UpdatePostRequest>,
) -> Result<HttpResponse, AppError> {
    let mut changes = PostChanges {
        title: None,
        content: payload.content.clone(),
    };
    if let Some(title) = payload.title.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        check_length(title, "title", TITLE_MAX_LEN)?;
        changes.title = Some(title.to_string());
    }

    let store = Store::new(db.get_ref().clone());
    let post = store.update_post(*path, changes).await?;
    Ok(counted(&store, Some(to_post_dto(post))))
}

async fn remove(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let store = Store::new(db.get_ref().clone());
    store.delete::<post::Entity>(*path).await?;
    Ok(counted::<()>(&store, None))
}

async fn relation_count(
    db: web::Data<DatabaseConnection>,
    query: web::Query<CountQuery>,
) -> Result<HttpResponse, AppError> {
    let relation = Relation::parse(Kind::Post, query.relation.as_deref().unwrap_or(DEFAULT_INCLUDE))?;
    let store = Store::new(db.get_ref().clone());
    let counts = fetch::count_related(&store, relation).await?;
    let list = counts
        .into_iter()
        .map(|(id, count)| CountDto { id, count })
        .collect::<Vec<_>>();
    Ok(counted(&store, Some(list)))
}
