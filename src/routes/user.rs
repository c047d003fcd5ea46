use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::entity::user;
use crate::error::AppError;
use crate::fetch::{self, Relation, Strategy};
use crate::response::counted;
use crate::routes::dto::{
    check_length, to_post_count_dto, to_projection_row, to_user_dto, to_user_with_relations, valid_email,
    validate_new_user, CountDto, CountQuery, FetchQuery, UserRequest, NAME_MAX_LEN,
};
use crate::store::{Kind, Store, UserChanges};

/// Relations the list endpoint loads when `include` is not given.
const DEFAULT_INCLUDE: &str = "posts,profile";

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/")
            .route(web::get().to(list))
            .route(web::post().to(create)),
    )
    .service(web::resource("/bulk").route(web::post().to(bulk_create)))
    .service(web::resource("/names-only").route(web::get().to(names_only)))
    .service(web::resource("/fields").route(web::get().to(fields)))
    .service(web::resource("/stats/post-count").route(web::get().to(post_count)))
    .service(web::resource("/stats/count").route(web::get().to(relation_count)))
    .service(
        web::resource("/{id:\\d+}")
            .route(web::get().to(detail))
            .route(web::put().to(update))
            .route(web::delete().to(remove)),
    );
}

#[derive(Deserialize)]
struct FieldsQuery {
    fields: Option<String>,
}

async fn list(
    db: web::Data<DatabaseConnection>,
    query: web::Query<FetchQuery>,
) -> Result<HttpResponse, AppError> {
    let relations = Relation::parse_list(Kind::User, query.include.as_deref().unwrap_or(DEFAULT_INCLUDE))?;
    let strategy = Strategy::from_optimized(query.optimized.unwrap_or(false));

    let store = Store::new(db.get_ref().clone());
    let users = fetch::fetch::<user::Entity>(&store, strategy, &relations).await?;
    let list = users.into_iter().map(to_user_with_relations).collect::<Vec<_>>();
    Ok(counted(&store, Some(list)))
}

async fn create(
    db: web::Data<DatabaseConnection>,
    payload: web::Json<UserRequest>,
) -> Result<HttpResponse, AppError> {
    let input = validate_new_user(&payload)?;
    let store = Store::new(db.get_ref().clone());
    let user = store.create_user(input).await?;
    Ok(counted(&store, Some(to_user_dto(user))))
}

async fn bulk_create(
    db: web::Data<DatabaseConnection>,
    payload: web::Json<Vec<UserRequest>>,
) -> Result<HttpResponse, AppError> {
    if payload.is_empty() {
        return Err(AppError::param_error("users must not be empty"));
    }
    let inputs = payload
        .iter()
        .enumerate()
        .map(|(i, req)| {
            validate_new_user(req).map_err(|e| AppError::param_error(format!("users[{}]: {}", i, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let store = Store::new(db.get_ref().clone());
    let users = store.create_users(inputs).await?;
    let list = users.into_iter().map(to_user_dto).collect::<Vec<_>>();
    Ok(counted(&store, Some(list)))
}

async fn detail(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    query: web::Query<FetchQuery>,
) -> Result<HttpResponse, AppError> {
    let relations = Relation::parse_list(Kind::User, query.include.as_deref().unwrap_or_default())?;
    let store = Store::new(db.get_ref().clone());
    let user = fetch::fetch_one::<user::Entity>(&store, *path, &relations).await?;
    Ok(counted(&store, user.map(to_user_with_relations)))
}

async fn update(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    payload: web::Json<UserRequest>,
) -> Result<HttpResponse, AppError> {
    let mut changes = UserChanges::default();
    if let Some(name) = payload.name.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        check_length(name, "name", NAME_MAX_LEN)?;
        changes.name = Some(name.to_string());
    }
    if payload.email.is_some() {
        changes.email = Some(valid_email(payload.email.as_deref())?);
    }

    let store = Store::new(db.get_ref().clone());
    let user = store.update_user(*path, changes).await?;
    Ok(counted(&store, Some(to_user_dto(user))))
}

async fn remove(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let store = Store::new(db.get_ref().clone());
    store.delete::<user::Entity>(*path).await?;
    Ok(counted::<()>(&store, None))
}

async fn post_count(db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let store = Store::new(db.get_ref().clone());
    let rows = store.user_post_counts().await?;
    let list = rows.into_iter().map(to_post_count_dto).collect::<Vec<_>>();
    Ok(counted(&store, Some(list)))
}

async fn relation_count(
    db: web::Data<DatabaseConnection>,
    query: web::Query<CountQuery>,
) -> Result<HttpResponse, AppError> {
    let name = query
        .relation
        .as_deref()
        .ok_or_else(|| AppError::param_error("relation cannot be null"))?;
    let relation = Relation::parse(Kind::User, name)?;
    let store = Store::new(db.get_ref().clone());
    let counts = fetch::count_related(&store, relation).await?;
    let list = counts
        .into_iter()
        .map(|(id, count)| CountDto { id, count })
        .collect::<Vec<_>>();
    Ok(counted(&store, Some(list)))
}

async fn names_only(db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let store = Store::new(db.get_ref().clone());
    let rows = fetch::project::<user::Entity>(&store, &["id", "name"]).await?;
    let rows = rows.into_iter().map(to_projection_row).collect::<Vec<_>>();
    Ok(counted(&store, Some(rows)))
}

async fn fields(
    db: web::Data<DatabaseConnection>,
    query: web::Query<FieldsQuery>,
) -> Result<HttpResponse, AppError> {
    let fields = query
        .fields
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>();
    let store = Store::new(db.get_ref().clone());
    let rows = fetch::project::<user::Entity>(&store, &fields).await?;
    let rows = rows.into_iter().map(to_projection_row).collect::<Vec<_>>();
    Ok(counted(&store, Some(rows)))
}
