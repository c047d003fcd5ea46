use actix_web::{web, HttpResponse};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::error::AppError;
use crate::response::counted;
use crate::routes::dto::{check_length, to_profile_dto, AVATAR_URL_MAX_LEN};
use crate::store::{NewProfile, Store};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::post().to(create)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateProfileRequest {
    user_id: Option<i32>,
    bio: Option<String>,
    avatar_url: Option<String>,
    birth_date: Option<NaiveDate>,
}

async fn create(
    db: web::Data<DatabaseConnection>,
    payload: web::Json<CreateProfileRequest>,
) -> Result<HttpResponse, AppError> {
    let payload = payload.into_inner();
    let user_id = payload
        .user_id
        .ok_or_else(|| AppError::param_error("userId cannot be null"))?;
    if let Some(url) = payload.avatar_url.as_deref() {
        check_length(url, "avatarUrl", AVATAR_URL_MAX_LEN)?;
    }

    let store = Store::new(db.get_ref().clone());
    let profile = store
        .create_profile(NewProfile {
            user_id,
            bio: payload.bio,
            avatar_url: payload.avatar_url,
            birth_date: payload.birth_date,
        })
        .await?;
    Ok(counted(&store, Some(to_profile_dto(profile))))
}
