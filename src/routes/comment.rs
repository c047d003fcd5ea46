use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::error::AppError;
use crate::response::counted;
use crate::routes::dto::{required_text, to_comment_dto};
use crate::store::{NewComment, Store};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::post().to(create)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCommentRequest {
    post_id: Option<i32>,
    user_id: Option<i32>,
    content: Option<String>,
}

async fn create(
    db: web::Data<DatabaseConnection>,
    payload: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse, AppError> {
    let post_id = payload
        .post_id
        .ok_or_else(|| AppError::param_error("postId cannot be null"))?;
    let user_id = payload
        .user_id
        .ok_or_else(|| AppError::param_error("userId cannot be null"))?;
    let content = required_text(payload.content.as_deref(), "content", usize::MAX)?;

    let store = Store::new(db.get_ref().clone());
    let comment = store
        .create_comment(NewComment {
            post_id,
            user_id,
            content,
        })
        .await?;
    Ok(counted(&store, Some(to_comment_dto(comment))))
}
