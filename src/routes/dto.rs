use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::entity::{comment, post, profile, user};
use crate::error::AppError;
use crate::fetch::{camel_case, Loaded, Related};
use crate::store::{NewUser, UserPostCount};

pub const NAME_MAX_LEN: usize = 100;
pub const EMAIL_MAX_LEN: usize = 100;
pub const TITLE_MAX_LEN: usize = 200;
pub const AVATAR_URL_MAX_LEN: usize = 500;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDto {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDto {
    pub id: i32,
    pub post_id: i32,
    pub user_id: i32,
    pub content: String,
    pub created_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub id: i32,
    pub user_id: i32,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

/// A parent plus whichever relations were requested; absent keys were not asked for.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithRelationsDto {
    #[serde(flatten)]
    pub user: UserDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posts: Option<Vec<PostDto>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<CommentDto>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Option<ProfileDto>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostWithRelationsDto {
    #[serde(flatten)]
    pub post: PostDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<CommentDto>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountDto {
    pub id: i32,
    pub count: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCountDto {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub post_count: i64,
}

#[derive(Deserialize)]
pub struct FetchQuery {
    pub optimized: Option<bool>,
    pub include: Option<String>,
}

#[derive(Deserialize)]
pub struct CountQuery {
    pub relation: Option<String>,
}

#[derive(Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

pub fn to_user_dto(model: user::Model) -> UserDto {
    UserDto {
        id: model.id,
        name: model.name,
        email: model.email,
        created_at: to_rfc3339(model.created_at),
        updated_at: to_rfc3339(model.updated_at),
    }
}

pub fn to_post_dto(model: post::Model) -> PostDto {
    PostDto {
        id: model.id,
        user_id: model.user_id,
        title: model.title,
        content: model.content,
        created_at: to_rfc3339(model.created_at),
        updated_at: to_rfc3339(model.updated_at),
    }
}

pub fn to_comment_dto(model: comment::Model) -> CommentDto {
    CommentDto {
        id: model.id,
        post_id: model.post_id,
        user_id: model.user_id,
        content: model.content,
        created_at: to_rfc3339(model.created_at),
    }
}

pub fn to_profile_dto(model: profile::Model) -> ProfileDto {
    ProfileDto {
        id: model.id,
        user_id: model.user_id,
        bio: model.bio,
        avatar_url: model.avatar_url,
        birth_date: model.birth_date,
    }
}

pub fn to_post_count_dto(row: UserPostCount) -> PostCountDto {
    PostCountDto {
        id: row.id,
        name: row.name,
        email: row.email,
        post_count: row.post_count,
    }
}

/// Renames projected columns to camelCase and renders `*_at` timestamps like the other DTOs.
pub fn to_projection_row(row: Map<String, JsonValue>) -> Map<String, JsonValue> {
    row.into_iter()
        .map(|(column, value)| {
            let key = camel_case(&column);
            let value = match value {
                JsonValue::String(text) if key.ends_with("At") => {
                    match DateTime::parse_from_rfc3339(&text) {
                        Ok(dt) => JsonValue::String(to_rfc3339(dt.with_timezone(&Utc))),
                        Err(_) => JsonValue::String(text),
                    }
                }
                other => other,
            };
            (key, value)
        })
        .collect()
}

pub fn to_user_with_relations(loaded: Loaded<user::Model>) -> UserWithRelationsDto {
    let mut dto = UserWithRelationsDto {
        user: to_user_dto(loaded.parent),
        posts: None,
        comments: None,
        profile: None,
    };
    for related in loaded.related.into_values() {
        match related {
            Related::Posts(rows) => dto.posts = Some(rows.into_iter().map(to_post_dto).collect()),
            Related::Comments(rows) => {
                dto.comments = Some(rows.into_iter().map(to_comment_dto).collect())
            }
            Related::Profile(row) => dto.profile = Some(row.map(to_profile_dto)),
        }
    }
    dto
}

pub fn to_post_with_relations(loaded: Loaded<post::Model>) -> PostWithRelationsDto {
    let mut dto = PostWithRelationsDto {
        post: to_post_dto(loaded.parent),
        comments: None,
    };
    for related in loaded.related.into_values() {
        if let Related::Comments(rows) = related {
            dto.comments = Some(rows.into_iter().map(to_comment_dto).collect());
        }
    }
    dto
}

fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, false)
}

/// Non-empty after trimming and at most `max` characters.
pub fn required_text(value: Option<&str>, field: &str, max: usize) -> Result<String, AppError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(AppError::param_error(format!("{} cannot be null", field)));
    }
    check_length(value, field, max)?;
    Ok(value.to_string())
}

pub fn check_length(value: &str, field: &str, max: usize) -> Result<(), AppError> {
    if value.chars().count() > max {
        return Err(AppError::param_error(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

pub fn valid_email(value: Option<&str>) -> Result<String, AppError> {
    let email = required_text(value, "email", EMAIL_MAX_LEN)?;
    let regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_err(|_| AppError::system_exception())?;
    if !regex.is_match(&email) {
        return Err(AppError::param_error("email is not valid"));
    }
    Ok(email)
}

pub fn validate_new_user(req: &UserRequest) -> Result<NewUser, AppError> {
    Ok(NewUser {
        name: required_text(req.name.as_deref(), "name", NAME_MAX_LEN)?,
        email: valid_email(req.email.as_deref())?,
    })
}
