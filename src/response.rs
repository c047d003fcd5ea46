use actix_web::{
    error::{JsonPayloadError, PathError, QueryPayloadError},
    HttpRequest, HttpResponse,
};
use serde::Serialize;

use crate::error::AppError;
use crate::store::Store;

pub const QUERY_COUNT_HEADER: &str = "x-query-count";

#[derive(Serialize)]
pub struct ResponseDto<T: Serialize> {
    pub data: Option<T>,
    pub code: i32,
    pub msg: String,
}

impl<T: Serialize> ResponseDto<T> {
    pub fn success(data: Option<T>) -> Self {
        Self {
            data,
            code: 0,
            msg: "".to_string(),
        }
    }
}

/// Success envelope plus the number of store operations the handler issued.
pub fn counted<T: Serialize>(store: &Store, data: Option<T>) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((QUERY_COUNT_HEADER, store.operation_count().to_string()))
        .json(ResponseDto::success(data))
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let app_err = match err {
        JsonPayloadError::Deserialize(e) => AppError::param_error(format!("invalid request body: {}", e)),
        _ => AppError::param_error("invalid request body"),
    };
    app_err.into()
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::param_error(format!("invalid query string: {}", err)).into()
}

pub fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    AppError::param_error(format!("invalid path: {}", err)).into()
}

pub fn response_from_error(err: &AppError) -> HttpResponse {
    HttpResponse::Ok().json(ResponseDto::<()> {
        data: None,
        code: err.code(),
        msg: err.msg(),
    })
}
