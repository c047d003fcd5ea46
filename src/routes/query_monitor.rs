use std::time::Instant;

use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::{HeaderName, HeaderValue},
    middleware::Next,
    Error,
};
use log::info;

use crate::response::QUERY_COUNT_HEADER;

pub const PROCESS_TIME_HEADER: &str = "x-process-time";

/// Times the request and logs it with the store operation count the handler reported.
pub async fn query_monitor<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<B>, Error>
where
    B: MessageBody,
{
    let started = Instant::now();
    let method = req.method().to_string();
    let path = req.path().to_string();

    let mut res = next.call(req).await?;

    let elapsed = started.elapsed().as_secs_f64();
    let queries = res
        .headers()
        .get(QUERY_COUNT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("0")
        .to_string();
    if let Ok(value) = HeaderValue::from_str(&format!("{:.4}", elapsed)) {
        res.headers_mut()
            .insert(HeaderName::from_static(PROCESS_TIME_HEADER), value);
    }

    info!("{} {} - Time: {:.4}s, Queries: {}", method, path, elapsed, queries);
    Ok(res)
}
