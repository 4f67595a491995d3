//! Heuristic bot gate for credential endpoints.
//!
//! Automated clients probing login/registration are rejected before any
//! store work happens. Verification is pass/fail; a blocked request never
//! reaches the domain layer.

use axum::{
    extract::Request,
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use isbot::Bots;
use tracing::warn;

use crate::error::AppError;

/// Score a request's headers; >= 100 means "treat as a bot".
fn suspicion_score(headers: &HeaderMap) -> u32 {
    let bots = Bots::default();
    let user_agent = headers
        .get("User-Agent")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if user_agent.is_empty() {
        return 50;
    }

    let mut score = 0;
    if bots.is_bot(user_agent) {
        score += 100;
    }

    // Real browsers send the full Accept-* set; headless scrapers rarely do.
    if user_agent.starts_with("Mozilla/") {
        let missing = ["Accept", "Accept-Language", "Accept-Encoding"]
            .iter()
            .filter(|h| !headers.contains_key(**h))
            .count();
        score += match missing {
            0 => 0,
            1 => 30,
            _ => 70,
        };
    }

    score
}

pub async fn bot_detection_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if request.method() == Method::OPTIONS || request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let score = suspicion_score(&headers);
    if score >= 100 {
        warn!(
            score = %score,
            path = %request.uri(),
            "Blocking suspected bot request"
        );
        return Err(AppError::Forbidden(anyhow::anyhow!("Bot detected")));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn known_crawler_is_blocked() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "User-Agent",
            HeaderValue::from_static("Googlebot/2.1 (+http://www.google.com/bot.html)"),
        );
        assert!(suspicion_score(&headers) >= 100);
    }

    #[test]
    fn browser_with_full_headers_passes() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "User-Agent",
            HeaderValue::from_static("Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0"),
        );
        headers.insert("Accept", HeaderValue::from_static("text/html"));
        headers.insert("Accept-Language", HeaderValue::from_static("en-US"));
        headers.insert("Accept-Encoding", HeaderValue::from_static("gzip"));
        assert!(suspicion_score(&headers) < 100);
    }

    #[test]
    fn missing_user_agent_is_suspicious_but_not_blocked() {
        let headers = HeaderMap::new();
        let score = suspicion_score(&headers);
        assert!(score > 0 && score < 100);
    }
}
