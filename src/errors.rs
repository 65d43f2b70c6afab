use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Booking date cannot be in the past")]
    PastDate,

    #[error("This time slot is already booked. Please choose another time.")]
    SlotConflict,

    #[error("{0}")]
    NotFound(String),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    #[error("unauthorized")]
    Unauthorized,

    #[error("Too many requests. Please try again later.")]
    RateLimited,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PastDate => StatusCode::BAD_REQUEST,
            AppError::SlotConflict => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Storage details stay in the log.
        let message = match &self {
            AppError::Storage(e) => {
                tracing::error!(error = %format!("{e:#}"), "storage failure");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = serde_json::json!({ "success": false, "error": message });
        (status, axum::Json(body)).into_response()
    }
}

/// Delivery failures from a notifier. Never converted into [`AppError`]:
/// callers log these and carry on.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("email service not configured")]
    NotConfigured,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("email service rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_client_errors_map_to_400() {
        for err in [
            AppError::Validation("Required fields are missing".to_string()),
            AppError::PastDate,
            AppError::SlotConflict,
        ] {
            let res = err.into_response();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
            let json = body_json(res).await;
            assert_eq!(json["success"], false);
            assert!(json["error"].as_str().unwrap().len() > 5);
        }
    }

    #[tokio::test]
    async fn test_storage_error_hides_detail() {
        let err = AppError::Storage(anyhow::anyhow!("disk I/O error at page 42"));
        let res = err.into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(res).await;
        assert_eq!(json["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_not_found_and_rate_limit() {
        let res = AppError::NotFound("Booking not found".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(res).await["error"], "Booking not found");

        let res = AppError::RateLimited.into_response();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
