use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docforge_core::DocforgeError;

/// Unified error type for HTTP responses. Responses carry a JSON body of
/// `{"error": message, "code": CODE}` so clients can branch on the code
/// without parsing prose.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = if let Some(e) = self.0.downcast_ref::<DocforgeError>() {
            match e {
                DocforgeError::ConcurrentExecution { .. } => {
                    (StatusCode::CONFLICT, "CONCURRENT_EXECUTION")
                }
                DocforgeError::InvalidStageOrder { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_STAGE_ORDER")
                }
                DocforgeError::ProjectNotFound(_)
                | DocforgeError::ExecutionNotFound(_)
                | DocforgeError::DocumentNotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                // A rejected transition outside the cancel race means the
                // ledger saw an illegal status move. Clients cannot repair
                // it, so it reports as a server-side invariant failure.
                DocforgeError::InvalidTransition { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INVALID_TRANSITION")
                }
                DocforgeError::NotInitialized
                | DocforgeError::InvalidStage(_)
                | DocforgeError::InvalidStageName(_)
                | DocforgeError::InvalidDocumentKind(_)
                | DocforgeError::InvalidProjectStatus(_)
                | DocforgeError::InvalidEpicNumber(_)
                | DocforgeError::EpicOnPrimaryKind => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                DocforgeError::Storage(_)
                | DocforgeError::Io(_)
                | DocforgeError::Yaml(_)
                | DocforgeError::Json(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
            }
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL")
        };

        let body = serde_json::json!({ "error": self.0.to_string(), "code": code });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn status_of(err: DocforgeError) -> StatusCode {
        AppError(err.into()).into_response().status()
    }

    #[test]
    fn concurrent_execution_maps_to_409() {
        let err = DocforgeError::ConcurrentExecution {
            project_id: Uuid::new_v4(),
        };
        assert_eq!(status_of(err), StatusCode::CONFLICT);
    }

    #[test]
    fn invalid_stage_order_maps_to_422() {
        let err = DocforgeError::InvalidStageOrder {
            requested: 3,
            current_step: 1,
        };
        assert_eq!(status_of(err), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn project_not_found_maps_to_404() {
        assert_eq!(
            status_of(DocforgeError::ProjectNotFound(Uuid::new_v4())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn document_not_found_maps_to_404() {
        let err = DocforgeError::DocumentNotFound {
            project_id: Uuid::new_v4(),
            kind: "architecture".into(),
        };
        assert_eq!(status_of(err), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_transition_maps_to_500() {
        let err = DocforgeError::InvalidTransition {
            correlation_id: Uuid::new_v4(),
            from: "completed".into(),
            to: "running".into(),
        };
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn invalid_stage_maps_to_400() {
        assert_eq!(status_of(DocforgeError::InvalidStage(9)), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_initialized_maps_to_400() {
        assert_eq!(status_of(DocforgeError::NotInitialized), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn storage_maps_to_500() {
        assert_eq!(
            status_of(DocforgeError::Storage("corrupt page".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn non_docforge_error_maps_to_500() {
        let err = AppError(anyhow::anyhow!("something unexpected"));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn response_body_is_json_with_code() {
        let err = AppError(
            DocforgeError::ConcurrentExecution {
                project_id: Uuid::new_v4(),
            }
            .into(),
        );
        let response = err.into_response();
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(ct.to_str().unwrap().contains("application/json"));
    }
}
