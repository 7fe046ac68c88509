//! Room directory HTTP API.
//!
//! `GET /rooms` lists every room with its live member count;
//! `POST /rooms` creates one from a JSON body.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use huddle_common::{CreateRoomRequest, RegistryError, RoomSummary};
use serde_json::json;

use crate::registry::{RoomRegistry, RoomSpec};

/// Errors a directory request can produce.
#[derive(Debug)]
pub enum DirectoryError {
    BadRequest(String),
    Internal(String),
}

impl From<RegistryError> for DirectoryError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::InvalidSpec(_) => DirectoryError::BadRequest(err.to_string()),
            other => DirectoryError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for DirectoryError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            DirectoryError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            DirectoryError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(registry: Arc<RoomRegistry>) -> Router {
    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .with_state(registry)
}

pub(crate) async fn list_rooms(State(registry): State<Arc<RoomRegistry>>) -> Json<Vec<RoomSummary>> {
    Json(registry.list_rooms().await)
}

pub(crate) async fn create_room(
    State(registry): State<Arc<RoomRegistry>>,
    body: Result<Json<CreateRoomRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RoomSummary>), DirectoryError> {
    let Json(req) = body.map_err(|e| DirectoryError::BadRequest(e.body_text()))?;
    let room_id = registry.create_room(RoomSpec::from(req)).await?;
    let summary = registry
        .summary(&room_id)
        .await
        .ok_or_else(|| DirectoryError::Internal(format!("room {room_id} vanished after creation")))?;
    tracing::info!(room_id = %room_id, "Room created via directory");
    Ok((StatusCode::CREATED, Json(summary)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RoomPolicy;
    use huddle_common::Visibility;

    fn registry() -> Arc<RoomRegistry> {
        Arc::new(RoomRegistry::new(RoomPolicy::default()))
    }

    #[tokio::test]
    async fn create_then_list() {
        let registry = registry();
        let (status, Json(created)) = create_room(
            State(Arc::clone(&registry)),
            Ok(Json(CreateRoomRequest {
                name: "x".into(),
                ..Default::default()
            })),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.user_count, 0);

        let Json(rooms) = list_rooms(State(registry)).await;
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].name, "x");
        assert_eq!(rooms[0].user_count, 0);
        assert_eq!(rooms[0].id, created.id);
    }

    #[tokio::test]
    async fn create_honors_requested_fields() {
        let (_, Json(created)) = create_room(
            State(registry()),
            Ok(Json(CreateRoomRequest {
                name: "Vault".into(),
                description: Some("quiet".into()),
                capacity: Some(3),
                visibility: Some(Visibility::Private),
            })),
        )
        .await
        .unwrap();
        assert_eq!(created.capacity, 3);
        assert_eq!(created.visibility, Visibility::Private);
        assert_eq!(created.description.as_deref(), Some("quiet"));
    }

    #[tokio::test]
    async fn empty_name_is_bad_request() {
        let err = create_room(State(registry()), Ok(Json(CreateRoomRequest::default())))
            .await
            .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn registry_errors_map_to_status() {
        let bad: DirectoryError = RegistryError::InvalidSpec("x".into()).into();
        assert!(matches!(bad, DirectoryError::BadRequest(_)));
        let other: DirectoryError =
            RegistryError::RoomNotFound(huddle_common::RoomId::from("r")).into();
        assert_eq!(
            other.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
