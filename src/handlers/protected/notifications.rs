// handlers/protected/notifications.rs - in-app notification feed
//
// GET/POST /api/notifications, POST /api/notifications/:id/read,
// DELETE /api/notifications/:id

use mongodb::bson::doc;
use serde_json::{json, Value};

use crate::access::{AccessScope, Resource};
use crate::database::{collections, document_to_json, parse_object_id, Repository};
use crate::error::ApiError;
use crate::filter::{Filter, ListQuery, Page};
use crate::handlers::to_page;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, JsonBody, PathParam, QueryParams};
use crate::models::notification::{with_read_flag, Audience, CreateNotificationRequest};
use crate::models::FieldErrors;
use crate::types::Operation;

/// GET /api/notifications - the caller's feed; `status=unread|read`
pub async fn notifications_list(current: CurrentUser, QueryParams(mut query): QueryParams<ListQuery>) -> ApiResult<Page<Value>> {
    current.access.require(Operation::Read, Resource::Notification)?;
    let me = current.id().to_hex();

    let status = query.status.take();
    let mut filter = Filter::from_query(&query, &["title", "message"])?;
    match status.as_deref() {
        Some("unread") => {
            filter.and_where(doc! { "read_by": { "$ne": &me } });
        }
        Some("read") => {
            filter.and_where(doc! { "read_by": &me });
        }
        Some(other) => {
            return Err(ApiError::bad_request(format!(
                "Unknown notification status '{}'; use 'read' or 'unread'",
                other
            )))
        }
        None => {}
    }
    filter.default_order("-created_at");

    let notifications = Repository::open(collections::NOTIFICATIONS).await?;
    let (documents, total) = notifications
        .select_page(&filter, current.access.notification_feed_filter())
        .await?;
    let documents = documents.into_iter().map(|n| with_read_flag(n, &me)).collect();
    Ok(ApiResponse::success("Notifications", to_page(documents, &filter, total)))
}

/**
 * POST /api/notifications - send to everyone, a franchise, a branch or a user
 *
 * Only global roles broadcast to `all`. Branch staff address their own
 * branch or individual users. Franchise and branch codes of scoped senders
 * are taken from their scope.
 */
pub async fn notifications_create(
    current: CurrentUser,
    JsonBody(payload): JsonBody<CreateNotificationRequest>,
) -> ApiResult<Value> {
    current.access.require(Operation::Create, Resource::Notification)?;
    payload.validate()?;

    let audience = payload.audience;
    match (audience, current.access.scope()) {
        (Audience::All, scope) if !scope.is_global() => {
            return Err(ApiError::forbidden("Only administrators may notify all users"));
        }
        (Audience::Franchise, AccessScope::Branch { .. }) => {
            return Err(ApiError::forbidden("Branch staff may only notify their own branch"));
        }
        _ => {}
    }

    if audience == Audience::User {
        let target = payload.target_user_id.as_deref().unwrap_or_default();
        let users = Repository::open(collections::USERS).await?;
        users
            .select_404(parse_object_id(target)?, current.access.filter_for(Resource::User))
            .await?;
    }

    let mut document = payload.into_document(current.id());
    current.access.stamp(Resource::Notification, &mut document);

    let needs_franchise = matches!(audience, Audience::Franchise | Audience::Branch);
    if needs_franchise && document.get_str("franchise_code").is_err() {
        return Err(FieldErrors::single("franchise_code", "Required for this audience"));
    }
    if audience == Audience::Branch && document.get_str("branch_code").is_err() {
        return Err(FieldErrors::single("branch_code", "Required for this audience"));
    }

    let notifications = Repository::open(collections::NOTIFICATIONS).await?;
    let stored = notifications.insert_one(document).await?;
    tracing::info!("{} sent a notification to audience '{}'", current.user.email, audience.as_str());
    Ok(ApiResponse::created(
        "Notification sent",
        document_to_json(with_read_flag(stored, &current.id().to_hex())),
    ))
}

/// POST /api/notifications/:id/read
pub async fn notification_read(current: CurrentUser, PathParam(id): PathParam<String>) -> ApiResult<Value> {
    current.access.require(Operation::Read, Resource::Notification)?;
    let me = current.id().to_hex();

    let notifications = Repository::open(collections::NOTIFICATIONS).await?;
    let updated = notifications
        .modify_404(
            parse_object_id(&id)?,
            current.access.notification_feed_filter(),
            doc! { "$addToSet": { "read_by": &me } },
        )
        .await?;
    Ok(ApiResponse::success("Notification marked as read", document_to_json(with_read_flag(updated, &me))))
}

/// DELETE /api/notifications/:id
pub async fn notification_delete(current: CurrentUser, PathParam(id): PathParam<String>) -> ApiResult<Value> {
    current.access.require(Operation::Delete, Resource::Notification)?;
    let id = parse_object_id(&id)?;

    let notifications = Repository::open(collections::NOTIFICATIONS).await?;
    notifications
        .delete_404(id, current.access.filter_for(Resource::Notification))
        .await?;
    Ok(ApiResponse::success("Notification deleted", json!({ "id": id.to_hex() })))
}
