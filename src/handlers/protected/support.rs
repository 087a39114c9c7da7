// handlers/protected/support.rs - support tickets
//
// GET/POST /api/support/tickets, GET /api/support/tickets/:id,
// POST /api/support/tickets/:id/replies, PUT /api/support/tickets/:id/status

use mongodb::bson::{doc, Document};
use serde_json::Value;

use crate::access::Resource;
use crate::database::serialize::now;
use crate::database::{collections, document_to_json, parse_object_id, Repository};
use crate::error::ApiError;
use crate::filter::{Filter, ListQuery, Page};
use crate::handlers::{object_id_of, to_page};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, JsonBody, PathParam, QueryParams};
use crate::models::support::{
    check_transition, status_after_reply, status_change_set, CreateTicketRequest, ReplyRequest, TicketStatus,
    TicketStatusRequest,
};
use crate::types::Operation;

fn ticket_status(ticket: &Document) -> Result<TicketStatus, ApiError> {
    ticket
        .get_str("status")
        .ok()
        .and_then(TicketStatus::parse)
        .ok_or_else(|| ApiError::internal_server_error("Stored ticket has an unknown status"))
}

async fn load_ticket(tickets: &Repository, current: &CurrentUser, id: &str) -> Result<Document, ApiError> {
    let ticket = tickets
        .select_404(parse_object_id(id)?, current.access.filter_for(Resource::SupportTicket))
        .await?;
    Ok(ticket)
}

/// GET /api/support/tickets
pub async fn tickets_list(current: CurrentUser, QueryParams(mut query): QueryParams<ListQuery>) -> ApiResult<Page<Value>> {
    current.access.require(Operation::Read, Resource::SupportTicket)?;

    let status = query.status.take();
    let mut filter = Filter::from_query(&query, &["subject", "ticket_number"])?;
    if let Some(status) = status {
        let status = TicketStatus::parse(&status)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown ticket status '{}'", status)))?;
        filter.and_where(doc! { "status": status.as_str() });
    }
    filter.default_order("-created_at");

    let tickets = Repository::open(collections::SUPPORT_TICKETS).await?;
    let (documents, total) = tickets
        .select_page(&filter, current.access.filter_for(Resource::SupportTicket))
        .await?;
    Ok(ApiResponse::success("Support tickets", to_page(documents, &filter, total)))
}

/// POST /api/support/tickets
pub async fn tickets_create(current: CurrentUser, JsonBody(payload): JsonBody<CreateTicketRequest>) -> ApiResult<Value> {
    current.access.require(Operation::Create, Resource::SupportTicket)?;
    payload.validate()?;

    let mut document = payload.into_document(current.id());
    current.access.stamp(Resource::SupportTicket, &mut document);

    let tickets = Repository::open(collections::SUPPORT_TICKETS).await?;
    let stored = tickets.insert_one(document).await?;
    tracing::info!(
        "{} opened ticket {}",
        current.user.email,
        stored.get_str("ticket_number").unwrap_or_default()
    );
    Ok(ApiResponse::created("Support ticket created", document_to_json(stored)))
}

/// GET /api/support/tickets/:id
pub async fn ticket_get(current: CurrentUser, PathParam(id): PathParam<String>) -> ApiResult<Value> {
    current.access.require(Operation::Read, Resource::SupportTicket)?;
    let tickets = Repository::open(collections::SUPPORT_TICKETS).await?;
    let ticket = load_ticket(&tickets, &current, &id).await?;
    Ok(ApiResponse::success("Support ticket", document_to_json(ticket)))
}

/// POST /api/support/tickets/:id/replies - a staff reply moves an open ticket
/// to in_progress
pub async fn ticket_reply(
    current: CurrentUser,
    PathParam(id): PathParam<String>,
    JsonBody(payload): JsonBody<ReplyRequest>,
) -> ApiResult<Value> {
    current.access.require(Operation::Update, Resource::SupportTicket)?;
    payload.validate()?;

    let tickets = Repository::open(collections::SUPPORT_TICKETS).await?;
    let ticket = load_ticket(&tickets, &current, &id).await?;
    let next = status_after_reply(ticket_status(&ticket)?, current.role())?;

    let mut set = doc! { "updated_at": now() };
    if let Some(next) = next {
        set.insert("status", next.as_str());
    }
    let reply = payload.into_reply(current.id(), current.role());
    let updated = tickets
        .modify_404(
            object_id_of(&ticket)?,
            current.access.filter_for(Resource::SupportTicket),
            doc! { "$push": { "replies": reply }, "$set": set },
        )
        .await?;
    Ok(ApiResponse::created("Reply added", document_to_json(updated)))
}

/// PUT /api/support/tickets/:id/status
pub async fn ticket_status_put(
    current: CurrentUser,
    PathParam(id): PathParam<String>,
    JsonBody(payload): JsonBody<TicketStatusRequest>,
) -> ApiResult<Value> {
    current.access.require(Operation::Update, Resource::SupportTicket)?;

    let tickets = Repository::open(collections::SUPPORT_TICKETS).await?;
    let ticket = load_ticket(&tickets, &current, &id).await?;
    let next = payload.status;
    check_transition(current.role(), ticket_status(&ticket)?, next)?;

    let set = status_change_set(next);
    let updated = tickets
        .update_404(object_id_of(&ticket)?, current.access.filter_for(Resource::SupportTicket), set)
        .await?;
    tracing::info!("{} moved ticket {} to {}", current.user.email, id, next.as_str());
    Ok(ApiResponse::success("Ticket status updated", document_to_json(updated)))
}
