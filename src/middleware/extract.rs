use axum::{
    async_trait,
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Multipart, Path, Query, Request,
    },
    http::{request::Parts, StatusCode},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// `Json<T>` whose rejections use the API error envelope
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection_to_error(rejection)),
        }
    }
}

/// `Query<T>` whose rejections use the API error envelope
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(QueryParams(value)),
            Err(rejection) => Err(query_rejection_to_error(rejection)),
        }
    }
}

/// `Path<T>` whose rejections use the API error envelope
pub struct PathParam<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for PathParam<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(PathParam(value)),
            Err(rejection) => Err(path_rejection_to_error(rejection)),
        }
    }
}

/// `Multipart` whose rejections use the API error envelope
pub struct MultipartForm(pub Multipart);

#[async_trait]
impl<S> FromRequest<S> for MultipartForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Multipart::from_request(request, state).await {
            Ok(multipart) => Ok(MultipartForm(multipart)),
            Err(rejection) => Err(multipart_rejection_to_error(rejection)),
        }
    }
}

fn json_rejection_to_error(rejection: JsonRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::payload_too_large("Request body too large");
    }
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::bad_request("Expected request with `Content-Type: application/json`")
        }
        other => ApiError::bad_request(format!("Invalid JSON body: {}", other.body_text())),
    }
}

fn query_rejection_to_error(rejection: QueryRejection) -> ApiError {
    ApiError::bad_request(format!("Invalid query string: {}", rejection.body_text()))
}

fn path_rejection_to_error(rejection: PathRejection) -> ApiError {
    match rejection {
        PathRejection::MissingPathParams(e) => {
            tracing::error!("Route is missing path parameters: {}", e);
            ApiError::internal_server_error("Route is misconfigured")
        }
        other => ApiError::bad_request(format!("Invalid path parameter: {}", other.body_text())),
    }
}

fn multipart_rejection_to_error(rejection: MultipartRejection) -> ApiError {
    ApiError::bad_request(format!("Invalid multipart body: {}", rejection.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::response::IntoResponse;

    use crate::filter::ListQuery;

    async fn query_from(uri: &str) -> Result<QueryParams<ListQuery>, ApiError> {
        let (mut parts, _) = Request::builder().uri(uri).body(Body::empty()).unwrap().into_parts();
        QueryParams::<ListQuery>::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn well_formed_query_strings_deserialize() {
        let QueryParams(query) = query_from("/api/courses?page=2&search=rust").await.unwrap();
        assert_eq!(query.page, Some(2));
        assert_eq!(query.search.as_deref(), Some("rust"));
    }

    #[tokio::test]
    async fn bad_query_strings_use_the_error_envelope() {
        let err = match query_from("/api/courses?page=abc").await {
            Err(err) => err,
            Ok(_) => panic!("page=abc should be rejected"),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn non_multipart_bodies_use_the_error_envelope() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/uploads/images")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let err = match MultipartForm::from_request(request, &()).await {
            Err(err) => err,
            Ok(_) => panic!("a JSON body is not multipart"),
        };
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_json()["error"], "BAD_REQUEST");
    }
}
