use super::{AppState, ApiError, ClientIdentity};
use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use heisei_core::{
    CancellationToken, CategoryDto, CategoryId, CategoryUpdate, Deadline, NewCategory, NewPost,
    NewThread, Pagination, PostDto, PostId, ThreadDto, ThreadId, ThreadUpdate,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

type ApiResult<T> = Result<T, ApiError>;

/// Thread listing filter
#[derive(Debug, Deserialize)]
pub(crate) struct ThreadFilter {
    category_id: Option<u64>,
}

/// Raw page query
#[derive(Debug, Deserialize)]
pub(crate) struct PageQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

/// Body of `POST /api/posts`
#[derive(Debug, Deserialize)]
pub(crate) struct CreatePostRequest {
    thread_id: ThreadId,
    content: String,
}

/// Body of `PUT /api/posts/:id`
#[derive(Debug, Deserialize)]
pub(crate) struct UpdatePostRequest {
    content: String,
}

/// One page of a thread's posts
#[derive(Debug, Serialize)]
pub(crate) struct PostPage {
    posts: Vec<PostDto>,
    page: u32,
    limit: u32,
    total: u64,
}

/// Fires on the request deadline or on server shutdown, whichever comes first.
struct RequestCancel {
    deadline: Deadline,
    shutdown: Arc<dyn CancellationToken>,
}

#[async_trait]
impl CancellationToken for RequestCancel {
    async fn cancelled(&self) {
        tokio::select! {
            _ = self.deadline.cancelled() => {}
            _ = self.shutdown.cancelled() => {}
        }
    }

    fn is_cancelled(&self) -> bool {
        self.deadline.is_cancelled() || self.shutdown.is_cancelled()
    }
}

pub(crate) async fn health() -> &'static str {
    "OK"
}

pub(crate) async fn list_categories(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<CategoryDto>>> {
    let categories = state.services.categories.list().await?;
    Ok(Json(categories.iter().map(CategoryDto::from).collect()))
}

pub(crate) async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<NewCategory>,
) -> ApiResult<(StatusCode, Json<CategoryDto>)> {
    let category = state.services.categories.create(body).await?;
    Ok((StatusCode::CREATED, Json(CategoryDto::from(&category))))
}

pub(crate) async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<CategoryDto>> {
    let category = state.services.categories.get(CategoryId::new(id)).await?;
    Ok(Json(CategoryDto::from(&category)))
}

pub(crate) async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<CategoryUpdate>,
) -> ApiResult<Json<CategoryDto>> {
    let category = state
        .services
        .categories
        .update(CategoryId::new(id), body)
        .await?;
    Ok(Json(CategoryDto::from(&category)))
}

pub(crate) async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    state.services.categories.delete(CategoryId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn category_threads(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<Vec<ThreadDto>>> {
    let threads = state
        .services
        .threads
        .list(Some(CategoryId::new(id)))
        .await?;
    Ok(Json(threads.iter().map(ThreadDto::from).collect()))
}

pub(crate) async fn list_threads(
    State(state): State<AppState>,
    Query(filter): Query<ThreadFilter>,
) -> ApiResult<Json<Vec<ThreadDto>>> {
    let threads = state
        .services
        .threads
        .list(filter.category_id.map(CategoryId::new))
        .await?;
    Ok(Json(threads.iter().map(ThreadDto::from).collect()))
}

pub(crate) async fn create_thread(
    State(state): State<AppState>,
    Json(body): Json<NewThread>,
) -> ApiResult<(StatusCode, Json<ThreadDto>)> {
    let thread = state.services.threads.create(body).await?;
    Ok((StatusCode::CREATED, Json(ThreadDto::from(&thread))))
}

pub(crate) async fn get_thread(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<ThreadDto>> {
    let thread = state.services.threads.get(ThreadId::new(id)).await?;
    Ok(Json(ThreadDto::from(&thread)))
}

pub(crate) async fn update_thread(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<ThreadUpdate>,
) -> ApiResult<Json<ThreadDto>> {
    let thread = state
        .services
        .threads
        .update(ThreadId::new(id), body)
        .await?;
    Ok(Json(ThreadDto::from(&thread)))
}

pub(crate) async fn delete_thread(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    state.services.threads.delete(ThreadId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn thread_posts(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<PostPage>> {
    let thread_id = ThreadId::new(id);
    let page = Pagination::new(query.page, query.limit);
    let posts = state.services.posts.list_by_thread(thread_id, page).await?;
    let total = state.services.posts.count_by_thread(thread_id).await?;
    Ok(Json(PostPage {
        posts: posts.iter().map(PostDto::from).collect(),
        page: page.page,
        limit: page.limit,
        total,
    }))
}

pub(crate) async fn create_post(
    State(state): State<AppState>,
    Extension(ClientIdentity(author_address)): Extension<ClientIdentity>,
    Json(body): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<PostDto>)> {
    let cancel = RequestCancel {
        deadline: Deadline::after(state.request_timeout),
        shutdown: state.shutdown.clone(),
    };
    let post = state
        .services
        .posts
        .create(
            NewPost {
                thread_id: body.thread_id,
                content: body.content,
                author_address,
            },
            &cancel,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(PostDto::from(&post))))
}

pub(crate) async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<PostDto>> {
    let post = state.services.posts.get(PostId::new(id)).await?;
    Ok(Json(PostDto::from(&post)))
}

pub(crate) async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<UpdatePostRequest>,
) -> ApiResult<Json<PostDto>> {
    let post = state
        .services
        .posts
        .update_content(PostId::new(id), body.content)
        .await?;
    Ok(Json(PostDto::from(&post)))
}

pub(crate) async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    state.services.posts.soft_delete(PostId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
