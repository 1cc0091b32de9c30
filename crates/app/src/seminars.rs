use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;

use seminar_hub_core::types::{
    Category, DeleteConfirmation, SeminarDetails, SeminarDraft, SeminarForm, SeminarSummary,
};

use crate::auth::CurrentUser;
use crate::problem::ProblemResponse;
use crate::router::AppState;

const LIST_PATH: &str = "/seminars";
const JOINED_PATH: &str = "/seminars/joined";

#[derive(Debug, Serialize)]
pub struct CreatedSeminar {
    id: String,
}

pub async fn categories(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
) -> Result<Json<Vec<Category>>, ProblemResponse> {
    Ok(Json(state.service().list_categories().await?))
}

pub async fn list_all(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
) -> Result<Json<Vec<SeminarSummary>>, ProblemResponse> {
    Ok(Json(state.service().list_all().await?))
}

pub async fn joined(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<SeminarSummary>>, ProblemResponse> {
    Ok(Json(state.service().list_joined(&user).await?))
}

pub async fn details(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<SeminarDetails>, ProblemResponse> {
    Ok(Json(state.service().get_details(&id).await?))
}

pub async fn create_form(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
) -> Result<Json<SeminarForm>, ProblemResponse> {
    Ok(Json(state.service().create_form().await?))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<SeminarDraft>, JsonRejection>,
) -> Result<Response, ProblemResponse> {
    let Json(draft) = payload?;
    let id = state.service().create(&user, draft).await?;
    let location = format!("{LIST_PATH}/{id}");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(CreatedSeminar { id }),
    )
        .into_response())
}

pub async fn edit_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<SeminarForm>, ProblemResponse> {
    Ok(Json(state.service().edit_form(&id, &user).await?))
}

pub async fn edit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<SeminarDraft>, JsonRejection>,
) -> Result<Redirect, ProblemResponse> {
    let Json(draft) = payload?;
    state.service().edit(&id, &user, draft).await?;
    Ok(Redirect::to(LIST_PATH))
}

pub async fn delete_confirmation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteConfirmation>, ProblemResponse> {
    Ok(Json(state.service().delete_confirmation(&id, &user).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Redirect, ProblemResponse> {
    state.service().delete(&id, &user).await?;
    Ok(Redirect::to(LIST_PATH))
}

pub async fn join(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Redirect, ProblemResponse> {
    state.service().join(&id, &user).await?;
    Ok(Redirect::to(JOINED_PATH))
}

pub async fn leave(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Redirect, ProblemResponse> {
    state.service().leave(&id, &user).await?;
    Ok(Redirect::to(LIST_PATH))
}
