use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use serde::Deserialize;
use common::types::{Listing, Message};
use service::users::{LoginInput, NewUser, PublicUser, User, UserPatch};

use crate::errors::JsonApiError;
use crate::state::ServerState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub name: Option<String>,
    pub email: Option<String>,
}

fn public(users: Vec<User>) -> Listing<PublicUser> {
    users.into_iter().map(PublicUser::from).collect::<Vec<_>>().into()
}

pub async fn list_users(State(state): State<ServerState>) -> Json<Listing<PublicUser>> {
    Json(public(state.users.find_all().await))
}

/// `GET /users/search?name=..&email=..`
pub async fn search_users(
    State(state): State<ServerState>,
    Query(params): Query<SearchParams>,
) -> Json<Listing<PublicUser>> {
    let found = state
        .users
        .search(params.name.as_deref(), params.email.as_deref())
        .await;
    Json(public(found))
}

pub async fn get_user(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<PublicUser>, JsonApiError> {
    state
        .users
        .find_one(&id)
        .await
        .map(|u| Json(u.into()))
        .ok_or_else(|| JsonApiError::not_found("User not found"))
}

pub async fn register(
    State(state): State<ServerState>,
    Json(input): Json<NewUser>,
) -> Result<(StatusCode, Json<PublicUser>), JsonApiError> {
    input.validate()?;
    let user = state.users.register(input).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// 404 for an unknown email, 401 for a wrong password.
pub async fn login(
    State(state): State<ServerState>,
    Json(input): Json<LoginInput>,
) -> Result<Json<PublicUser>, JsonApiError> {
    input.validate()?;
    if state.users.find_by_email(&input.email).await.is_none() {
        return Err(JsonApiError::not_found("No user exists with the email provided"));
    }
    state
        .users
        .compare_password(&input.email, &input.password)
        .await?
        .map(|u| Json(u.into()))
        .ok_or_else(|| JsonApiError::unauthorized("Incorrect password"))
}

pub async fn update_user(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<PublicUser>, JsonApiError> {
    patch.validate()?;
    state
        .users
        .update(&id, patch)
        .await?
        .map(|u| Json(u.into()))
        .ok_or_else(|| JsonApiError::not_found(format!("No user with id {id}")))
}

pub async fn delete_user(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<Message>, JsonApiError> {
    if state.users.remove(&id).await? {
        Ok(Json(Message::new("User deleted")))
    } else {
        Err(JsonApiError::not_found("User does not exist"))
    }
}
