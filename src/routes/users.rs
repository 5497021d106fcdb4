use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{State, delete, get, patch, post};

use crate::auth::{Authorized, CanGetUsers, CanManageUsers};
use crate::error::ApiResult;
use crate::models::{MessageResponse, PaginatedResponse, UserResponse, UserSummary};
use crate::routes::params::{ListUsersParams, parse_user_id};
use crate::users::{CreateUserRequest, UpdateUserRequest, UserService};

#[get("/users?<params..>")]
pub async fn list_users(
    users: &State<UserService>,
    _caller: Authorized<CanGetUsers>,
    params: ListUsersParams,
) -> ApiResult<Json<PaginatedResponse<UserSummary>>> {
    let query = params.into_query();
    let (page, total) = users.list(&query).await?;
    let results = page.iter().map(UserSummary::from).collect();

    Ok(Json(PaginatedResponse::success(
        "Get all users successfully",
        results,
        &query,
        total,
    )))
}

#[post("/users", data = "<payload>")]
pub async fn create_user(
    users: &State<UserService>,
    _caller: Authorized<CanManageUsers>,
    payload: Json<CreateUserRequest>,
) -> ApiResult<status::Custom<Json<UserResponse>>> {
    let user = users.create(payload.into_inner()).await?;

    Ok(status::Custom(
        Status::Created,
        Json(UserResponse::success("Create user successfully", &user)),
    ))
}

#[get("/users/<user_id>")]
pub async fn get_user(
    users: &State<UserService>,
    user_id: &str,
    _caller: Authorized<CanGetUsers>,
) -> ApiResult<Json<UserResponse>> {
    let user = users.get(parse_user_id(user_id)?).await?;
    Ok(Json(UserResponse::success("Get user successfully", &user)))
}

#[patch("/users/<user_id>", data = "<payload>")]
pub async fn update_user(
    users: &State<UserService>,
    user_id: &str,
    _caller: Authorized<CanManageUsers>,
    payload: Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user = users
        .update(parse_user_id(user_id)?, payload.into_inner())
        .await?;
    Ok(Json(UserResponse::success("Update user successfully", &user)))
}

#[delete("/users/<user_id>")]
pub async fn delete_user(
    users: &State<UserService>,
    user_id: &str,
    _caller: Authorized<CanManageUsers>,
) -> ApiResult<Json<MessageResponse>> {
    users.delete(parse_user_id(user_id)?).await?;
    Ok(Json(MessageResponse::success("Delete user successfully")))
}
