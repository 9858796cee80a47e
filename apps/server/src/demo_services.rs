//! Sample `UserService` registered by the server binary.

use rpcguard_application::{HandlerMap, RpcCall, handler_fn};
use rpcguard_core::{AppError, AppResult};
use serde_json::{Value, json};

pub const USER_SERVICE: &str = "UserService";

pub fn user_service() -> HandlerMap {
    HandlerMap::from([
        ("getUser".to_owned(), handler_fn(get_user)),
        ("ping".to_owned(), handler_fn(ping)),
    ])
}

async fn get_user(call: RpcCall) -> AppResult<Value> {
    let Some(user_id) = call.payload.get("id").and_then(Value::as_u64) else {
        return Err(AppError::Validation(
            "getUser requires a numeric 'id'".to_owned(),
        ));
    };

    Ok(json!({
        "id": user_id,
        "name": format!("user-{user_id}"),
        "requested_by": call.caller().map(|caller| caller.name()),
    }))
}

async fn ping(_call: RpcCall) -> AppResult<Value> {
    Ok(json!({ "message": "pong" }))
}
