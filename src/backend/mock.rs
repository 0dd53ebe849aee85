//! In-memory [`BackendRpc`] used by service and route tests.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use super::{BackendRpc, RpcError};
use crate::models::SessionUser;

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub procedure: String,
    pub params: Value,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone)]
enum Reply {
    Ok(Value),
    Fail { status: u16, message: String },
}

#[derive(Default)]
pub(crate) struct MockBackend {
    replies: Mutex<HashMap<String, Reply>>,
    users: Mutex<HashMap<String, SessionUser>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to `procedure` (or table name) with `value`.
    pub fn reply(self, procedure: &str, value: Value) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(procedure.to_string(), Reply::Ok(value));
        self
    }

    pub fn fail(self, procedure: &str, status: u16, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(procedure.to_string(), Reply::Fail { status, message: message.to_string() });
        self
    }

    pub fn user(self, access_token: &str, user: SessionUser) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(access_token.to_string(), user);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, procedure: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.procedure == procedure)
            .collect()
    }

    fn answer(&self, procedure: &str, params: Value, access_token: Option<&str>) -> Result<Value, RpcError> {
        self.calls.lock().unwrap().push(RecordedCall {
            procedure: procedure.to_string(),
            params,
            access_token: access_token.map(str::to_string),
        });
        match self.replies.lock().unwrap().get(procedure).cloned() {
            Some(Reply::Ok(value)) => Ok(value),
            Some(Reply::Fail { status, message }) => Err(RpcError::Response { status, message }),
            None => Ok(Value::Null),
        }
    }
}

#[async_trait::async_trait]
impl BackendRpc for MockBackend {
    async fn rpc(&self, procedure: &str, params: Value, access_token: Option<&str>) -> Result<Value, RpcError> {
        self.answer(procedure, params, access_token)
    }

    async fn select(&self, table: &str, limit: usize, access_token: Option<&str>) -> Result<Value, RpcError> {
        self.answer(table, serde_json::json!({ "limit": limit }), access_token)
    }

    async fn session_user(&self, access_token: &str) -> Result<Option<SessionUser>, RpcError> {
        Ok(self.users.lock().unwrap().get(access_token).cloned())
    }
}
