use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::error::Error;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Admin routes are open when no key is configured.
#[derive(Clone, Debug, Default)]
pub struct AdminKey(Option<Arc<str>>);

impl AdminKey {
    pub fn new(key: Option<String>) -> Self {
        Self(key.map(Arc::from))
    }

    fn accepts(&self, presented: Option<&str>) -> bool {
        match (&self.0, presented) {
            (None, _) => true,
            (Some(expected), Some(presented)) => {
                expected.as_bytes().ct_eq(presented.as_bytes()).into()
            }
            (Some(_), None) => false,
        }
    }
}

pub async fn require_admin_key(State(key): State<AdminKey>, req: Request, next: Next) -> Response {
    let presented = req
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    if !key.accepts(presented) {
        return Error::Unauthorized("invalid admin key".to_string()).into_response();
    }
    next.run(req).await
}
