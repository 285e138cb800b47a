use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Bearer token payload. `sub` is the user id, `role` is `admin` or `user`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}
