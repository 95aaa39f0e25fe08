/// Account directory (read-only)
///
/// - `GET /v1/accounts?limit=&offset=`
/// - `GET /v1/accounts/:id`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Json, Path, Query},
};
use axum::extract::State;
use serde::{Deserialize, Serialize};
use softdesk_shared::models::account::Account;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE_SIZE: i64 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// Limit clamped to `1..=MAX_PAGE_SIZE` and a non-negative offset
    pub fn bounds(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Debug, Serialize)]
pub struct AccountList {
    pub accounts: Vec<Account>,
}

pub async fn list_accounts(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<AccountList>> {
    let (limit, offset) = page.bounds();
    let accounts = Account::list(&state.db, limit, offset).await?;
    Ok(Json(AccountList { accounts }))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Account>> {
    Account::find_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))
}
