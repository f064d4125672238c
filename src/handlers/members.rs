use axum::{
    extract::{RawQuery, State},
    response::Json,
    routing::get,
    Router,
};
use std::collections::HashMap;
use std::str::FromStr;

use crate::{
    errors::{AppError, Result},
    models::{MemberSearchCondition, MemberTeamView, Page, PageParams},
    store::MemberStore,
    AppState,
};

pub fn router<S: MemberStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/v1/members", get(search_member_v1::<S>))
        .route("/v2/members", get(search_member_v2::<S>))
        .route("/v3/members", get(search_member_v3::<S>))
}

/// Splits the query string into the search condition and the paging
/// parameters. Both camelCase and snake_case keys are accepted and `sort`
/// may repeat. Empty values count as absent.
fn parse_search_params(query: &str) -> Result<(MemberSearchCondition, PageParams)> {
    let mut params_map: HashMap<String, Vec<String>> = HashMap::new();
    for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
        params_map.entry(k.to_string()).or_default().push(v.to_string());
    }

    let get_string = |keys: &[&str]| -> Option<String> {
        keys.iter()
            .find_map(|key| params_map.get(*key).and_then(|v| v.last()))
            .cloned()
    };

    fn parse_number<T: FromStr>(key: &str, value: Option<String>) -> Result<Option<T>> {
        match value.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|_| AppError::BadRequest(format!("{} must be a number, got '{}'", key, raw))),
        }
    }

    let condition = MemberSearchCondition {
        username: get_string(&["username"]),
        team_name: get_string(&["teamName", "team_name"]),
        age_goe: parse_number("ageGoe", get_string(&["ageGoe", "age_goe"]))?,
        age_loe: parse_number("ageLoe", get_string(&["ageLoe", "age_loe"]))?,
    };

    let paging = PageParams {
        page: parse_number("page", get_string(&["page"]))?,
        size: parse_number("size", get_string(&["size"]))?,
        offset: parse_number("offset", get_string(&["offset"]))?,
        limit: parse_number("limit", get_string(&["limit"]))?,
        sort: params_map
            .get("sort")
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect(),
    };

    Ok((condition, paging))
}

/// GET /v1/members - every matching member, unpaged
///
/// Parameters:
/// - username, teamName: exact match, blank is ignored
/// - ageGoe, ageLoe: inclusive age bounds
/// - sort: `column[,asc|desc][,nulls_first|nulls_last]`, repeatable
pub async fn search_member_v1<S: MemberStore>(
    State(state): State<AppState<S>>,
    RawQuery(query): RawQuery,
) -> Result<Json<Vec<MemberTeamView>>> {
    let (condition, paging) = parse_search_params(query.as_deref().unwrap_or(""))?;
    let sort = paging.parse_sort()?;

    tracing::info!("🔍 MEMBER SEARCH v1: condition={:?}", condition);

    let rows = state.members.search_sorted(&condition, sort).await?;
    Ok(Json(rows))
}

/// GET /v2/members - paged search, content and count queries both run
///
/// Accepts the v1 parameters plus `page`/`size` or `offset`/`limit`.
pub async fn search_member_v2<S: MemberStore>(
    State(state): State<AppState<S>>,
    RawQuery(query): RawQuery,
) -> Result<Json<Page<MemberTeamView>>> {
    let (condition, paging) = parse_search_params(query.as_deref().unwrap_or(""))?;
    let request = paging.into_page_request()?;

    tracing::info!(
        "🔍 MEMBER SEARCH v2: condition={:?}, offset={}, limit={}",
        condition,
        request.offset,
        request.limit
    );

    let page = state.members.search_page_simple(&condition, &request).await?;
    Ok(Json(page))
}

/// GET /v3/members - paged search that skips the count query when the page
/// already shows where the result set ends
pub async fn search_member_v3<S: MemberStore>(
    State(state): State<AppState<S>>,
    RawQuery(query): RawQuery,
) -> Result<Json<Page<MemberTeamView>>> {
    let (condition, paging) = parse_search_params(query.as_deref().unwrap_or(""))?;
    let request = paging.into_page_request()?;

    tracing::info!(
        "🔍 MEMBER SEARCH v3: condition={:?}, offset={}, limit={}",
        condition,
        request.offset,
        request.limit
    );

    let page = state.members.search_page_complex(&condition, &request).await?;

    tracing::info!(
        "✅ SEARCH COMPLETE: returned {} items, total={}, page={}, total_pages={}, has_next={}",
        page.content.len(),
        page.total,
        page.page,
        page.total_pages,
        page.has_next()
    );

    Ok(Json(page))
}
