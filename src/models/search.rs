use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::errors::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Sparse search parameters. An absent field places no constraint on the
/// result; it never means "match NULL".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSearchCondition {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, alias = "teamName")]
    pub team_name: Option<String>,
    #[serde(default, alias = "ageGoe")]
    pub age_goe: Option<i32>,
    #[serde(default, alias = "ageLoe")]
    pub age_loe: Option<i32>,
}

impl MemberSearchCondition {
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn team_name(mut self, team_name: impl Into<String>) -> Self {
        self.team_name = Some(team_name.into());
        self
    }

    pub fn age_goe(mut self, age: i32) -> Self {
        self.age_goe = Some(age);
        self
    }

    pub fn age_loe(mut self, age: i32) -> Self {
        self.age_loe = Some(age);
        self
    }
}

/// Columns of the member/team projection that can be filtered or sorted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    MemberId,
    Username,
    Age,
    TeamId,
    TeamName,
}

impl Column {
    pub fn as_sql(self) -> &'static str {
        match self {
            Column::MemberId => "m.member_id",
            Column::Username => "m.username",
            Column::Age => "m.age",
            Column::TeamId => "t.team_id",
            Column::TeamName => "t.name",
        }
    }
}

impl FromStr for Column {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "id" | "memberId" | "member_id" => Ok(Column::MemberId),
            "username" => Ok(Column::Username),
            "age" => Ok(Column::Age),
            "teamId" | "team_id" => Ok(Column::TeamId),
            "teamName" | "team_name" => Ok(Column::TeamName),
            other => Err(AppError::BadRequest(format!("Unknown sort property: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Where NULLs land in an ordering. `Native` follows PostgreSQL: NULL compares
/// greater than every value, so it comes last ascending and first descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullHandling {
    #[default]
    Native,
    NullsFirst,
    NullsLast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub column: Column,
    pub direction: Direction,
    pub nulls: NullHandling,
}

impl SortOrder {
    pub fn asc(column: Column) -> Self {
        Self { column, direction: Direction::Asc, nulls: NullHandling::Native }
    }

    pub fn desc(column: Column) -> Self {
        Self { column, direction: Direction::Desc, nulls: NullHandling::Native }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = NullHandling::NullsFirst;
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = NullHandling::NullsLast;
        self
    }
}

/// Parses `column[,asc|desc][,nulls_first|nulls_last]`.
impl FromStr for SortOrder {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',').map(str::trim).filter(|p| !p.is_empty());
        let column: Column = parts
            .next()
            .ok_or_else(|| AppError::BadRequest("Empty sort parameter".to_string()))?
            .parse()?;

        let mut order = SortOrder::asc(column);
        for part in parts {
            match part.to_ascii_lowercase().as_str() {
                "asc" => order.direction = Direction::Asc,
                "desc" => order.direction = Direction::Desc,
                "nulls_first" | "nullsfirst" => order.nulls = NullHandling::NullsFirst,
                "nulls_last" | "nullslast" => order.nulls = NullHandling::NullsLast,
                other => {
                    return Err(AppError::BadRequest(format!(
                        "Invalid sort modifier '{}' for {}",
                        other, s
                    )))
                }
            }
        }
        Ok(order)
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column.as_sql(), self.direction.as_sql())?;
        match self.nulls {
            NullHandling::Native => Ok(()),
            NullHandling::NullsFirst => write!(f, " NULLS FIRST"),
            NullHandling::NullsLast => write!(f, " NULLS LAST"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort(pub Vec<SortOrder>);

impl Sort {
    pub fn unsorted() -> Self {
        Sort(Vec::new())
    }

    pub fn by(orders: impl IntoIterator<Item = SortOrder>) -> Self {
        Sort(orders.into_iter().collect())
    }

    pub fn orders(&self) -> &[SortOrder] {
        &self.0
    }
}

/// Offset/limit window plus ordering. Always run through [`Validate`] before
/// a query is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct PageRequest {
    #[validate(range(min = 0, message = "offset must not be negative"))]
    pub offset: i64,
    #[validate(range(min = 1, message = "limit must be positive"))]
    pub limit: i64,
    pub sort: Sort,
}

impl PageRequest {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self { offset, limit, sort: Sort::unsorted() }
    }

    /// Zero-based page number and page size.
    pub fn of_page(page: i64, size: i64) -> Self {
        Self::new(page.saturating_mul(size), size)
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn page_number(&self) -> i64 {
        if self.limit > 0 {
            self.offset / self.limit
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
    pub page: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: &PageRequest, total: i64) -> Self {
        let total_pages = if request.limit > 0 {
            (total + request.limit - 1) / request.limit
        } else {
            0
        };

        Self {
            content,
            total,
            offset: request.offset,
            limit: request.limit,
            page: request.page_number(),
            total_pages,
        }
    }

    pub fn has_next(&self) -> bool {
        self.offset + (self.content.len() as i64) < self.total
    }
}

/// Raw paging parameters as they arrive on the query string. `page`/`size`
/// and `offset`/`limit` are both accepted; an explicit offset wins.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct PageParams {
    #[validate(range(min = 0, message = "page must not be negative"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, message = "size must be positive"))]
    pub size: Option<i64>,
    #[validate(range(min = 0, message = "offset must not be negative"))]
    pub offset: Option<i64>,
    #[validate(range(min = 1, message = "limit must be positive"))]
    pub limit: Option<i64>,
    #[serde(default)]
    pub sort: Vec<String>,
}

impl PageParams {
    pub fn into_page_request(self) -> Result<PageRequest, AppError> {
        self.validate()?;

        let sort = self.parse_sort()?;
        let limit = self.limit.or(self.size).unwrap_or(DEFAULT_PAGE_SIZE);
        let request = match (self.offset, self.page) {
            (Some(offset), _) => PageRequest::new(offset, limit),
            (None, Some(page)) => PageRequest::of_page(page, limit),
            (None, None) => PageRequest::new(0, limit),
        };

        Ok(request.with_sort(sort))
    }

    /// Only the `sort` entries; the window parameters are not looked at.
    pub fn parse_sort(&self) -> Result<Sort, AppError> {
        let orders = self
            .sort
            .iter()
            .map(|s| s.parse::<SortOrder>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Sort(orders))
    }
}
