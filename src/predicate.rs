//! Dynamic search predicates.
//!
//! Every optional search field turns into a [`Clause`], which is either a
//! concrete comparison or [`Clause::Absent`]. Absent clauses are the identity
//! under AND, so the conjunction of a fully empty condition is "true" and the
//! resulting query carries no `WHERE` restriction at all.

use crate::models::{Column, MemberSearchCondition, MemberTeamView};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Int(i64),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Eq(Column, Value),
    Goe(Column, Value),
    Loe(Column, Value),
    And(Vec<Expr>),
}

impl Expr {
    pub fn eq(column: Column, value: impl Into<Value>) -> Self {
        Expr::Eq(column, value.into())
    }

    pub fn goe(column: Column, value: impl Into<Value>) -> Self {
        Expr::Goe(column, value.into())
    }

    pub fn loe(column: Column, value: impl Into<Value>) -> Self {
        Expr::Loe(column, value.into())
    }

    /// Conjunction, flattening nested `And`s.
    pub fn and(self, other: Expr) -> Expr {
        let mut parts = match self {
            Expr::And(parts) => parts,
            single => vec![single],
        };
        match other {
            Expr::And(more) => parts.extend(more),
            single => parts.push(single),
        }
        Expr::And(parts)
    }

    /// Evaluates the expression against a projected row. A comparison against
    /// a NULL column is false, as it is in SQL.
    pub fn matches(&self, row: &MemberTeamView) -> bool {
        match self {
            Expr::Eq(column, value) => column_value(row, *column).as_ref() == Some(value),
            Expr::Goe(column, value) => compare(row, *column, value, |ord| ord.is_ge()),
            Expr::Loe(column, value) => compare(row, *column, value, |ord| ord.is_le()),
            Expr::And(parts) => parts.iter().all(|part| part.matches(row)),
        }
    }
}

pub(crate) fn column_value(row: &MemberTeamView, column: Column) -> Option<Value> {
    match column {
        Column::MemberId => Some(Value::Int(row.member_id)),
        Column::Username => row.username.clone().map(Value::Text),
        Column::Age => Some(Value::Int(i64::from(row.age))),
        Column::TeamId => row.team_id.map(Value::Int),
        Column::TeamName => row.team_name.clone().map(Value::Text),
    }
}

fn compare(
    row: &MemberTeamView,
    column: Column,
    value: &Value,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    match (column_value(row, column), value) {
        (Some(Value::Int(actual)), Value::Int(bound)) => accept(actual.cmp(bound)),
        (Some(Value::Text(actual)), Value::Text(bound)) => accept(actual.as_str().cmp(bound.as_str())),
        _ => false,
    }
}

/// A single optional search clause.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Clause {
    #[default]
    Absent,
    Present(Expr),
}

impl Clause {
    pub fn is_absent(&self) -> bool {
        matches!(self, Clause::Absent)
    }

    /// AND with `Absent` acting as the identity element.
    pub fn and(self, other: Clause) -> Clause {
        match (self, other) {
            (Clause::Absent, other) => other,
            (this, Clause::Absent) => this,
            (Clause::Present(a), Clause::Present(b)) => Clause::Present(a.and(b)),
        }
    }
}

impl From<Expr> for Clause {
    fn from(expr: Expr) -> Self {
        Clause::Present(expr)
    }
}

impl From<Option<Expr>> for Clause {
    fn from(expr: Option<Expr>) -> Self {
        expr.map_or(Clause::Absent, Clause::Present)
    }
}

/// True when the string has at least one non-whitespace character.
pub fn has_text(value: Option<&str>) -> bool {
    value.is_some_and(|s| s.chars().any(|c| !c.is_whitespace()))
}

pub fn username_eq(username: Option<&str>) -> Clause {
    match username {
        Some(name) if has_text(Some(name)) => Expr::eq(Column::Username, name).into(),
        _ => Clause::Absent,
    }
}

pub fn team_name_eq(team_name: Option<&str>) -> Clause {
    match team_name {
        Some(name) if has_text(Some(name)) => Expr::eq(Column::TeamName, name).into(),
        _ => Clause::Absent,
    }
}

pub fn age_goe(age_goe: Option<i32>) -> Clause {
    age_goe.map(|age| Expr::goe(Column::Age, age)).into()
}

pub fn age_loe(age_loe: Option<i32>) -> Clause {
    age_loe.map(|age| Expr::loe(Column::Age, age)).into()
}

/// Lower and upper age bound together. A missing bound is simply dropped.
pub fn age_between(age_goe_bound: Option<i32>, age_loe_bound: Option<i32>) -> Clause {
    age_goe(age_goe_bound).and(age_loe(age_loe_bound))
}

/// Conjunction of present clauses. An empty filter is "true".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    conjuncts: Vec<Expr>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder style: fold one more clause into the running filter.
    pub fn and(&mut self, clause: impl Into<Clause>) -> &mut Self {
        match clause.into() {
            Clause::Absent => {}
            Clause::Present(Expr::And(parts)) => self.conjuncts.extend(parts),
            Clause::Present(expr) => self.conjuncts.push(expr),
        }
        self
    }

    /// Declarative style: absent entries are dropped, the rest are ANDed.
    pub fn all(clauses: impl IntoIterator<Item = Clause>) -> Self {
        let mut filter = Self::new();
        for clause in clauses {
            filter.and(clause);
        }
        filter
    }

    pub fn from_condition(condition: &MemberSearchCondition) -> Self {
        Self::all([
            username_eq(condition.username.as_deref()),
            team_name_eq(condition.team_name.as_deref()),
            age_goe(condition.age_goe),
            age_loe(condition.age_loe),
        ])
    }

    pub fn is_unconstrained(&self) -> bool {
        self.conjuncts.is_empty()
    }

    pub fn conjuncts(&self) -> &[Expr] {
        &self.conjuncts
    }

    pub fn matches(&self, row: &MemberTeamView) -> bool {
        self.conjuncts.iter().all(|expr| expr.matches(row))
    }
}
