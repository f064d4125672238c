use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{into_member, MemberQuery, MemberStore};
use crate::{
    errors::Result,
    models::{Column, Member, MemberTeamView, NewMember, Team},
    predicate::{Expr, Filter, Value},
};

const PROJECTION: &str = r#"
        SELECT
            m.member_id,
            m.username,
            m.age,
            t.team_id,
            t.name AS team_name
        FROM member m
        LEFT JOIN team t ON m.team_id = t.team_id"#;

const COUNT: &str = r#"
        SELECT COUNT(*)
        FROM member m
        LEFT JOIN team t ON m.team_id = t.team_id"#;

#[derive(Clone)]
pub struct PgMemberStore {
    pool: PgPool,
}

impl PgMemberStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_value(query_builder: &mut QueryBuilder<'static, Postgres>, value: &Value) {
    match value {
        Value::Text(text) => query_builder.push_bind(text.clone()),
        Value::Int(int) => query_builder.push_bind(*int),
    };
}

fn push_expr(query_builder: &mut QueryBuilder<'static, Postgres>, expr: &Expr) {
    match expr {
        Expr::Eq(column, value) => {
            query_builder.push(column.as_sql());
            query_builder.push(" = ");
            push_value(query_builder, value);
        }
        Expr::Goe(column, value) => {
            query_builder.push(column.as_sql());
            query_builder.push(" >= ");
            push_value(query_builder, value);
        }
        Expr::Loe(column, value) => {
            query_builder.push(column.as_sql());
            query_builder.push(" <= ");
            push_value(query_builder, value);
        }
        Expr::And(parts) => {
            query_builder.push("(");
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    query_builder.push(" AND ");
                }
                push_expr(query_builder, part);
            }
            query_builder.push(")");
        }
    }
}

/// Appends `WHERE ...` only when the filter has at least one conjunct.
fn push_filter(query_builder: &mut QueryBuilder<'static, Postgres>, filter: &Filter) {
    for (i, expr) in filter.conjuncts().iter().enumerate() {
        query_builder.push(if i == 0 { " WHERE " } else { " AND " });
        push_expr(query_builder, expr);
    }
}

pub fn build_select(query: &MemberQuery) -> QueryBuilder<'static, Postgres> {
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(PROJECTION);
    push_filter(&mut query_builder, &query.filter);

    query_builder.push(" ORDER BY ");
    for order in query.sort.orders() {
        query_builder.push(order.to_string());
        query_builder.push(", ");
    }
    // member id keeps repeated identical queries in the same order
    query_builder.push(Column::MemberId.as_sql());
    query_builder.push(" ASC");

    if let Some(window) = query.window {
        query_builder.push(" LIMIT ");
        query_builder.push_bind(window.limit);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(window.offset);
    }

    query_builder
}

pub fn build_count(query: &MemberQuery) -> QueryBuilder<'static, Postgres> {
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(COUNT);
    push_filter(&mut query_builder, &query.filter);
    query_builder
}

impl MemberStore for PgMemberStore {
    async fn fetch(&self, query: &MemberQuery) -> Result<Vec<MemberTeamView>> {
        let mut query_builder = build_select(query);
        let rows = query_builder
            .build_query_as::<MemberTeamView>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count(&self, query: &MemberQuery) -> Result<i64> {
        let mut query_builder = build_count(query);
        let total = query_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn fetch_members(&self, query: &MemberQuery) -> Result<Vec<Member>> {
        let fetch = query.fetch;
        let rows = self.fetch(query).await?;
        Ok(rows.into_iter().map(|row| into_member(row, fetch)).collect())
    }

    async fn insert_team(&self, name: &str) -> Result<Team> {
        let team = sqlx::query_as::<_, Team>(
            "INSERT INTO team (name) VALUES ($1) RETURNING team_id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(team)
    }

    async fn insert_member(&self, member: &NewMember) -> Result<Member> {
        let saved = sqlx::query_as::<_, Member>(
            r#"
            INSERT INTO member (username, age, team_id)
            VALUES ($1, $2, $3)
            RETURNING member_id, username, age, team_id
            "#,
        )
        .bind(member.username.as_deref())
        .bind(member.age)
        .bind(member.team_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }

    async fn find_member(&self, id: i64) -> Result<Option<Member>> {
        let member = sqlx::query_as::<_, Member>(
            "SELECT member_id, username, age, team_id FROM member WHERE member_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }
}
