use member_search::{
    models::MemberSearchCondition,
    predicate::Filter,
    store::{postgres, MemberQuery},
};
use std::env;

/// Prints the SQL the PostgreSQL store issues for a search condition.
///
/// Usage: explain_search [username=..] [teamName=..] [ageGoe=..] [ageLoe=..] [offset=.. limit=..]
fn main() -> anyhow::Result<()> {
    let mut condition = MemberSearchCondition::default();
    let mut offset: Option<i64> = None;
    let mut limit: Option<i64> = None;

    for arg in env::args().skip(1) {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected key=value, got '{}'", arg))?;
        match key {
            "username" => condition.username = Some(value.to_string()),
            "teamName" | "team_name" => condition.team_name = Some(value.to_string()),
            "ageGoe" | "age_goe" => condition.age_goe = Some(value.parse()?),
            "ageLoe" | "age_loe" => condition.age_loe = Some(value.parse()?),
            "offset" => offset = Some(value.parse()?),
            "limit" => limit = Some(value.parse()?),
            other => anyhow::bail!("unknown parameter '{}'", other),
        }
    }

    let mut query = MemberQuery::new(Filter::from_condition(&condition));
    if let Some(limit) = limit {
        query = query.window(offset.unwrap_or(0), limit);
    }

    let select = postgres::build_select(&query);
    let count = postgres::build_count(&query);

    println!("condition: {:?}", condition);
    println!("conjuncts: {}", query.filter.conjuncts().len());
    println!("select: {}", select.sql().split_whitespace().collect::<Vec<_>>().join(" "));
    println!("count:  {}", count.sql().split_whitespace().collect::<Vec<_>>().join(" "));

    Ok(())
}
