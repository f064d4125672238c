use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{into_member, MemberQuery, MemberStore};
use crate::{
    errors::{AppError, Result},
    models::{Direction, Member, MemberTeamView, NewMember, NullHandling, SortOrder, Team},
    predicate::{column_value, Value},
};

#[derive(Default)]
struct Tables {
    teams: Vec<Team>,
    members: Vec<Member>,
    next_team_id: i64,
    next_member_id: i64,
}

impl Tables {
    fn joined(&self) -> Vec<MemberTeamView> {
        self.members
            .iter()
            .map(|member| {
                let team = member
                    .team_id
                    .and_then(|id| self.teams.iter().find(|team| team.id == id));
                MemberTeamView {
                    member_id: member.id,
                    username: member.username.clone(),
                    age: member.age,
                    team_id: team.map(|t| t.id),
                    team_name: team.map(|t| t.name.clone()),
                }
            })
            .collect()
    }
}

#[derive(Default)]
struct Inner {
    tables: RwLock<Tables>,
    fetch_calls: AtomicUsize,
    count_calls: AtomicUsize,
}

/// Process-local store. Evaluates filters and orderings the way PostgreSQL
/// would and records how often each query path ran.
#[derive(Clone, Default)]
pub struct MemoryMemberStore {
    inner: Arc<Inner>,
}

impl MemoryMemberStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch_calls(&self) -> usize {
        self.inner.fetch_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn count_calls(&self) -> usize {
        self.inner.count_calls.load(AtomicOrdering::SeqCst)
    }

    /// Removes a team. Its members stay and lose their team reference.
    pub async fn delete_team(&self, id: i64) -> bool {
        let mut tables = self.inner.tables.write().await;
        let before = tables.teams.len();
        tables.teams.retain(|team| team.id != id);
        for member in tables.members.iter_mut().filter(|m| m.team_id == Some(id)) {
            member.team_id = None;
        }
        tables.teams.len() != before
    }

    async fn select(&self, query: &MemberQuery) -> Vec<MemberTeamView> {
        let tables = self.inner.tables.read().await;
        let mut rows: Vec<MemberTeamView> = tables
            .joined()
            .into_iter()
            .filter(|row| query.filter.matches(row))
            .collect();

        rows.sort_by(|a, b| compare_rows(a, b, query.sort.orders()));

        match query.window {
            Some(window) => rows
                .into_iter()
                .skip(usize::try_from(window.offset).unwrap_or(0))
                .take(usize::try_from(window.limit).unwrap_or(0))
                .collect(),
            None => rows,
        }
    }
}

fn compare_rows(a: &MemberTeamView, b: &MemberTeamView, orders: &[SortOrder]) -> Ordering {
    orders
        .iter()
        .map(|order| {
            compare_nullable(
                column_value(a, order.column).as_ref(),
                column_value(b, order.column).as_ref(),
                order,
            )
        })
        .find(|ord| ord.is_ne())
        .unwrap_or_else(|| a.member_id.cmp(&b.member_id))
}

fn compare_nullable(a: Option<&Value>, b: Option<&Value>, order: &SortOrder) -> Ordering {
    let nulls_first = match order.nulls {
        NullHandling::NullsFirst => true,
        NullHandling::NullsLast => false,
        NullHandling::Native => order.direction == Direction::Desc,
    };

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) if nulls_first => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) if nulls_first => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => {
            let ord = match (x, y) {
                (Value::Int(x), Value::Int(y)) => x.cmp(y),
                (Value::Text(x), Value::Text(y)) => x.cmp(y),
                _ => Ordering::Equal,
            };
            match order.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        }
    }
}

impl MemberStore for MemoryMemberStore {
    async fn fetch(&self, query: &MemberQuery) -> Result<Vec<MemberTeamView>> {
        self.inner.fetch_calls.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(self.select(query).await)
    }

    async fn count(&self, query: &MemberQuery) -> Result<i64> {
        self.inner.count_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let tables = self.inner.tables.read().await;
        let count = tables
            .joined()
            .iter()
            .filter(|row| query.filter.matches(row))
            .count();
        Ok(count as i64)
    }

    async fn fetch_members(&self, query: &MemberQuery) -> Result<Vec<Member>> {
        self.inner.fetch_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let fetch = query.fetch;
        Ok(self
            .select(query)
            .await
            .into_iter()
            .map(|row| into_member(row, fetch))
            .collect())
    }

    async fn insert_team(&self, name: &str) -> Result<Team> {
        let mut tables = self.inner.tables.write().await;
        tables.next_team_id += 1;
        let team = Team { id: tables.next_team_id, name: name.to_string() };
        tables.teams.push(team.clone());
        Ok(team)
    }

    async fn insert_member(&self, member: &NewMember) -> Result<Member> {
        let mut tables = self.inner.tables.write().await;
        if let Some(team_id) = member.team_id {
            if !tables.teams.iter().any(|team| team.id == team_id) {
                return Err(AppError::NotFound(format!("Team {} does not exist", team_id)));
            }
        }

        tables.next_member_id += 1;
        let saved = Member {
            id: tables.next_member_id,
            username: member.username.clone(),
            age: member.age,
            team_id: member.team_id,
            team: None,
        };
        tables.members.push(saved.clone());
        Ok(saved)
    }

    async fn find_member(&self, id: i64) -> Result<Option<Member>> {
        let tables = self.inner.tables.read().await;
        Ok(tables.members.iter().find(|member| member.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Column, Sort};
    use crate::predicate::{team_name_eq, Filter};
    use crate::store::FetchStrategy;

    async fn seeded() -> MemoryMemberStore {
        let store = MemoryMemberStore::new();
        let team_a = store.insert_team("teamA").await.unwrap();
        for (name, age, team) in [
            (Some("member1"), 10, Some(team_a.id)),
            (None, 20, Some(team_a.id)),
            (Some("member3"), 20, None),
        ] {
            store
                .insert_member(&NewMember { username: name.map(str::to_string), age, team_id: team })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn left_join_keeps_members_without_team() {
        let store = seeded().await;
        let rows = store.fetch(&MemberQuery::default()).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].team_id, None);
        assert_eq!(rows[2].team_name, None);
    }

    #[tokio::test]
    async fn native_nulls_follow_postgres() {
        let store = seeded().await;

        let asc = MemberQuery::default().sorted(Sort::by([SortOrder::asc(Column::Username)]));
        let rows = store.fetch(&asc).await.unwrap();
        assert_eq!(rows.last().unwrap().username, None);

        let desc = MemberQuery::default().sorted(Sort::by([SortOrder::desc(Column::Username)]));
        let rows = store.fetch(&desc).await.unwrap();
        assert_eq!(rows.first().unwrap().username, None);

        let desc_nulls_last = MemberQuery::default()
            .sorted(Sort::by([SortOrder::desc(Column::Username).nulls_last()]));
        let rows = store.fetch(&desc_nulls_last).await.unwrap();
        assert_eq!(rows.first().unwrap().username.as_deref(), Some("member3"));
        assert_eq!(rows.last().unwrap().username, None);
    }

    #[tokio::test]
    async fn window_past_end_is_empty() {
        let store = seeded().await;
        let rows = store.fetch(&MemberQuery::default().window(10, 5)).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(store.count(&MemberQuery::default()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn eager_fetch_loads_team() {
        let store = seeded().await;
        let query = MemberQuery::new(Filter::all([team_name_eq(Some("teamA"))]));

        let lazy = store.fetch_members(&query).await.unwrap();
        assert_eq!(lazy.len(), 2);
        assert!(lazy.iter().all(|m| m.team.is_none()));

        let eager = store
            .fetch_members(&query.clone().fetch(FetchStrategy::Eager))
            .await
            .unwrap();
        assert!(eager.iter().all(|m| m.team.as_ref().map(|t| t.name.as_str()) == Some("teamA")));
    }

    #[tokio::test]
    async fn deleting_team_does_not_cascade() {
        let store = seeded().await;
        assert!(store.delete_team(1).await);

        let rows = store.fetch(&MemberQuery::default()).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.team_id.is_none()));
    }

    #[tokio::test]
    async fn rejects_member_with_unknown_team() {
        let store = MemoryMemberStore::new();
        let result = store
            .insert_member(&NewMember { username: Some("x".into()), age: 1, team_id: Some(42) })
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
