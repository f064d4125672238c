//! Query execution capability.
//!
//! The repository layer only composes a [`MemberQuery`]; running it belongs to
//! a [`MemberStore`]. The store owns connections and transactions, and its
//! errors are passed through untouched.

use std::future::Future;

use crate::{
    errors::Result,
    models::{Member, MemberTeamView, NewMember, PageRequest, Sort, Team},
    predicate::Filter,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryMemberStore;
pub use postgres::PgMemberStore;

/// How the team side of the member/team join is materialized when loading
/// member entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStrategy {
    /// Join only for filtering; `Member::team` stays unloaded.
    #[default]
    Lazy,
    /// Load the team together with the member in the same query.
    Eager,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: i64,
    pub limit: i64,
}

/// A filtered, left-joined, optionally sorted and windowed member query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberQuery {
    pub filter: Filter,
    pub fetch: FetchStrategy,
    pub sort: Sort,
    pub window: Option<Window>,
}

impl MemberQuery {
    pub fn new(filter: Filter) -> Self {
        Self { filter, ..Default::default() }
    }

    pub fn fetch(mut self, fetch: FetchStrategy) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn sorted(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn window(mut self, offset: i64, limit: i64) -> Self {
        self.window = Some(Window { offset, limit });
        self
    }

    /// Applies the sort and window of a page request.
    pub fn paged(self, request: &PageRequest) -> Self {
        self.sorted(request.sort.clone()).window(request.offset, request.limit)
    }
}

pub trait MemberStore: Clone + Send + Sync + 'static {
    /// Runs the projection query. Results are ordered by `query.sort` with the
    /// member id as the final tie-break.
    fn fetch(&self, query: &MemberQuery) -> impl Future<Output = Result<Vec<MemberTeamView>>> + Send;

    /// Counts matching rows, ignoring sort and window.
    fn count(&self, query: &MemberQuery) -> impl Future<Output = Result<i64>> + Send;

    /// Loads member entities matching the query, honoring `query.fetch`.
    fn fetch_members(&self, query: &MemberQuery) -> impl Future<Output = Result<Vec<Member>>> + Send;

    fn insert_team(&self, name: &str) -> impl Future<Output = Result<Team>> + Send;

    fn insert_member(&self, member: &NewMember) -> impl Future<Output = Result<Member>> + Send;

    fn find_member(&self, id: i64) -> impl Future<Output = Result<Option<Member>>> + Send;
}

/// Splits a projected row back into a member entity, keeping the team only
/// for eager fetches.
pub(crate) fn into_member(row: MemberTeamView, fetch: FetchStrategy) -> Member {
    let team = match (fetch, row.team_id, row.team_name) {
        (FetchStrategy::Eager, Some(id), Some(name)) => Some(Team { id, name }),
        _ => None,
    };

    Member {
        id: row.member_id,
        username: row.username,
        age: row.age,
        team_id: row.team_id,
        team,
    }
}
