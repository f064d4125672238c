use std::future::Future;
use std::time::Instant;
use validator::Validate;

use crate::{
    errors::Result,
    models::{
        Column, Member, MemberSearchCondition, MemberTeamView, NewMember, Page, PageRequest, Sort,
        Team,
    },
    predicate::{
        age_between, age_goe, age_loe, has_text, team_name_eq, username_eq, Expr, Filter,
    },
    store::{FetchStrategy, MemberQuery, MemberStore},
};

/// Builds the page total, running `count` only when the content slice cannot
/// answer it:
///
/// - first page shorter than the limit: total is the content length;
/// - later page that is non-empty and shorter than the limit: total is
///   `offset + content.len()`;
/// - anything else (full page, or an empty page past the end) needs the count.
pub async fn get_page<T, F, Fut>(content: Vec<T>, request: &PageRequest, count: F) -> Result<Page<T>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<i64>>,
{
    let len = content.len() as i64;

    let known_total = if request.offset == 0 {
        (len < request.limit).then_some(len)
    } else {
        (len != 0 && len < request.limit).then_some(request.offset + len)
    };

    let total = match known_total {
        Some(total) => {
            tracing::debug!("⏭️  COUNT QUERY skipped: total={} known from content", total);
            total
        }
        None => count().await?,
    };

    Ok(Page::new(content, request, total))
}

#[derive(Clone)]
pub struct MemberRepository<S> {
    store: S,
}

impl<S: MemberStore> MemberRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn save_team(&self, name: &str) -> Result<Team> {
        self.store.insert_team(name).await
    }

    pub async fn save_member(&self, member: &NewMember) -> Result<Member> {
        self.store.insert_member(member).await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Member>> {
        self.store.find_member(id).await
    }

    pub async fn find_all(&self) -> Result<Vec<Member>> {
        self.store.fetch_members(&MemberQuery::default()).await
    }

    /// Exact match; unlike the search conditions a blank username is not
    /// treated as "no constraint".
    pub async fn find_by_username(&self, username: &str) -> Result<Vec<Member>> {
        let mut filter = Filter::new();
        filter.and(Expr::eq(Column::Username, username));
        self.store.fetch_members(&MemberQuery::new(filter)).await
    }

    pub async fn count(&self, condition: &MemberSearchCondition) -> Result<i64> {
        self.store
            .count(&MemberQuery::new(Filter::from_condition(condition)))
            .await
    }

    /// Same result as [`search`](Self::search), accumulating the filter one
    /// field at a time from "true".
    pub async fn search_by_builder(&self, condition: &MemberSearchCondition) -> Result<Vec<MemberTeamView>> {
        let mut builder = Filter::new();

        if let Some(username) = condition.username.as_deref().filter(|s| has_text(Some(*s))) {
            builder.and(Expr::eq(Column::Username, username));
        }
        if let Some(team_name) = condition.team_name.as_deref().filter(|s| has_text(Some(*s))) {
            builder.and(Expr::eq(Column::TeamName, team_name));
        }
        if let Some(age) = condition.age_goe {
            builder.and(Expr::goe(Column::Age, age));
        }
        if let Some(age) = condition.age_loe {
            builder.and(Expr::loe(Column::Age, age));
        }

        self.store.fetch(&MemberQuery::new(builder)).await
    }

    pub async fn search(&self, condition: &MemberSearchCondition) -> Result<Vec<MemberTeamView>> {
        self.search_sorted(condition, Sort::unsorted()).await
    }

    pub async fn search_sorted(
        &self,
        condition: &MemberSearchCondition,
        sort: Sort,
    ) -> Result<Vec<MemberTeamView>> {
        let filter = Filter::all([
            username_eq(condition.username.as_deref()),
            team_name_eq(condition.team_name.as_deref()),
            age_goe(condition.age_goe),
            age_loe(condition.age_loe),
        ]);
        self.store.fetch(&MemberQuery::new(filter).sorted(sort)).await
    }

    /// Entity search; the age range goes through [`age_between`].
    pub async fn search_member(&self, condition: &MemberSearchCondition) -> Result<Vec<Member>> {
        self.search_member_with(condition, FetchStrategy::Lazy).await
    }

    pub async fn search_member_with(
        &self,
        condition: &MemberSearchCondition,
        fetch: FetchStrategy,
    ) -> Result<Vec<Member>> {
        let filter = Filter::all([
            username_eq(condition.username.as_deref()),
            team_name_eq(condition.team_name.as_deref()),
            age_between(condition.age_goe, condition.age_loe),
        ]);
        self.store
            .fetch_members(&MemberQuery::new(filter).fetch(fetch))
            .await
    }

    /// Content and total, always running both queries.
    pub async fn search_page_simple(
        &self,
        condition: &MemberSearchCondition,
        request: &PageRequest,
    ) -> Result<Page<MemberTeamView>> {
        request.validate()?;

        let query = MemberQuery::new(Filter::from_condition(condition)).paged(request);

        let search_start = Instant::now();
        let content = self.store.fetch(&query).await?;
        tracing::debug!(
            "⏱️  SEARCH QUERY: {}ms (returned {} rows)",
            search_start.elapsed().as_millis(),
            content.len()
        );

        let count_start = Instant::now();
        let total = self.store.count(&query).await?;
        tracing::debug!("⏱️  COUNT QUERY: {}ms", count_start.elapsed().as_millis());

        Ok(Page::new(content, request, total))
    }

    /// Like [`search_page_simple`](Self::search_page_simple), but the count
    /// is a separate query that only runs when the content cannot tell the
    /// total. See [`get_page`].
    pub async fn search_page_complex(
        &self,
        condition: &MemberSearchCondition,
        request: &PageRequest,
    ) -> Result<Page<MemberTeamView>> {
        request.validate()?;

        let filter = Filter::from_condition(condition);
        let content_query = MemberQuery::new(filter.clone()).paged(request);
        let count_query = MemberQuery::new(filter);

        let search_start = Instant::now();
        let content = self.store.fetch(&content_query).await?;
        tracing::debug!(
            "⏱️  SEARCH QUERY: {}ms (returned {} rows)",
            search_start.elapsed().as_millis(),
            content.len()
        );

        get_page(content, request, || self.store.count(&count_query)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use crate::models::SortOrder;
    use crate::store::MemoryMemberStore;
    use std::collections::HashSet;

    /// teamA: member1 (10), member2 (20); teamB: member3 (30), member4 (40).
    async fn repository() -> MemberRepository<MemoryMemberStore> {
        let repository = MemberRepository::new(MemoryMemberStore::new());
        let team_a = repository.save_team("teamA").await.unwrap();
        let team_b = repository.save_team("teamB").await.unwrap();
        for (name, age, team) in [
            ("member1", 10, &team_a),
            ("member2", 20, &team_a),
            ("member3", 30, &team_b),
            ("member4", 40, &team_b),
        ] {
            repository
                .save_member(&NewMember {
                    username: Some(name.to_string()),
                    age,
                    team_id: Some(team.id),
                })
                .await
                .unwrap();
        }
        repository
    }

    fn usernames(rows: &[MemberTeamView]) -> Vec<&str> {
        rows.iter().filter_map(|row| row.username.as_deref()).collect()
    }

    fn ids(rows: &[MemberTeamView]) -> HashSet<i64> {
        rows.iter().map(|row| row.member_id).collect()
    }

    #[tokio::test]
    async fn basic_crud() {
        let repository = repository().await;

        let saved = repository
            .save_member(&NewMember { username: Some("member5".into()), age: 50, team_id: None })
            .await
            .unwrap();
        assert_eq!(repository.find_by_id(saved.id).await.unwrap(), Some(saved.clone()));
        assert_eq!(repository.find_by_id(999).await.unwrap(), None);

        assert_eq!(repository.find_all().await.unwrap().len(), 5);
        assert_eq!(repository.find_by_username("member5").await.unwrap(), vec![saved]);
    }

    #[tokio::test]
    async fn search_by_username() {
        let repository = repository().await;
        let condition = MemberSearchCondition::default().username("member1");

        let rows = repository.search(&condition).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].username.as_deref(), Some("member1"));
        assert_eq!(rows[0].age, 10);
        assert_eq!(rows[0].team_name.as_deref(), Some("teamA"));
    }

    #[tokio::test]
    async fn search_age_range_is_inclusive() {
        let repository = repository().await;
        let condition = MemberSearchCondition::default().age_goe(20).age_loe(30);

        let rows = repository.search(&condition).await.unwrap();
        let ages: Vec<i32> = rows.iter().map(|row| row.age).collect();
        assert_eq!(ages, vec![20, 30]);
    }

    #[tokio::test]
    async fn search_team_name_ignores_age() {
        let repository = repository().await;
        let condition = MemberSearchCondition::default().team_name("teamB");

        let rows = repository.search(&condition).await.unwrap();
        assert_eq!(usernames(&rows), vec!["member3", "member4"]);
    }

    #[tokio::test]
    async fn empty_condition_returns_everything() {
        let repository = repository().await;
        let rows = repository.search(&MemberSearchCondition::default()).await.unwrap();
        assert_eq!(rows.len(), 4);

        let blank = MemberSearchCondition::default().username("  ").team_name("");
        assert_eq!(repository.search(&blank).await.unwrap(), rows);
    }

    #[tokio::test]
    async fn builder_and_where_params_agree() {
        let repository = repository().await;
        let conditions = [
            MemberSearchCondition::default(),
            MemberSearchCondition::default().username("member2"),
            MemberSearchCondition::default().team_name("teamB").age_goe(35),
            MemberSearchCondition::default().age_goe(15).age_loe(35),
            MemberSearchCondition::default().username(" ").age_loe(10),
            MemberSearchCondition::default().team_name("teamC"),
        ];

        for condition in &conditions {
            let by_builder = repository.search_by_builder(condition).await.unwrap();
            let by_params = repository.search(condition).await.unwrap();
            assert_eq!(by_builder, by_params, "condition {:?}", condition);
        }
    }

    #[tokio::test]
    async fn every_search_is_a_subset_of_all() {
        let repository = repository().await;
        let all = ids(&repository.search(&MemberSearchCondition::default()).await.unwrap());

        for condition in [
            MemberSearchCondition::default().team_name("teamA"),
            MemberSearchCondition::default().age_goe(25),
            MemberSearchCondition::default().username("nobody"),
        ] {
            let rows = repository.search(&condition).await.unwrap();
            assert!(ids(&rows).is_subset(&all));
            assert_eq!(rows, repository.search(&condition).await.unwrap());
        }
    }

    #[tokio::test]
    async fn search_member_with_single_age_bound() {
        let repository = repository().await;

        let members = repository
            .search_member(&MemberSearchCondition::default().age_goe(30))
            .await
            .unwrap();
        assert_eq!(members.len(), 2);
        assert!(members.iter().all(|m| m.team.is_none()));

        let members = repository
            .search_member(&MemberSearchCondition::default().age_loe(10))
            .await
            .unwrap();
        assert_eq!(members.len(), 1);

        let eager = repository
            .search_member_with(&MemberSearchCondition::default().team_name("teamA"), FetchStrategy::Eager)
            .await
            .unwrap();
        assert_eq!(eager.len(), 2);
        assert!(eager.iter().all(|m| m.team.is_some()));
    }

    #[tokio::test]
    async fn sorted_search_honors_nulls_last() {
        let repository = repository().await;
        let team = repository.save_team("teamC").await.unwrap();
        for (name, age) in [(None, 100), (Some("member5"), 100), (Some("member6"), 100)] {
            repository
                .save_member(&NewMember { username: name.map(str::to_string), age, team_id: Some(team.id) })
                .await
                .unwrap();
        }

        let sort = Sort::by([
            SortOrder::desc(Column::Age),
            SortOrder::asc(Column::Username).nulls_last(),
        ]);
        let rows = repository
            .search_sorted(&MemberSearchCondition::default().age_goe(100), sort)
            .await
            .unwrap();

        assert_eq!(rows[0].username.as_deref(), Some("member5"));
        assert_eq!(rows[1].username.as_deref(), Some("member6"));
        assert_eq!(rows[2].username, None);
    }

    #[tokio::test]
    async fn page_sorted_by_username_desc() {
        let repository = repository().await;
        let request = PageRequest::new(1, 2).with_sort(Sort::by([SortOrder::desc(Column::Username)]));

        let page = repository
            .search_page_simple(&MemberSearchCondition::default(), &request)
            .await
            .unwrap();
        assert_eq!(usernames(&page.content), vec!["member3", "member2"]);
        assert_eq!(page.total, 4);
    }

    #[tokio::test]
    async fn pages_reconstruct_full_result() {
        let repository = repository().await;
        let condition = MemberSearchCondition::default();
        let all = ids(&repository.search(&condition).await.unwrap());

        let limit = 3;
        let mut seen = HashSet::new();
        let mut offset = 0;
        loop {
            let page = repository
                .search_page_complex(&condition, &PageRequest::new(offset, limit))
                .await
                .unwrap();
            assert!(page.content.len() as i64 <= limit);
            assert_eq!(page.total, 4);
            if page.content.is_empty() {
                break;
            }
            seen.extend(ids(&page.content));
            offset += limit;
        }
        assert_eq!(seen, all);
    }

    #[tokio::test]
    async fn complex_page_skips_count_on_short_last_page() {
        let repository = repository().await;
        let condition = MemberSearchCondition::default();

        let page = repository
            .search_page_complex(&condition, &PageRequest::new(0, 10))
            .await
            .unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(repository.store().count_calls(), 0);

        let page = repository
            .search_page_complex(&condition, &PageRequest::new(3, 2))
            .await
            .unwrap();
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.total, 4);
        assert_eq!(repository.store().count_calls(), 0);

        let page = repository
            .search_page_complex(&condition, &PageRequest::new(0, 2))
            .await
            .unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(repository.store().count_calls(), 1);
    }

    #[tokio::test]
    async fn skipped_count_matches_real_count() {
        let repository = repository().await;
        let condition = MemberSearchCondition::default().team_name("teamA");

        for request in [PageRequest::new(0, 5), PageRequest::new(1, 5), PageRequest::new(1, 1)] {
            let simple = repository.search_page_simple(&condition, &request).await.unwrap();
            let complex = repository.search_page_complex(&condition, &request).await.unwrap();
            assert_eq!(simple.content, complex.content);
            assert_eq!(simple.total, complex.total);
        }
    }

    #[tokio::test]
    async fn offset_past_end_counts() {
        let repository = repository().await;
        let page = repository
            .search_page_complex(&MemberSearchCondition::default(), &PageRequest::new(100, 10))
            .await
            .unwrap();
        assert!(page.content.is_empty());
        assert_eq!(page.total, 4);
        assert_eq!(repository.store().count_calls(), 1);
    }

    #[tokio::test]
    async fn large_limit_is_accepted() {
        let repository = repository().await;
        let page = repository
            .search_page_complex(&MemberSearchCondition::default(), &PageRequest::new(0, 5000))
            .await
            .unwrap();
        assert_eq!(page.content.len(), 4);
        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 1);
        assert_eq!(repository.store().count_calls(), 0);
    }

    #[tokio::test]
    async fn no_match_is_an_empty_page() {
        let repository = repository().await;
        let page = repository
            .search_page_complex(&MemberSearchCondition::default().username("nobody"), &PageRequest::new(0, 10))
            .await
            .unwrap();
        assert!(page.content.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn invalid_page_request_never_reaches_store() {
        let repository = repository().await;
        let condition = MemberSearchCondition::default();

        for request in [PageRequest::new(-1, 10), PageRequest::new(0, 0)] {
            let simple = repository.search_page_simple(&condition, &request).await;
            assert!(matches!(simple, Err(AppError::InvalidPageRequest(_))));
            let complex = repository.search_page_complex(&condition, &request).await;
            assert!(matches!(complex, Err(AppError::InvalidPageRequest(_))));
        }
        assert_eq!(repository.store().fetch_calls(), 0);
        assert_eq!(repository.store().count_calls(), 0);
    }

    #[tokio::test]
    async fn get_page_propagates_count_errors() {
        let result: Result<Page<i32>> = get_page(vec![1, 2], &PageRequest::new(0, 2), || async {
            Err(AppError::BadRequest("count failed".to_string()))
        })
        .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
