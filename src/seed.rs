use tracing::info;

use crate::{
    errors::Result,
    models::{MemberSearchCondition, NewMember},
    repository::MemberRepository,
    store::MemberStore,
};

pub const SAMPLE_MEMBERS: i32 = 100;

/// Inserts teamA/teamB and `member0..member99` (even index in teamA) unless
/// the store already holds members. Returns the number of members inserted.
pub async fn seed_sample_data<S: MemberStore>(repository: &MemberRepository<S>) -> Result<usize> {
    let existing = repository.count(&MemberSearchCondition::default()).await?;
    if existing > 0 {
        info!("🌱 Skipping sample data: {} members already present", existing);
        return Ok(0);
    }

    let team_a = repository.save_team("teamA").await?;
    let team_b = repository.save_team("teamB").await?;

    for i in 0..SAMPLE_MEMBERS {
        let team = if i % 2 == 0 { &team_a } else { &team_b };
        repository
            .save_member(&NewMember {
                username: Some(format!("member{}", i)),
                age: i,
                team_id: Some(team.id),
            })
            .await?;
    }

    info!("🌱 Seeded {} sample members", SAMPLE_MEMBERS);
    Ok(SAMPLE_MEMBERS as usize)
}
