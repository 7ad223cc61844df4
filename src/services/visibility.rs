//! Post visibility derived from privacy, the follow graph and moderation.
//!
//! Friendship is never stored: two profiles are friends when each follows
//! the other. Single-post checks run two edge lookups; listings resolve the
//! viewer's friend set once and filter in SQL.

use crate::entities::{follow, post, profile};
use crate::entities::post::Privacy;
use crate::error::{ApiError, ApiResult};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect,
};
use std::collections::HashSet;

pub async fn profile_of<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
) -> Result<Option<profile::Model>, DbErr> {
    profile::Entity::find()
        .filter(profile::Column::UserId.eq(user_id))
        .one(db)
        .await
}

pub async fn is_following<C: ConnectionTrait>(
    db: &C,
    follower_id: i64,
    following_id: i64,
) -> Result<bool, DbErr> {
    let count = follow::Entity::find()
        .filter(follow::Column::FollowerId.eq(follower_id))
        .filter(follow::Column::FollowingId.eq(following_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Mutual-follow test between two profiles. A profile is never its own friend.
pub async fn are_friends<C: ConnectionTrait>(db: &C, a: i64, b: i64) -> Result<bool, DbErr> {
    if a == b {
        return Ok(false);
    }
    Ok(is_following(db, a, b).await? && is_following(db, b, a).await?)
}

/// User ids of every profile in a mutual-follow relationship with the viewer.
pub async fn friend_user_ids<C: ConnectionTrait>(
    db: &C,
    viewer_user_id: i64,
) -> Result<Vec<i64>, DbErr> {
    let Some(viewer) = profile_of(db, viewer_user_id).await? else {
        return Ok(Vec::new());
    };

    let following: HashSet<i64> = follow::Entity::find()
        .select_only()
        .column(follow::Column::FollowingId)
        .filter(follow::Column::FollowerId.eq(viewer.id))
        .into_tuple::<i64>()
        .all(db)
        .await?
        .into_iter()
        .collect();
    if following.is_empty() {
        return Ok(Vec::new());
    }

    let mutual: Vec<i64> = follow::Entity::find()
        .select_only()
        .column(follow::Column::FollowerId)
        .filter(follow::Column::FollowingId.eq(viewer.id))
        .into_tuple::<i64>()
        .all(db)
        .await?
        .into_iter()
        .filter(|id| following.contains(id))
        .collect();
    if mutual.is_empty() {
        return Ok(Vec::new());
    }

    profile::Entity::find()
        .select_only()
        .column(profile::Column::UserId)
        .filter(profile::Column::Id.is_in(mutual))
        .into_tuple::<i64>()
        .all(db)
        .await
}

/// Condition selecting posts the viewer may see in listings.
pub fn visible_condition(viewer: Option<i64>, friend_user_ids: Vec<i64>) -> Condition {
    let public = post::Column::Privacy.eq(Privacy::Public);
    let readable = match viewer {
        None => Condition::all().add(public),
        Some(user_id) => {
            let mut any = Condition::any()
                .add(public)
                .add(post::Column::UserId.eq(user_id));
            if !friend_user_ids.is_empty() {
                any = any.add(
                    Condition::all()
                        .add(post::Column::Privacy.eq(Privacy::Friends))
                        .add(post::Column::UserId.is_in(friend_user_ids)),
                );
            }
            any
        }
    };
    Condition::all()
        .add(post::Column::IsPotentiallyHarmful.eq(false))
        .add(readable)
}

pub async fn visible_posts_condition<C: ConnectionTrait>(
    db: &C,
    viewer: Option<i64>,
) -> Result<Condition, DbErr> {
    let friends = match viewer {
        Some(user_id) => friend_user_ids(db, user_id).await?,
        None => Vec::new(),
    };
    Ok(visible_condition(viewer, friends))
}

/// Privacy check for a single post; moderation is checked by the caller.
pub async fn can_view<C: ConnectionTrait>(
    db: &C,
    viewer: Option<i64>,
    post: &post::Model,
) -> Result<bool, DbErr> {
    if post.privacy == Privacy::Public {
        return Ok(true);
    }
    let Some(viewer_id) = viewer else {
        return Ok(false);
    };
    if viewer_id == post.user_id {
        return Ok(true);
    }
    if post.privacy == Privacy::OnlyMe {
        return Ok(false);
    }

    let (Some(viewer_profile), Some(author_profile)) = (
        profile_of(db, viewer_id).await?,
        profile_of(db, post.user_id).await?,
    ) else {
        return Ok(false);
    };
    are_friends(db, viewer_profile.id, author_profile.id).await
}

/// Loads a post by slug, answering 404 when it is missing, flagged or private to the viewer.
pub async fn find_visible_post<C: ConnectionTrait>(
    db: &C,
    viewer: Option<i64>,
    slug: &str,
) -> ApiResult<post::Model> {
    let post = post::Entity::find()
        .filter(post::Column::Slug.eq(slug))
        .filter(post::Column::IsPotentiallyHarmful.eq(false))
        .one(db)
        .await?
        .ok_or_else(ApiError::not_found)?;

    if !can_view(db, viewer, &post).await? {
        return Err(ApiError::not_found());
    }
    Ok(post)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DbBackend, EntityTrait, QueryTrait};

    fn sql(condition: Condition) -> String {
        post::Entity::find()
            .filter(condition)
            .build(DbBackend::Sqlite)
            .to_string()
    }

    #[test]
    fn anonymous_viewers_only_match_public_posts() {
        let query = sql(visible_condition(None, vec![]));
        assert!(query.contains("\"privacy\" = 'public'"));
        assert!(!query.contains("'friends'"));
        assert!(query.contains("\"is_potentially_harmful\" ="));
    }

    #[test]
    fn friends_posts_need_a_friend_set() {
        let lonely = sql(visible_condition(Some(3), vec![]));
        assert!(!lonely.contains("'friends'"));

        let social = sql(visible_condition(Some(3), vec![8, 9]));
        assert!(social.contains("'friends'"));
        assert!(social.contains("IN (8, 9)"));
    }
}
