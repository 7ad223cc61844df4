use crate::entities::post_view;
use crate::error::is_unique_violation;
use crate::jobs::Job;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, Set};

/// Post columns a save can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostField {
    Content,
    Privacy,
    SharedCount,
    IsPotentiallyHarmful,
}

/// What a single save did to a post.
#[derive(Debug, Clone)]
pub struct PostSave<'a> {
    pub created: bool,
    pub touched: &'a [PostField],
    pub old_content: &'a str,
    pub new_content: &'a str,
}

/// Moderation runs for new posts and for edits that changed the trimmed
/// content. Saves limited to the moderation flag never re-trigger it.
pub fn needs_moderation(save: &PostSave<'_>) -> bool {
    if save.created {
        return true;
    }
    if save
        .touched
        .iter()
        .all(|field| *field == PostField::IsPotentiallyHarmful)
    {
        return false;
    }
    save.touched.contains(&PostField::Content)
        && save.old_content.trim() != save.new_content.trim()
}

/// Post-save hook; returns the job to dispatch once the transaction commits.
pub fn after_post_save(post_id: i64, save: &PostSave<'_>) -> Option<Job> {
    if needs_moderation(save) {
        log::debug!("Triggering moderation for post {}", post_id);
        Some(Job::ModeratePost { post_id })
    } else {
        None
    }
}

/// Get-or-create of a view row; `true` when this call created it.
pub async fn record_view<C: ConnectionTrait>(
    db: &C,
    post_id: i64,
    user_id: i64,
) -> Result<bool, DbErr> {
    let view = post_view::ActiveModel {
        post_id: Set(post_id),
        user_id: Set(user_id),
        viewed_at: Set(Utc::now()),
        ..Default::default()
    };
    match view.insert(db).await {
        Ok(_) => Ok(true),
        Err(e) if is_unique_violation(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update<'a>(touched: &'a [PostField], old: &'a str, new: &'a str) -> PostSave<'a> {
        PostSave {
            created: false,
            touched,
            old_content: old,
            new_content: new,
        }
    }

    #[test]
    fn new_posts_are_always_moderated() {
        let save = PostSave {
            created: true,
            touched: &[],
            old_content: "",
            new_content: "",
        };
        assert!(needs_moderation(&save));
        assert_eq!(after_post_save(4, &save), Some(Job::ModeratePost { post_id: 4 }));
    }

    #[test]
    fn flag_only_saves_do_not_loop() {
        let save = update(&[PostField::IsPotentiallyHarmful], "same", "same");
        assert!(!needs_moderation(&save));
        assert_eq!(after_post_save(4, &save), None);
    }

    #[test]
    fn whitespace_edits_are_ignored() {
        assert!(!needs_moderation(&update(
            &[PostField::Content],
            "hello",
            "  hello \n"
        )));
        assert!(needs_moderation(&update(
            &[PostField::Content, PostField::Privacy],
            "hello",
            "hello world"
        )));
        assert!(!needs_moderation(&update(&[PostField::Privacy], "a", "a")));
    }
}
