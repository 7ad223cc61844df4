use crate::auth::{generate_code, LOGIN_CODE_MINUTES, VERIFICATION_CODE_MINUTES};
use crate::entities::{login_code, user, verification_code};
use crate::jobs::JobError;
use crate::services::notification::{
    login_code_payload, verification_code_payload, NotifyError, WebhookNotifier,
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    Valid,
    Invalid,
    Expired,
}

pub async fn issue_verification_code<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
) -> Result<verification_code::Model, DbErr> {
    let now = Utc::now();
    verification_code::ActiveModel {
        user_id: Set(user_id),
        code: Set(generate_code()),
        expired_at: Set(now + Duration::minutes(VERIFICATION_CODE_MINUTES)),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn issue_login_code<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
) -> Result<login_code::Model, DbErr> {
    let now = Utc::now();
    login_code::ActiveModel {
        user_id: Set(user_id),
        code: Set(generate_code()),
        expired_at: Set(now + Duration::minutes(LOGIN_CODE_MINUTES)),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

fn judge(latest: Option<(String, DateTime<Utc>)>, code: &str) -> CodeCheck {
    match latest {
        Some((expected, expired_at)) if expected == code => {
            if expired_at < Utc::now() {
                CodeCheck::Expired
            } else {
                CodeCheck::Valid
            }
        }
        _ => CodeCheck::Invalid,
    }
}

/// Checks a code against the user's most recent verification code.
pub async fn check_verification_code<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    code: &str,
) -> Result<CodeCheck, DbErr> {
    let latest = verification_code::Entity::find()
        .filter(verification_code::Column::UserId.eq(user_id))
        .order_by_desc(verification_code::Column::CreatedAt)
        .order_by_desc(verification_code::Column::Id)
        .one(db)
        .await?;
    Ok(judge(latest.map(|found| (found.code, found.expired_at)), code))
}

pub async fn check_login_code<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    code: &str,
) -> Result<CodeCheck, DbErr> {
    let latest = login_code::Entity::find()
        .filter(login_code::Column::UserId.eq(user_id))
        .order_by_desc(login_code::Column::CreatedAt)
        .order_by_desc(login_code::Column::Id)
        .one(db)
        .await?;
    Ok(judge(latest.map(|found| (found.code, found.expired_at)), code))
}

fn delivery_error(e: NotifyError) -> JobError {
    match e {
        NotifyError::Transport(_) => JobError::Retryable(e.to_string()),
        _ => JobError::Fatal(e.to_string()),
    }
}

pub async fn send_verification_code<C: ConnectionTrait>(
    db: &C,
    notifier: &dyn WebhookNotifier,
    webhook_url: &str,
    code_id: i64,
) -> Result<(), JobError> {
    let Some((code, Some(owner))) = verification_code::Entity::find_by_id(code_id)
        .find_also_related(user::Entity)
        .one(db)
        .await?
    else {
        return Err(JobError::Fatal(format!(
            "Verification code {} not found",
            code_id
        )));
    };
    notifier
        .send(webhook_url, &verification_code_payload(&owner.username, &code.code))
        .await
        .map_err(delivery_error)
}

pub async fn send_login_code<C: ConnectionTrait>(
    db: &C,
    notifier: &dyn WebhookNotifier,
    webhook_url: &str,
    code_id: i64,
) -> Result<(), JobError> {
    let Some((code, Some(owner))) = login_code::Entity::find_by_id(code_id)
        .find_also_related(user::Entity)
        .one(db)
        .await?
    else {
        return Err(JobError::Fatal(format!("Login code {} not found", code_id)));
    };
    notifier
        .send(webhook_url, &login_code_payload(&owner.username, &code.code))
        .await
        .map_err(delivery_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_latest_unexpired_code_is_valid() {
        let later = Utc::now() + Duration::minutes(5);
        let earlier = Utc::now() - Duration::minutes(5);
        assert_eq!(judge(Some(("AB12".into(), later)), "AB12"), CodeCheck::Valid);
        assert_eq!(judge(Some(("AB12".into(), earlier)), "AB12"), CodeCheck::Expired);
        assert_eq!(judge(Some(("AB12".into(), later)), "ZZ99"), CodeCheck::Invalid);
        assert_eq!(judge(None, "AB12"), CodeCheck::Invalid);
    }
}
