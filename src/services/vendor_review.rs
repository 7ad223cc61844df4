//! Vendor change history and the notifications derived from it.

use crate::entities::vendor::{self, VendorType};
use crate::entities::{user, vendor_history};
use crate::error::Validator;
use crate::jobs::{Job, JobError, VendorNotice};
use crate::services::notification::{
    vendor_created_payload, vendor_status_changed_payload, NotifyError, WebhookNotifier,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

/// Appends the snapshot of a vendor save.
pub async fn record_history<C: ConnectionTrait>(
    db: &C,
    vendor: &vendor::Model,
    created: bool,
    changed_by: Option<i64>,
) -> Result<vendor_history::Model, DbErr> {
    vendor_history::ActiveModel {
        vendor_id: Set(vendor.id),
        history_type: Set(if created {
            vendor_history::HistoryType::Created
        } else {
            vendor_history::HistoryType::Changed
        }),
        review_status: Set(vendor.review_status),
        name: Set(vendor.name.clone()),
        changed_by: Set(changed_by),
        history_date: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Vendor post-save hook, run after the snapshot of this save was recorded.
///
/// New vendors announce themselves. Updates that may have touched the review
/// status compare the current status with the previous snapshot.
pub async fn after_vendor_save<C: ConnectionTrait>(
    db: &C,
    vendor: &vendor::Model,
    created: bool,
    review_status_touched: bool,
) -> Result<Option<Job>, DbErr> {
    if created {
        log::debug!("Triggering notification for new vendor {}", vendor.id);
        return Ok(Some(Job::VendorNotification {
            vendor_id: vendor.id,
            notice: VendorNotice::Created,
        }));
    }
    if !review_status_touched {
        return Ok(None);
    }

    let history = vendor_history::Entity::find()
        .filter(vendor_history::Column::VendorId.eq(vendor.id))
        .order_by_desc(vendor_history::Column::HistoryDate)
        .order_by_desc(vendor_history::Column::Id)
        .limit(2)
        .all(db)
        .await?;

    match history.get(1) {
        Some(previous) if previous.review_status != vendor.review_status => {
            log::debug!(
                "Review status changed for vendor {}: {} -> {}",
                vendor.id,
                previous.review_status.as_str(),
                vendor.review_status.as_str()
            );
            Ok(Some(Job::VendorNotification {
                vendor_id: vendor.id,
                notice: VendorNotice::StatusChanged {
                    old_status: previous.review_status,
                },
            }))
        }
        Some(_) => Ok(None),
        None => {
            log::debug!(
                "Insufficient history records for vendor {}, skipping status change notification",
                vendor.id
            );
            Ok(None)
        }
    }
}

pub async fn send_vendor_notification<C: ConnectionTrait>(
    db: &C,
    notifier: &dyn WebhookNotifier,
    webhook_url: &str,
    vendor_id: i64,
    notice: &VendorNotice,
) -> Result<(), JobError> {
    let Some((vendor, Some(owner))) = vendor::Entity::find_by_id(vendor_id)
        .find_also_related(user::Entity)
        .one(db)
        .await?
    else {
        log::warn!("Vendor {} not found, dropping notification", vendor_id);
        return Ok(());
    };

    let payload = match notice {
        VendorNotice::Created => vendor_created_payload(&vendor, &owner.username),
        VendorNotice::StatusChanged { old_status } => {
            vendor_status_changed_payload(&vendor, &owner.username, *old_status)
        }
    };
    notifier
        .send(webhook_url, &payload)
        .await
        .map_err(|e| match e {
            NotifyError::Transport(_) => JobError::Retryable(e.to_string()),
            _ => JobError::Fatal(e.to_string()),
        })
}

/// Fields whose presence depends on the vendor type.
#[derive(Debug, Default)]
pub struct VendorDocuments<'a> {
    pub full_name: &'a str,
    pub id_card_photo: &'a str,
    pub business_name: &'a str,
    pub business_number: &'a str,
    pub business_nib: &'a str,
    pub npwp: &'a str,
}

pub fn check_required_documents(
    validator: &mut Validator,
    vendor_type: VendorType,
    docs: &VendorDocuments<'_>,
) {
    match vendor_type {
        VendorType::Individual => {
            validator.check(
                !docs.full_name.trim().is_empty(),
                "full_name",
                "Full name is required for individual vendors.",
            );
            validator.check(
                !docs.id_card_photo.is_empty(),
                "id_card_photo",
                "ID card photo is required for individual vendors.",
            );
        }
        VendorType::Company => {
            validator.check(
                !docs.business_name.trim().is_empty(),
                "business_name",
                "Business name is required for company vendors.",
            );
            validator.check(
                !docs.business_number.trim().is_empty(),
                "business_number",
                "Business number is required for company vendors.",
            );
            validator.check(
                !docs.business_nib.is_empty(),
                "business_nib",
                "Business NIB document is required for company vendors.",
            );
            validator.check(
                !docs.npwp.trim().is_empty(),
                "npwp",
                "NPWP is required for company vendors.",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[test]
    fn individual_vendors_need_identity_documents() {
        let mut v = Validator::new();
        check_required_documents(&mut v, VendorType::Individual, &VendorDocuments::default());
        match v.finish() {
            Err(ApiError::Validation(errors)) => {
                assert_eq!(
                    errors["full_name"],
                    vec!["Full name is required for individual vendors."]
                );
                assert!(errors.contains_key("id_card_photo"));
                assert!(!errors.contains_key("npwp"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn company_vendors_need_business_documents() {
        let mut v = Validator::new();
        let docs = VendorDocuments {
            business_name: "PT Tani",
            business_number: "123",
            business_nib: "vendors/nib/a.pdf",
            ..Default::default()
        };
        check_required_documents(&mut v, VendorType::Company, &docs);
        match v.finish() {
            Err(ApiError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors["npwp"], vec!["NPWP is required for company vendors."]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
