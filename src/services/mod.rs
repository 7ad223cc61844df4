pub mod accounts;
pub mod catalog;
pub mod moderation;
pub mod notification;
pub mod plant_disease;
pub mod posts;
pub mod storage;
pub mod vendor_review;
pub mod visibility;
