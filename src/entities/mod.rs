pub mod cart;
pub mod category;
pub mod city;
pub mod country;
pub mod district;
pub mod follow;
pub mod login_code;
pub mod plant_disease;
pub mod post;
pub mod post_comment;
pub mod post_comment_like;
pub mod post_image;
pub mod post_like;
pub mod post_saved;
pub mod post_view;
pub mod product;
pub mod product_image;
pub mod product_price;
pub mod profile;
pub mod province;
pub mod report;
pub mod subcategory;
pub mod unit_of_measure;
pub mod user;
pub mod vendor;
pub mod vendor_history;
pub mod verification_code;

use crate::pagination::CursorKey;
use chrono::{DateTime, Utc};

macro_rules! keyed_by_created_at {
    ($($entity:ident),* $(,)?) => {
        $(
            impl CursorKey for $entity::Model {
                fn cursor_key(&self) -> (DateTime<Utc>, i64) {
                    (self.created_at, self.id)
                }
            }
        )*
    };
}

keyed_by_created_at!(post, post_comment, follow, report, vendor, product, cart);
