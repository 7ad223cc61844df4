//! Category hierarchy and slug helpers shared by the marketplace handlers.

use crate::entities::category;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter};
use std::collections::HashSet;
use uuid::Uuid;

/// Lowercase ASCII slug: alphanumerics kept, runs of anything else become one hyphen.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c == '_' || c == '-' || c.is_whitespace() {
            pending_dash = true;
        }
    }
    slug
}

/// Slug derived from the category name, suffixed `-1`, `-2`, ... until free.
pub async fn unique_category_slug<C: ConnectionTrait>(db: &C, name: &str) -> Result<String, DbErr> {
    let base = slugify(name);
    let base = if base.is_empty() { "category".to_string() } else { base };
    let mut slug = base.clone();
    let mut counter = 1;
    while category::Entity::find()
        .filter(category::Column::Slug.eq(slug.as_str()))
        .count(db)
        .await?
        > 0
    {
        slug = format!("{}-{}", base, counter);
        counter += 1;
    }
    Ok(slug)
}

/// Ancestors of a category ordered from the root down to its parent.
pub async fn ancestors<C: ConnectionTrait>(
    db: &C,
    node: &category::Model,
) -> Result<Vec<category::Model>, DbErr> {
    let mut chain = Vec::new();
    let mut seen = HashSet::from([node.id]);
    let mut next = node.parent_id;
    while let Some(parent_id) = next {
        if !seen.insert(parent_id) {
            log::warn!("Category {} has a cyclic parent chain", node.id);
            break;
        }
        let Some(parent) = category::Entity::find_by_id(parent_id).one(db).await? else {
            break;
        };
        next = parent.parent_id;
        chain.push(parent);
    }
    chain.reverse();
    Ok(chain)
}

/// Product slugs carry a prefix of the product uuid so equal names stay unique.
pub fn product_slug(name: &str, uuid: &Uuid) -> String {
    let base = slugify(name);
    let suffix: String = uuid.simple().to_string().chars().take(8).collect();
    if base.is_empty() {
        suffix
    } else {
        format!("{}-{}", base, suffix)
    }
}

pub fn full_path(ancestors: &[category::Model], node: &category::Model) -> String {
    ancestors
        .iter()
        .map(|c| c.name.as_str())
        .chain(std::iter::once(node.name.as_str()))
        .collect::<Vec<_>>()
        .join(" > ")
}

pub async fn active_children<C: ConnectionTrait>(
    db: &C,
    parent_id: i64,
) -> Result<Vec<category::Model>, DbErr> {
    category::Entity::find()
        .filter(category::Column::ParentId.eq(parent_id))
        .filter(category::Column::IsActive.eq(true))
        .all(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn node(id: i64, name: &str) -> category::Model {
        category::Model {
            id,
            name: name.to_string(),
            slug: slugify(name),
            description: None,
            parent_id: None,
            meta_title: String::new(),
            meta_description: String::new(),
            is_active: true,
            is_featured: false,
            sort_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Fresh Vegetables"), "fresh-vegetables");
        assert_eq!(slugify("  Rice & Grains -- Organic "), "rice-grains-organic");
        assert_eq!(slugify("Pupuk_NPK 16"), "pupuk-npk-16");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn product_slug_appends_uuid_prefix() {
        let uuid = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(product_slug("Organic Rice", &uuid), "organic-rice-67e55044");
        assert_eq!(product_slug("???", &uuid), "67e55044");
    }

    #[test]
    fn full_path_joins_names_from_the_root() {
        let root = node(1, "Produce");
        let mid = node(2, "Vegetables");
        let leaf = node(3, "Leafy");
        assert_eq!(full_path(&[root, mid], &leaf), "Produce > Vegetables > Leafy");
        assert_eq!(full_path(&[], &leaf), "Leafy");
    }
}
