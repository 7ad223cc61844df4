use crate::entities::*;
use sea_orm::sea_query::{Expr, Index, IndexCreateStatement, TableCreateStatement};
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, Schema};

fn table<E: EntityTrait>(schema: &Schema, entity: E) -> TableCreateStatement {
    schema
        .create_table_from_entity(entity)
        .if_not_exists()
        .to_owned()
}

fn unique_pair<E, A, B>(name: &str, entity: E, a: A, b: B) -> IndexCreateStatement
where
    E: EntityTrait,
    A: sea_orm::sea_query::IntoIden,
    B: sea_orm::sea_query::IntoIden,
{
    Index::create()
        .name(name)
        .table(entity)
        .col(a)
        .col(b)
        .unique()
        .to_owned()
}

/// Creates every table in dependency order; composite uniqueness and the
/// self-follow check live in the table definitions.
pub async fn create_schema<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let statements = vec![
        table(&schema, user::Entity),
        table(&schema, profile::Entity),
        table(&schema, follow::Entity)
            .index(&mut unique_pair(
                "unique_follow_pair",
                follow::Entity,
                follow::Column::FollowerId,
                follow::Column::FollowingId,
            ))
            .check(
                Expr::col(follow::Column::FollowerId)
                    .ne(Expr::col(follow::Column::FollowingId)),
            )
            .to_owned(),
        table(&schema, verification_code::Entity),
        table(&schema, login_code::Entity),
        table(&schema, post::Entity),
        table(&schema, post_image::Entity),
        table(&schema, post_comment::Entity),
        table(&schema, post_like::Entity)
            .index(&mut unique_pair(
                "unique_post_like",
                post_like::Entity,
                post_like::Column::PostId,
                post_like::Column::UserId,
            ))
            .to_owned(),
        table(&schema, post_saved::Entity)
            .index(&mut unique_pair(
                "unique_post_saved",
                post_saved::Entity,
                post_saved::Column::PostId,
                post_saved::Column::UserId,
            ))
            .to_owned(),
        table(&schema, post_view::Entity)
            .index(&mut unique_pair(
                "unique_post_view",
                post_view::Entity,
                post_view::Column::PostId,
                post_view::Column::UserId,
            ))
            .to_owned(),
        table(&schema, post_comment_like::Entity)
            .index(&mut unique_pair(
                "unique_comment_like",
                post_comment_like::Entity,
                post_comment_like::Column::CommentId,
                post_comment_like::Column::UserId,
            ))
            .to_owned(),
        table(&schema, report::Entity)
            .index(&mut unique_pair(
                "unique_post_report",
                report::Entity,
                report::Column::PostId,
                report::Column::UserId,
            ))
            .to_owned(),
        table(&schema, country::Entity),
        table(&schema, province::Entity),
        table(&schema, city::Entity),
        table(&schema, district::Entity),
        table(&schema, vendor::Entity),
        table(&schema, vendor_history::Entity),
        table(&schema, category::Entity),
        table(&schema, subcategory::Entity),
        table(&schema, unit_of_measure::Entity),
        table(&schema, product::Entity),
        table(&schema, product_image::Entity),
        table(&schema, product_price::Entity)
            .index(&mut unique_pair(
                "unique_product_uom",
                product_price::Entity,
                product_price::Column::ProductId,
                product_price::Column::UnitOfMeasureId,
            ))
            .to_owned(),
        table(&schema, cart::Entity)
            .index(&mut unique_pair(
                "unique_cart_item",
                cart::Entity,
                cart::Column::UserId,
                cart::Column::ProductId,
            ))
            .to_owned(),
        table(&schema, plant_disease::Entity),
    ];

    for statement in statements {
        db.execute(backend.build(&statement)).await?;
    }

    Ok(())
}
