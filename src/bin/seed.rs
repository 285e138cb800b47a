use chrono::{Duration, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use storefront_orders::{
    config::AppConfig,
    db::{OrmConn, create_orm_conn, run_migrations},
    entity::{
        products::{ActiveModel as ProductActive, Column as ProductCol, Entity as Products},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    middleware::auth::issue_token,
    models::Role,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url, 1).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "admin@example.com", Role::Admin).await?;
    let user_id = ensure_user(&orm, "user@example.com", Role::User).await?;
    seed_products(&orm).await?;

    let ttl = Duration::days(7);
    let admin_token = issue_token(&config.jwt_secret, admin_id, Role::Admin, ttl)?;
    let user_token = issue_token(&config.jwt_secret, user_id, Role::User, ttl)?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    println!("Admin token: {admin_token}");
    println!("User token:  {user_token}");
    Ok(())
}

async fn ensure_user(orm: &OrmConn, email: &str, role: Role) -> anyhow::Result<Uuid> {
    Users::insert(UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        role: Set(role.as_str().to_string()),
        created_at: Set(Utc::now().into()),
    })
    .on_conflict(
        OnConflict::column(UserCol::Email)
            .update_column(UserCol::Role)
            .to_owned(),
    )
    .exec_without_returning(orm)
    .await?;

    let user = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {email} missing after upsert"))?;

    println!("Ensured user {email} (role={role})", role = role.as_str());
    Ok(user.id)
}

async fn seed_products(orm: &OrmConn) -> anyhow::Result<()> {
    let products = [
        ("Arsenal Home 24/25", 1_250_000, "Premier League", "home", 2024, true),
        ("Real Madrid Away 24/25", 1_300_000, "La Liga", "away", 2024, true),
        ("Juventus Third 23/24", 950_000, "Serie A", "third", 2023, false),
        ("Borussia Dortmund Home 24/25", 1_100_000, "Bundesliga", "home", 2024, false),
    ];

    for (name, price, league, kit_type, year, is_top_selling) in products {
        let now = Utc::now();
        Products::insert(ProductActive {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            price: Set(price),
            league: Set(league.to_string()),
            kit_type: Set(kit_type.to_string()),
            year: Set(year),
            is_top_selling: Set(is_top_selling),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        })
        .on_conflict(OnConflict::column(ProductCol::Name).do_nothing().to_owned())
        .exec_without_returning(orm)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
