use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgConnection};

use super::{dedup_names, CatRepository, RepositoryError, UserRepository};
use crate::{
    db::DbPool,
    models::{
        achievement::Achievement,
        cat::{Cat, CatRecord, NewCat},
        user::{NewUser, User},
    },
};

#[derive(Debug, FromRow)]
struct CatAchievementRow {
    cat_id: i64,
    id: i64,
    name: String,
}

#[derive(Clone)]
pub struct PgRepository {
    pool: DbPool,
}

impl PgRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

// Upsert: si el nombre ya existe devolvemos la fila existente
async fn get_or_create_achievement(
    conn: &mut PgConnection,
    name: &str,
) -> Result<Achievement, sqlx::Error> {
    sqlx::query_as::<_, Achievement>(
        r#"
        INSERT INTO achievements (name) VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id, name
        "#,
    )
    .bind(name)
    .fetch_one(&mut *conn)
    .await
}

async fn link_achievements(
    conn: &mut PgConnection,
    cat_id: i64,
    names: Vec<String>,
) -> Result<Vec<Achievement>, sqlx::Error> {
    let names = dedup_names(names);
    let mut linked = Vec::with_capacity(names.len());

    for name in names {
        let achievement = get_or_create_achievement(conn, &name).await?;
        sqlx::query(
            r#"
            INSERT INTO achievement_cats (achievement_id, cat_id) VALUES ($1, $2)
            ON CONFLICT (achievement_id, cat_id) DO NOTHING
            "#,
        )
        .bind(achievement.id)
        .bind(cat_id)
        .execute(&mut *conn)
        .await?;
        linked.push(achievement);
    }

    Ok(linked)
}

async fn achievements_of(
    conn: &mut PgConnection,
    cat_id: i64,
) -> Result<Vec<Achievement>, sqlx::Error> {
    sqlx::query_as::<_, Achievement>(
        r#"
        SELECT a.id, a.name
        FROM achievements a
        JOIN achievement_cats ac ON ac.achievement_id = a.id
        WHERE ac.cat_id = $1
        ORDER BY ac.id ASC
        "#,
    )
    .bind(cat_id)
    .fetch_all(&mut *conn)
    .await
}

#[async_trait]
impl CatRepository for PgRepository {
    async fn create(
        &self,
        cat: NewCat,
        achievements: Option<Vec<String>>,
    ) -> Result<CatRecord, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let cat = sqlx::query_as::<_, Cat>(
            r#"
            INSERT INTO cats (name, color, birth_year, owner_id, image)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, color, birth_year, owner_id, image
            "#,
        )
        .bind(&cat.name)
        .bind(&cat.color)
        .bind(cat.birth_year)
        .bind(cat.owner_id)
        .bind(&cat.image)
        .fetch_one(&mut *tx)
        .await?;

        let achievements = match achievements {
            Some(names) => link_achievements(&mut tx, cat.id, names).await?,
            None => Vec::new(),
        };

        tx.commit().await?;

        Ok(CatRecord { cat, achievements })
    }

    async fn get_by_id(&self, id: i64) -> Result<CatRecord, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let cat = sqlx::query_as::<_, Cat>(
            "SELECT id, name, color, birth_year, owner_id, image FROM cats WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("Cat with ID {id} not found")))?;

        let achievements = achievements_of(&mut conn, id).await?;

        Ok(CatRecord { cat, achievements })
    }

    async fn list_all(&self) -> Result<Vec<CatRecord>, RepositoryError> {
        let cats = sqlx::query_as::<_, Cat>(
            "SELECT id, name, color, birth_year, owner_id, image FROM cats ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = cats.iter().map(|cat| cat.id).collect();
        let rows = sqlx::query_as::<_, CatAchievementRow>(
            r#"
            SELECT ac.cat_id, a.id, a.name
            FROM achievement_cats ac
            JOIN achievements a ON a.id = ac.achievement_id
            WHERE ac.cat_id = ANY($1)
            ORDER BY ac.id ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_cat: HashMap<i64, Vec<Achievement>> = HashMap::new();
        for row in rows {
            by_cat.entry(row.cat_id).or_default().push(Achievement {
                id: row.id,
                name: row.name,
            });
        }

        Ok(cats
            .into_iter()
            .map(|cat| {
                let achievements = by_cat.remove(&cat.id).unwrap_or_default();
                CatRecord { cat, achievements }
            })
            .collect())
    }

    async fn update(
        &self,
        cat: Cat,
        achievements: Option<Vec<String>>,
    ) -> Result<CatRecord, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // owner_id no se toca: el dueño no cambia nunca desde la API
        let cat = sqlx::query_as::<_, Cat>(
            r#"
            UPDATE cats SET
                name = $1,
                color = $2,
                birth_year = $3,
                image = $4
            WHERE id = $5
            RETURNING id, name, color, birth_year, owner_id, image
            "#,
        )
        .bind(&cat.name)
        .bind(&cat.color)
        .bind(cat.birth_year)
        .bind(&cat.image)
        .bind(cat.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("Cat with ID {} not found", cat.id)))?;

        let achievements = match achievements {
            Some(names) => {
                sqlx::query("DELETE FROM achievement_cats WHERE cat_id = $1")
                    .bind(cat.id)
                    .execute(&mut *tx)
                    .await?;
                link_achievements(&mut tx, cat.id, names).await?
            }
            None => achievements_of(&mut tx, cat.id).await?,
        };

        tx.commit().await?;

        Ok(CatRecord { cat, achievements })
    }

    async fn delete_by_id(&self, id: i64) -> Result<Cat, RepositoryError> {
        sqlx::query_as::<_, Cat>(
            "DELETE FROM cats WHERE id = $1 RETURNING id, name, color, birth_year, owner_id, image",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("Cat with ID {id} not found")))
    }

    async fn get_or_create_achievement(&self, name: &str) -> Result<Achievement, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(get_or_create_achievement(&mut conn, name).await?)
    }

    async fn get_achievement(&self, id: i64) -> Result<Achievement, RepositoryError> {
        sqlx::query_as::<_, Achievement>("SELECT id, name FROM achievements WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Achievement with ID {id} not found")))
    }

    async fn list_achievements(&self) -> Result<Vec<Achievement>, RepositoryError> {
        Ok(
            sqlx::query_as::<_, Achievement>("SELECT id, name FROM achievements ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await?,
        )
    }
}

#[async_trait]
impl UserRepository for PgRepository {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        Ok(sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password_hash, role
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, role FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn count_users(&self) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?)
    }
}

// Necesitan Postgres: `DATABASE_URL=... cargo test -- --ignored`.
// sqlx::test crea una base de datos nueva por test y aplica las migraciones.
#[cfg(test)]
mod tests {
    use super::*;

    async fn owner(repo: &PgRepository) -> i64 {
        repo.create_user(NewUser {
            username: "ana".into(),
            email: "ana@example.com".into(),
            password_hash: "hash".into(),
            role: "editor".into(),
        })
        .await
        .unwrap()
        .id
    }

    fn new_cat(owner_id: i64) -> NewCat {
        NewCat {
            name: "Tom".into(),
            color: "black".into(),
            birth_year: 2019,
            owner_id,
            image: None,
        }
    }

    fn names(record: &CatRecord) -> Vec<&str> {
        record.achievements.iter().map(|a| a.name.as_str()).collect()
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn upsert_returns_the_existing_achievement(pool: DbPool) {
        let repo = PgRepository::new(pool);

        let (first, second) = tokio::join!(
            repo.get_or_create_achievement("hunter"),
            repo.get_or_create_achievement("hunter"),
        );

        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(repo.list_achievements().await.unwrap().len(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn create_links_each_name_once(pool: DbPool) {
        let repo = PgRepository::new(pool);
        let owner_id = owner(&repo).await;

        let record = repo
            .create(
                new_cat(owner_id),
                Some(vec!["hunter".into(), "hunter".into(), "sleeper".into()]),
            )
            .await
            .unwrap();

        assert_eq!(names(&record), vec!["hunter", "sleeper"]);
        let reloaded = repo.get_by_id(record.cat.id).await.unwrap();
        assert_eq!(names(&reloaded), vec!["hunter", "sleeper"]);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn unknown_owner_is_a_constraint_violation(pool: DbPool) {
        let repo = PgRepository::new(pool);

        let err = repo
            .create(new_cat(999), Some(vec!["hunter".into()]))
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::ConstraintViolation(_)));
        assert!(repo.list_achievements().await.unwrap().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn update_replaces_links_and_keeps_them_when_omitted(pool: DbPool) {
        let repo = PgRepository::new(pool);
        let owner_id = owner(&repo).await;
        let record = repo
            .create(new_cat(owner_id), Some(vec!["a".into(), "b".into()]))
            .await
            .unwrap();

        let replaced = repo
            .update(record.cat.clone(), Some(vec!["c".into()]))
            .await
            .unwrap();
        assert_eq!(names(&replaced), vec!["c"]);

        let mut cat = replaced.cat.clone();
        cat.name = "Jerry".into();
        let renamed = repo.update(cat, None).await.unwrap();
        assert_eq!(renamed.cat.name, "Jerry");
        assert_eq!(names(&renamed), vec!["c"]);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn failed_update_rolls_back_everything(pool: DbPool) {
        let repo = PgRepository::new(pool);
        let owner_id = owner(&repo).await;
        let record = repo
            .create(new_cat(owner_id), Some(vec!["a".into()]))
            .await
            .unwrap();

        // El segundo nombre no cabe en VARCHAR(64): falla a mitad de la transacción
        let mut cat = record.cat.clone();
        cat.name = "Jerry".into();
        let result = repo
            .update(cat, Some(vec!["ok".into(), "x".repeat(65)]))
            .await;
        assert!(result.is_err());

        let reloaded = repo.get_by_id(record.cat.id).await.unwrap();
        assert_eq!(reloaded.cat.name, "Tom");
        assert_eq!(names(&reloaded), vec!["a"]);
        let all: Vec<String> = repo
            .list_achievements()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(all, vec!["a".to_string()]);
    }
}
