//! Repositorio en memoria. Se usa con `STORAGE_BACKEND=memory` y en los tests.
//! Un único `Mutex` protege todo el estado, así cada operación es atómica.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{dedup_names, CatRepository, RepositoryError, UserRepository};
use crate::models::{
    achievement::Achievement,
    cat::{Cat, CatRecord, NewCat},
    user::{NewUser, User},
};

#[derive(Debug, Default)]
struct Store {
    cats: BTreeMap<i64, Cat>,
    achievements: BTreeMap<i64, Achievement>,
    // (achievement_id, cat_id) en orden de inserción
    links: Vec<(i64, i64)>,
    users: BTreeMap<i64, User>,
    next_cat_id: i64,
    next_achievement_id: i64,
    next_user_id: i64,
}

impl Store {
    fn get_or_create_achievement(&mut self, name: &str) -> Achievement {
        if let Some(existing) = self.achievements.values().find(|a| a.name == name) {
            return existing.clone();
        }

        self.next_achievement_id += 1;
        let achievement = Achievement {
            id: self.next_achievement_id,
            name: name.to_string(),
        };
        self.achievements.insert(achievement.id, achievement.clone());
        achievement
    }

    fn link_achievements(&mut self, cat_id: i64, names: Vec<String>) -> Vec<Achievement> {
        dedup_names(names)
            .into_iter()
            .map(|name| {
                let achievement = self.get_or_create_achievement(&name);
                if !self.links.contains(&(achievement.id, cat_id)) {
                    self.links.push((achievement.id, cat_id));
                }
                achievement
            })
            .collect()
    }

    fn achievements_of(&self, cat_id: i64) -> Vec<Achievement> {
        self.links
            .iter()
            .filter(|(_, cat)| *cat == cat_id)
            .filter_map(|(achievement_id, _)| self.achievements.get(achievement_id).cloned())
            .collect()
    }

    fn record(&self, cat: &Cat) -> CatRecord {
        CatRecord {
            cat: cat.clone(),
            achievements: self.achievements_of(cat.id),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn achievement_count(&self) -> usize {
        self.store.lock().await.achievements.len()
    }

    #[cfg(test)]
    pub async fn association_count(&self, cat_id: i64) -> usize {
        self.store
            .lock()
            .await
            .links
            .iter()
            .filter(|(_, cat)| *cat == cat_id)
            .count()
    }
}

fn cat_not_found(id: i64) -> RepositoryError {
    RepositoryError::NotFound(format!("Cat with ID {id} not found"))
}

#[async_trait]
impl CatRepository for InMemoryRepository {
    async fn create(
        &self,
        cat: NewCat,
        achievements: Option<Vec<String>>,
    ) -> Result<CatRecord, RepositoryError> {
        let mut store = self.store.lock().await;

        // Igual que la FK de Postgres: el dueño tiene que existir
        if !store.users.contains_key(&cat.owner_id) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "Owner with ID {} does not exist",
                cat.owner_id
            )));
        }

        store.next_cat_id += 1;
        let cat = Cat {
            id: store.next_cat_id,
            name: cat.name,
            color: cat.color,
            birth_year: cat.birth_year,
            owner_id: cat.owner_id,
            image: cat.image,
        };
        store.cats.insert(cat.id, cat.clone());

        let achievements = match achievements {
            Some(names) => store.link_achievements(cat.id, names),
            None => Vec::new(),
        };

        Ok(CatRecord { cat, achievements })
    }

    async fn get_by_id(&self, id: i64) -> Result<CatRecord, RepositoryError> {
        let store = self.store.lock().await;
        store
            .cats
            .get(&id)
            .map(|cat| store.record(cat))
            .ok_or_else(|| cat_not_found(id))
    }

    async fn list_all(&self) -> Result<Vec<CatRecord>, RepositoryError> {
        let store = self.store.lock().await;
        Ok(store.cats.values().map(|cat| store.record(cat)).collect())
    }

    async fn update(
        &self,
        cat: Cat,
        achievements: Option<Vec<String>>,
    ) -> Result<CatRecord, RepositoryError> {
        let mut store = self.store.lock().await;

        let stored = store.cats.get_mut(&cat.id).ok_or_else(|| cat_not_found(cat.id))?;
        stored.name = cat.name;
        stored.color = cat.color;
        stored.birth_year = cat.birth_year;
        stored.image = cat.image;
        let updated = stored.clone();

        if let Some(names) = achievements {
            store.links.retain(|(_, cat_id)| *cat_id != updated.id);
            store.link_achievements(updated.id, names);
        }

        Ok(store.record(&updated))
    }

    async fn delete_by_id(&self, id: i64) -> Result<Cat, RepositoryError> {
        let mut store = self.store.lock().await;
        let removed = store.cats.remove(&id).ok_or_else(|| cat_not_found(id))?;
        store.links.retain(|(_, cat_id)| *cat_id != id);
        Ok(removed)
    }

    async fn get_or_create_achievement(&self, name: &str) -> Result<Achievement, RepositoryError> {
        Ok(self.store.lock().await.get_or_create_achievement(name))
    }

    async fn get_achievement(&self, id: i64) -> Result<Achievement, RepositoryError> {
        self.store
            .lock()
            .await
            .achievements
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("Achievement with ID {id} not found")))
    }

    async fn list_achievements(&self) -> Result<Vec<Achievement>, RepositoryError> {
        Ok(self.store.lock().await.achievements.values().cloned().collect())
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut store = self.store.lock().await;

        if store
            .users
            .values()
            .any(|u| u.email == user.email || u.username == user.username)
        {
            return Err(RepositoryError::ConstraintViolation(format!(
                "User '{}' already exists",
                user.username
            )));
        }

        store.next_user_id += 1;
        let user = User {
            id: store.next_user_id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
        };
        store.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .store
            .lock()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn count_users(&self) -> Result<i64, RepositoryError> {
        Ok(self.store.lock().await.users.len() as i64)
    }
}
