use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::achievement::Achievement;

// Fila de la tabla cats
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, FromRow)]
pub struct Cat {
    pub id: i64,
    pub name: String,
    pub color: String, // siempre el nombre, nunca el hex
    pub birth_year: i32,
    pub owner_id: i64,
    pub image: Option<String>, // ruta relativa dentro de UPLOAD_DIR
}

impl Cat {
    // i64: birth_year admite cualquier i32 y la resta no debe desbordar
    pub fn age(&self) -> i64 {
        self.age_in(Utc::now().year())
    }

    pub fn age_in(&self, year: i32) -> i64 {
        i64::from(year) - i64::from(self.birth_year)
    }
}

// Datos ya validados para insertar un gato nuevo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCat {
    pub name: String,
    pub color: String,
    pub birth_year: i32,
    pub owner_id: i64,
    pub image: Option<String>,
}

/// Un gato junto con su conjunto de logros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatRecord {
    pub cat: Cat,
    pub achievements: Vec<Achievement>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat_born_in(birth_year: i32) -> Cat {
        Cat {
            id: 1,
            name: "Tom".into(),
            color: "black".into(),
            birth_year,
            owner_id: 1,
            image: None,
        }
    }

    #[test]
    fn age_is_year_minus_birth_year() {
        let cat = cat_born_in(2017);

        assert_eq!(cat.age_in(2024), 7);
        assert_eq!(cat.age(), i64::from(Utc::now().year()) - 2017);
    }

    #[test]
    fn age_handles_extreme_birth_years() {
        assert_eq!(cat_born_in(i32::MIN).age_in(2024), 2024 + 2_147_483_648);
        assert_eq!(cat_born_in(i32::MAX).age_in(2024), 2024 - 2_147_483_647);
        assert_eq!(
            cat_born_in(i32::MIN).age_in(i32::MAX),
            i64::from(i32::MAX) - i64::from(i32::MIN)
        );
    }
}
