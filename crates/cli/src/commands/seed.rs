//! Seed commands. Every seed is idempotent: existing rows are left alone.
//!
//! ```bash
//! befit seed all
//! befit seed products
//! ```

use std::collections::HashMap;

use befit_api::db::{
    CategoryRepository, LoyaltyRepository, ProductRepository, RepositoryError,
    SubscriptionRepository,
};
use befit_api::models::{CategoryInput, ProductInput};
use befit_core::fitness::{PLAN_BE_FIT, PLAN_BE_LEAN, PLAN_BE_STRONG};
use befit_core::loyalty::default_tiers;
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    /// Repository query failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// A product refers to a category that has not been seeded.
    #[error("Category not found: {0} (run `befit seed categories` first)")]
    MissingCategory(&'static str),
}

const TIER_NAMES: [&str; 3] = ["Bronce", "Plata", "Oro"];

const CATEGORIES: [(&str, &str); 6] = [
    ("Proteínas", "Proteína de suero, vegetal y caseína"),
    ("Pre-Entreno", "Energía y enfoque antes de entrenar"),
    ("Creatina", "Fuerza y potencia"),
    ("Vitaminas", "Vitaminas, minerales y omega 3"),
    ("Aminoácidos", "BCAA, EAA y glutamina"),
    ("Ganadores de Peso", "Fórmulas hipercalóricas"),
];

/// (name, description, monthly price in cents)
const PLANS: [(&str, &str, i64); 3] = [
    (PLAN_BE_STRONG, "Proteína, creatina y ganador para ganar masa muscular", 129_900),
    (PLAN_BE_LEAN, "Proteína vegetal, aminoácidos y multivitamínico para perder peso", 119_900),
    (PLAN_BE_FIT, "Proteína, omega 3 y vitaminas para mantenerte en forma", 99_900),
];

struct SeedProduct {
    category: &'static str,
    sku: &'static str,
    name: &'static str,
    brand: &'static str,
    price_cents: i64,
    stock: i32,
    activities: &'static [&'static str],
    objectives: &'static [&'static str],
}

const PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        category: "Proteínas",
        sku: "BF-PRO-001",
        name: "Whey Protein Gold Standard",
        brand: "Optimum Nutrition",
        price_cents: 89_999,
        stock: 50,
        activities: &["weightlifting", "crossfit", "bodybuilding"],
        objectives: &["muscle_gain", "recovery", "strength"],
    },
    SeedProduct {
        category: "Proteínas",
        sku: "BF-PRO-002",
        name: "Proteína Vegana Premium",
        brand: "Garden of Life",
        price_cents: 109_999,
        stock: 30,
        activities: &["yoga", "running", "weightlifting"],
        objectives: &["muscle_gain", "recovery"],
    },
    SeedProduct {
        category: "Proteínas",
        sku: "BF-PRO-003",
        name: "Caseína Micelar Nocturna",
        brand: "Dymatize",
        price_cents: 94_999,
        stock: 40,
        activities: &["bodybuilding", "weightlifting"],
        objectives: &["muscle_gain", "recovery"],
    },
    SeedProduct {
        category: "Pre-Entreno",
        sku: "BF-PRE-001",
        name: "C4 Original Pre-Workout",
        brand: "Cellucor",
        price_cents: 64_999,
        stock: 60,
        activities: &["crossfit", "weightlifting", "hiit"],
        objectives: &["energy", "endurance", "strength"],
    },
    SeedProduct {
        category: "Pre-Entreno",
        sku: "BF-PRE-002",
        name: "Pre-Entreno Natural Sin Cafeína",
        brand: "Legion Athletics",
        price_cents: 79_999,
        stock: 35,
        activities: &["weightlifting", "running"],
        objectives: &["endurance", "energy"],
    },
    SeedProduct {
        category: "Pre-Entreno",
        sku: "BF-PRE-003",
        name: "Extreme Energy Pre-Workout",
        brand: "Hyde",
        price_cents: 72_999,
        stock: 45,
        activities: &["crossfit", "hiit"],
        objectives: &["energy", "strength"],
    },
    SeedProduct {
        category: "Creatina",
        sku: "BF-CRE-001",
        name: "Creatina Monohidratada Micronizada",
        brand: "Optimum Nutrition",
        price_cents: 39_999,
        stock: 80,
        activities: &["weightlifting", "crossfit", "bodybuilding"],
        objectives: &["strength", "muscle_gain"],
    },
    SeedProduct {
        category: "Creatina",
        sku: "BF-CRE-002",
        name: "Creatina HCL Concentrada",
        brand: "MuscleTech",
        price_cents: 54_999,
        stock: 55,
        activities: &["weightlifting", "bodybuilding"],
        objectives: &["strength", "muscle_gain"],
    },
    SeedProduct {
        category: "Creatina",
        sku: "BF-CRE-003",
        name: "Creatina + Carbohidratos",
        brand: "Universal Nutrition",
        price_cents: 59_999,
        stock: 40,
        activities: &["weightlifting"],
        objectives: &["muscle_gain", "recovery"],
    },
    SeedProduct {
        category: "Vitaminas",
        sku: "BF-VIT-001",
        name: "Multivitamínico Completo",
        brand: "Animal Pak",
        price_cents: 44_999,
        stock: 70,
        activities: &["weightlifting", "running", "crossfit"],
        objectives: &["health", "recovery"],
    },
    SeedProduct {
        category: "Vitaminas",
        sku: "BF-VIT-002",
        name: "Vitamina D3 + K2",
        brand: "Now Foods",
        price_cents: 29_999,
        stock: 90,
        activities: &["yoga", "running"],
        objectives: &["health"],
    },
    SeedProduct {
        category: "Vitaminas",
        sku: "BF-VIT-003",
        name: "Omega 3 Premium",
        brand: "Nordic Naturals",
        price_cents: 64_999,
        stock: 60,
        activities: &["running", "cycling"],
        objectives: &["health", "recovery"],
    },
    SeedProduct {
        category: "Aminoácidos",
        sku: "BF-AMI-001",
        name: "BCAA 2:1:1 Powder",
        brand: "Scivation Xtend",
        price_cents: 54_999,
        stock: 65,
        activities: &["weightlifting", "running", "crossfit"],
        objectives: &["recovery", "endurance"],
    },
    SeedProduct {
        category: "Aminoácidos",
        sku: "BF-AMI-002",
        name: "Glutamina Pura",
        brand: "Optimum Nutrition",
        price_cents: 44_999,
        stock: 50,
        activities: &["weightlifting", "running"],
        objectives: &["recovery", "health"],
    },
    SeedProduct {
        category: "Aminoácidos",
        sku: "BF-AMI-003",
        name: "EAA Complete",
        brand: "Transparent Labs",
        price_cents: 69_999,
        stock: 40,
        activities: &["weightlifting", "crossfit"],
        objectives: &["muscle_gain", "recovery"],
    },
    SeedProduct {
        category: "Ganadores de Peso",
        sku: "BF-GAN-001",
        name: "Mass Gainer Extreme 1250",
        brand: "Dymatize Super Mass",
        price_cents: 129_999,
        stock: 25,
        activities: &["bodybuilding", "weightlifting"],
        objectives: &["weight_gain", "muscle_gain"],
    },
    SeedProduct {
        category: "Ganadores de Peso",
        sku: "BF-GAN-002",
        name: "Lean Mass Gainer",
        brand: "BSN True Mass",
        price_cents: 114_999,
        stock: 30,
        activities: &["bodybuilding", "weightlifting"],
        objectives: &["weight_gain", "muscle_gain"],
    },
    SeedProduct {
        category: "Ganadores de Peso",
        sku: "BF-GAN-003",
        name: "Carbohidratos Complejos",
        brand: "MyProtein",
        price_cents: 49_999,
        stock: 70,
        activities: &["running", "cycling", "crossfit"],
        objectives: &["energy", "weight_gain"],
    },
];

/// Insert the three loyalty tiers.
pub async fn tiers(pool: &PgPool) -> Result<(), SeedError> {
    let repo = LoyaltyRepository::new(pool);
    let mut inserted = 0;
    for (name, rule) in TIER_NAMES.into_iter().zip(default_tiers()) {
        if repo.upsert_tier(name, &rule).await? {
            inserted += 1;
        }
    }
    tracing::info!(inserted, "Loyalty tiers seeded");
    Ok(())
}

pub async fn categories(pool: &PgPool) -> Result<(), SeedError> {
    let repo = CategoryRepository::new(pool);
    let mut inserted = 0;
    for (name, description) in CATEGORIES {
        let input = CategoryInput {
            name: name.to_owned(),
            description: Some(description.to_owned()),
        };
        if repo.ensure(&input).await? {
            inserted += 1;
        }
    }
    tracing::info!(inserted, "Categories seeded");
    Ok(())
}

pub async fn plans(pool: &PgPool) -> Result<(), SeedError> {
    let repo = SubscriptionRepository::new(pool);
    let mut inserted = 0;
    for (name, description, cents) in PLANS {
        if repo.ensure_plan(name, description, Decimal::new(cents, 2)).await? {
            inserted += 1;
        }
    }
    tracing::info!(inserted, "Subscription plans seeded");
    Ok(())
}

/// Insert the demo catalog. Products whose SKU already exists are skipped.
pub async fn products(pool: &PgPool) -> Result<(), SeedError> {
    let category_ids: HashMap<String, _> = CategoryRepository::new(pool)
        .list()
        .await?
        .into_iter()
        .map(|category| (category.name, category.id))
        .collect();

    let repo = ProductRepository::new(pool);
    let (mut inserted, mut skipped) = (0, 0);
    for product in PRODUCTS {
        let category_id = *category_ids
            .get(product.category)
            .ok_or(SeedError::MissingCategory(product.category))?;

        match repo.create(&product_input(product, category_id)).await {
            Ok(_) => inserted += 1,
            Err(RepositoryError::Conflict(_)) => skipped += 1,
            Err(e) => return Err(e.into()),
        }
    }
    tracing::info!(inserted, skipped, "Products seeded");
    Ok(())
}

fn product_input(product: &SeedProduct, category_id: befit_core::CategoryId) -> ProductInput {
    ProductInput {
        category_id: Some(category_id),
        name: product.name.to_owned(),
        description: None,
        brand: Some(product.brand.to_owned()),
        physical_activities: product.activities.iter().map(|&s| s.to_owned()).collect(),
        fitness_objectives: product.objectives.iter().map(|&s| s.to_owned()).collect(),
        nutritional_value: None,
        price: Decimal::new(product.price_cents, 2),
        stock: product.stock,
        sku: Some(product.sku.to_owned()),
        is_active: true,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_every_product_has_a_seeded_category() {
        let names: HashSet<_> = CATEGORIES.iter().map(|(name, _)| *name).collect();
        assert!(PRODUCTS.iter().all(|p| names.contains(p.category)));
    }

    #[test]
    fn test_skus_are_unique() {
        let skus: HashSet<_> = PRODUCTS.iter().map(|p| p.sku).collect();
        assert_eq!(skus.len(), PRODUCTS.len());
    }

    #[test]
    fn test_one_name_per_tier() {
        assert_eq!(TIER_NAMES.len(), default_tiers().len());
    }

    #[test]
    fn test_product_input_converts_price() {
        let input = product_input(PRODUCTS.first().unwrap(), befit_core::CategoryId::new(1));
        assert_eq!(input.price, Decimal::new(89_999, 2));
        assert_eq!(input.sku.as_deref(), Some("BF-PRO-001"));
        assert!(input.is_active);
    }
}
