//! Demo catalog seeding.
//!
//! Populates the catalog with the shop's demo categories and products.
//! Each table is only filled when it is empty, so seeding an existing
//! store is a no-op; the fixed IDs (`cat_1`, `prod_1`, …) make reseeding
//! a wiped table deterministic.

use std::collections::BTreeMap;

use tekmart_core::{CategoryId, Price, ProductId};

use crate::db::{Store, StoreError};
use crate::models::{Category, Product};

/// What a seeding run inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Categories inserted (0 when the table was already populated).
    pub categories: usize,
    /// Products inserted (0 when the table was already populated).
    pub products: usize,
}

/// Seed the demo catalog into an empty store.
///
/// # Errors
///
/// Returns `StoreError::Database` if a write fails; a failed batch leaves
/// the table untouched.
pub async fn seed_catalog(store: &Store) -> Result<SeedSummary, StoreError> {
    let mut summary = SeedSummary::default();

    if store.categories().count().await? == 0 {
        let categories = demo_categories();
        store.categories().upsert_many(&categories).await?;
        summary.categories = categories.len();
    }

    if store.products().count().await? == 0 {
        let products = demo_products();
        store.products().upsert_many(&products).await?;
        summary.products = products.len();
    }

    tracing::info!(
        categories = summary.categories,
        products = summary.products,
        "catalog seeded"
    );
    Ok(summary)
}

fn specs(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

fn category(id: &str, name: &str, icon: &str, sort_order: i32) -> Category {
    Category {
        id: CategoryId::new(id),
        name: name.to_owned(),
        icon_url: Some(format!(
            "https://source.unsplash.com/random/300x300/?{icon}"
        )),
        sort_order,
    }
}

/// The demo categories, in display order.
#[must_use]
pub fn demo_categories() -> Vec<Category> {
    vec![
        category("cat_1", "Смартфоны", "smartphone", 1),
        category("cat_2", "Ноутбуки", "laptop", 2),
        category("cat_3", "Планшеты", "tablet", 3),
        category("cat_4", "Аксессуары", "accessories", 4),
        category("cat_5", "Наушники", "headphones", 5),
    ]
}

struct DemoProduct {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    price: u64,
    category: &'static str,
    image: &'static str,
    specifications: &'static [(&'static str, &'static str)],
}

const DEMO_PRODUCTS: &[DemoProduct] = &[
    DemoProduct {
        id: "prod_1",
        name: "Смартфон Galaxy S21",
        description: "Флагманский смартфон с мощным процессором и отличной камерой",
        price: 59_990,
        category: "cat_1",
        image: "samsung",
        specifications: &[("Экран", "6.2\" AMOLED"), ("Память", "128 ГБ"), ("Камера", "64 Мп")],
    },
    DemoProduct {
        id: "prod_2",
        name: "iPhone 13 Pro",
        description: "Мощный процессор A15 Bionic, улучшенная система камер",
        price: 89_990,
        category: "cat_1",
        image: "iphone",
        specifications: &[("Экран", "6.1\" Super Retina XDR"), ("Память", "256 ГБ")],
    },
    DemoProduct {
        id: "prod_3",
        name: "Xiaomi Mi 11",
        description: "Флагманский смартфон с процессором Snapdragon 888",
        price: 49_990,
        category: "cat_1",
        image: "xiaomi",
        specifications: &[("Экран", "6.81\" AMOLED"), ("Память", "128 ГБ")],
    },
    DemoProduct {
        id: "prod_4",
        name: "MacBook Pro 16\"",
        description: "Мощный ноутбук для профессионалов с чипом M1 Pro",
        price: 189_990,
        category: "cat_2",
        image: "macbook",
        specifications: &[("Процессор", "Apple M1 Pro"), ("Память", "16 ГБ"), ("SSD", "512 ГБ")],
    },
    DemoProduct {
        id: "prod_5",
        name: "Dell XPS 15",
        description: "Премиальный ноутбук с InfinityEdge дисплеем",
        price: 149_990,
        category: "cat_2",
        image: "dell",
        specifications: &[("Процессор", "Intel Core i7"), ("Память", "16 ГБ")],
    },
    DemoProduct {
        id: "prod_6",
        name: "iPad Pro 12.9\"",
        description: "Самый мощный планшет с дисплеем Liquid Retina XDR",
        price: 99_990,
        category: "cat_3",
        image: "ipad",
        specifications: &[("Экран", "12.9\" Liquid Retina XDR"), ("Чип", "Apple M1")],
    },
    DemoProduct {
        id: "prod_7",
        name: "Samsung Galaxy Tab S7+",
        description: "Флагманский планшет с AMOLED дисплеем",
        price: 79_990,
        category: "cat_3",
        image: "tablet",
        specifications: &[("Экран", "12.4\" Super AMOLED")],
    },
    DemoProduct {
        id: "prod_8",
        name: "Чехол для смартфона",
        description: "Защитный чехол с красивым дизайном",
        price: 1_990,
        category: "cat_4",
        image: "phone_case",
        specifications: &[("Материал", "Силикон")],
    },
    DemoProduct {
        id: "prod_9",
        name: "Зарядное устройство",
        description: "Быстрая зарядка мощностью 65Вт",
        price: 2_990,
        category: "cat_4",
        image: "charger",
        specifications: &[("Мощность", "65 Вт"), ("Разъём", "USB-C")],
    },
    DemoProduct {
        id: "prod_10",
        name: "AirPods Pro",
        description: "Беспроводные наушники с активным шумоподавлением",
        price: 19_990,
        category: "cat_5",
        image: "airpods",
        specifications: &[("Шумоподавление", "Активное"), ("Время работы", "4.5 ч")],
    },
    DemoProduct {
        id: "prod_11",
        name: "Sony WH-1000XM4",
        description: "Наушники с лучшим активным шумоподавлением",
        price: 27_990,
        category: "cat_5",
        image: "headphones",
        specifications: &[("Шумоподавление", "Активное"), ("Время работы", "30 ч")],
    },
];

/// The demo products.
#[must_use]
pub fn demo_products() -> Vec<Product> {
    DEMO_PRODUCTS
        .iter()
        .map(|p| Product {
            id: ProductId::new(p.id),
            name: p.name.to_owned(),
            description: p.description.to_owned(),
            price: Price::from_major(p.price),
            category_id: CategoryId::new(p.category),
            image_url: Some(format!(
                "https://source.unsplash.com/random/600x400/?{}",
                p.image
            )),
            specifications: specs(p.specifications),
        })
        .collect()
}
