//! Menu Catalog

use std::sync::Arc;

use super::retry_read;
use crate::domain::aggregates::{MenuItem, MenuItemDetails};
use crate::domain::value_objects::FoodId;
use crate::error::{OrderingError, Result};
use crate::store::MenuRepository;

#[derive(Clone)]
pub struct MenuService {
    menu: Arc<dyn MenuRepository>,
    read_retries: u32,
}

impl MenuService {
    pub fn new(menu: Arc<dyn MenuRepository>, read_retries: u32) -> Self { Self { menu, read_retries } }

    /// Items ordered by category, then name. Unavailable items are hidden unless requested.
    pub async fn list(&self, include_unavailable: bool, category: Option<&str>) -> Result<Vec<MenuItem>> {
        let mut items: Vec<MenuItem> = retry_read(self.read_retries, || self.menu.list_menu())
            .await?
            .into_iter()
            .filter(|item| include_unavailable || item.is_available())
            .filter(|item| category.map_or(true, |c| item.category().eq_ignore_ascii_case(c)))
            .collect();
        items.sort_by(|a, b| a.category().cmp(b.category()).then_with(|| a.name().cmp(b.name())));
        Ok(items)
    }

    pub async fn create(&self, food_id: FoodId, details: MenuItemDetails) -> Result<MenuItem> {
        if self.menu.find_menu_item(&food_id).await?.is_some() {
            return Err(OrderingError::Conflict(format!("menu item {food_id} already exists")));
        }
        let item = MenuItem::create(food_id, details)?;
        self.menu.save_menu_item(&item).await?;
        tracing::info!(food_id = %item.food_id(), name = item.name(), "Menu item created");
        Ok(item)
    }

    /// Replaces the item's editable fields, creating it when absent.
    pub async fn upsert(&self, food_id: FoodId, details: MenuItemDetails) -> Result<MenuItem> {
        let item = match self.menu.find_menu_item(&food_id).await? {
            Some(mut existing) => {
                existing.update(details)?;
                existing
            }
            None => MenuItem::create(food_id, details)?,
        };
        self.menu.save_menu_item(&item).await?;
        tracing::info!(food_id = %item.food_id(), price = %item.price(), available = item.is_available(), "Menu item saved");
        Ok(item)
    }

    pub async fn delete(&self, food_id: &FoodId, actor: &str) -> Result<()> {
        if !self.menu.delete_menu_item(food_id).await? {
            return Err(OrderingError::NotFound(format!("menu item {food_id}")));
        }
        tracing::warn!(food_id = %food_id, actor, "Menu item deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rust_decimal::Decimal;

    fn details(name: &str, category: &str, available: bool) -> MenuItemDetails {
        MenuItemDetails { name: name.into(), description: String::new(), price: Decimal::new(8000, 0), category: category.into(), image: None, available }
    }

    async fn seeded() -> MenuService {
        let menu = MenuService::new(Arc::new(MemoryStore::new()), 0);
        menu.create(FoodId::new("s1").unwrap(), details("Ramyeon", "soup", true)).await.unwrap();
        menu.create(FoodId::new("m2").unwrap(), details("Bulgogi", "main", true)).await.unwrap();
        menu.create(FoodId::new("m1").unwrap(), details("Bibimbap", "main", true)).await.unwrap();
        menu.create(FoodId::new("m3").unwrap(), details("Galbi", "main", false)).await.unwrap();
        menu
    }

    #[tokio::test]
    async fn test_list_sorted_and_filtered() {
        let menu = seeded().await;
        let names: Vec<String> = menu.list(false, None).await.unwrap().iter().map(|i| i.name().to_string()).collect();
        assert_eq!(names, vec!["Bibimbap", "Bulgogi", "Ramyeon"]);
        assert_eq!(menu.list(true, None).await.unwrap().len(), 4);
        assert_eq!(menu.list(true, Some("MAIN")).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_create_conflict_and_upsert() {
        let menu = seeded().await;
        let dup = menu.create(FoodId::new("s1").unwrap(), details("Again", "soup", true)).await;
        assert!(matches!(dup, Err(OrderingError::Conflict(_))));

        let updated = menu.upsert(FoodId::new("m3").unwrap(), details("Galbi", "main", true)).await.unwrap();
        assert!(updated.is_available());
        assert_eq!(menu.list(false, Some("main")).await.unwrap().len(), 3);

        let invalid = menu.upsert(FoodId::new("x").unwrap(), details("", "main", true)).await;
        assert!(matches!(invalid, Err(OrderingError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_delete() {
        let menu = seeded().await;
        menu.delete(&FoodId::new("s1").unwrap(), "admin").await.unwrap();
        assert!(matches!(menu.delete(&FoodId::new("s1").unwrap(), "admin").await, Err(OrderingError::NotFound(_))));
    }
}
