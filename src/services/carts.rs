//! Cart Store operations keyed by an explicit owner.

use std::sync::Arc;

use super::retry_read;
use crate::domain::aggregates::{Cart, CartLine, CartOwner};
use crate::domain::pricing::compute_totals;
use crate::domain::value_objects::FoodId;
use crate::error::{OrderingError, Result};
use crate::store::{CartRepository, MenuRepository};

#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartRepository>,
    menu: Arc<dyn MenuRepository>,
    read_retries: u32,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartRepository>, menu: Arc<dyn MenuRepository>, read_retries: u32) -> Self {
        Self { carts, menu, read_retries }
    }

    /// Missing carts read as empty; nothing is written until the first mutation.
    pub async fn get(&self, owner: &CartOwner) -> Result<Cart> {
        let stored = retry_read(self.read_retries, move || self.carts.load_cart(owner)).await?;
        Ok(stored.unwrap_or_else(|| Cart::new(owner.clone())))
    }

    /// Adds one unit of a catalog item, snapshotting its current name, price and image.
    pub async fn add_menu_item(&self, owner: &CartOwner, food_id: &FoodId) -> Result<Cart> {
        let item = retry_read(self.read_retries, move || self.menu.find_menu_item(food_id))
            .await?
            .ok_or_else(|| OrderingError::NotFound(format!("menu item {food_id}")))?;
        if !item.is_available() {
            return Err(OrderingError::validation("foodID", format!("{} is currently unavailable", item.name())));
        }
        self.add_item(owner, item.to_cart_line()).await
    }

    pub async fn add_item(&self, owner: &CartOwner, item: CartLine) -> Result<Cart> {
        self.mutate(owner, |cart| cart.add_item(item)).await
    }

    pub async fn update_quantity(&self, owner: &CartOwner, food_id: &FoodId, quantity: i64) -> Result<Cart> {
        self.mutate(owner, |cart| cart.update_quantity(food_id, quantity)).await
    }

    pub async fn remove_item(&self, owner: &CartOwner, food_id: &FoodId) -> Result<Cart> {
        self.mutate(owner, |cart| cart.remove_item(food_id)).await
    }

    /// Full replace, as used by save-cart.
    pub async fn replace(&self, owner: &CartOwner, lines: Vec<CartLine>) -> Result<Cart> {
        let mut cart = Cart::new(owner.clone());
        cart.replace_lines(lines);
        compute_totals(cart.lines())?;
        self.carts.save_cart(&cart).await?;
        Ok(cart)
    }

    pub async fn clear(&self, owner: &CartOwner) -> Result<()> {
        self.carts.delete_cart(owner).await
    }

    /// Folds the guest cart into the signed-in user's cart and deletes the guest cart.
    /// A second call finds an empty guest cart and changes nothing.
    pub async fn merge(&self, guest: &CartOwner, user: &CartOwner) -> Result<Cart> {
        let mut local = self.get(guest).await?;
        let mut remote = self.get(user).await?;
        if !remote.merge_from(&mut local) {
            return Ok(remote);
        }
        compute_totals(remote.lines())?;
        self.carts.save_merged(&remote, guest).await?;
        tracing::info!(guest = %guest, user = %user, lines = remote.lines().len(), "Merged guest cart");
        Ok(remote)
    }

    /// The mutated cart must still price, otherwise nothing is saved.
    async fn mutate<F>(&self, owner: &CartOwner, f: F) -> Result<Cart>
    where
        F: FnOnce(&mut Cart),
    {
        let mut cart = self.get(owner).await?;
        f(&mut cart);
        compute_totals(cart.lines())?;
        self.carts.save_cart(&cart).await?;
        Ok(cart)
    }
}
