//! Cart Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::value_objects::FoodId;

/// Who a cart belongs to. Every cart operation is keyed by one of these.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum CartOwner {
    Guest(String),
    User(String),
}

impl CartOwner {
    /// Storage key, e.g. `guest:5f2c...` or `user:42`.
    pub fn key(&self) -> String {
        match self {
            Self::Guest(id) => format!("guest:{id}"),
            Self::User(id) => format!("user:{id}"),
        }
    }
}

impl fmt::Display for CartOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.key()) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(rename = "foodID", alias = "foodId")]
    pub food_id: FoodId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CartLine {
    /// `None` when the product does not fit in a `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> { self.unit_price.checked_mul(Decimal::from(self.quantity)) }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    owner: CartOwner,
    lines: Vec<CartLine>,
    updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(owner: CartOwner) -> Self {
        Self { owner, lines: vec![], updated_at: Utc::now() }
    }

    pub fn owner(&self) -> &CartOwner { &self.owner }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn line(&self, food_id: &FoodId) -> Option<&CartLine> { self.lines.iter().find(|l| &l.food_id == food_id) }

    /// Adds one unit of `item`. The incoming quantity is ignored; a new line always starts at 1.
    pub fn add_item(&mut self, item: CartLine) {
        if let Some(existing) = self.lines.iter_mut().find(|l| l.food_id == item.food_id) {
            existing.quantity = existing.quantity.saturating_add(1);
        } else {
            self.lines.push(CartLine { quantity: 1, ..item });
        }
        self.touch();
    }

    /// Quantities at or below zero remove the line.
    pub fn update_quantity(&mut self, food_id: &FoodId, quantity: i64) {
        if quantity <= 0 {
            self.remove_item(food_id);
            return;
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        if let Some(line) = self.lines.iter_mut().find(|l| &l.food_id == food_id) {
            line.quantity = quantity;
            self.touch();
        }
    }

    pub fn remove_item(&mut self, food_id: &FoodId) {
        let before = self.lines.len();
        self.lines.retain(|l| &l.food_id != food_id);
        if self.lines.len() != before { self.touch(); }
    }

    /// Folds `local` into this cart and empties it. Returns whether anything changed.
    pub fn merge_from(&mut self, local: &mut Cart) -> bool {
        if local.is_empty() { return false; }
        for incoming in local.lines.drain(..) {
            match self.lines.iter_mut().find(|l| l.food_id == incoming.food_id) {
                Some(existing) => existing.quantity = existing.quantity.saturating_add(incoming.quantity),
                None => self.lines.push(incoming),
            }
        }
        local.touch();
        self.touch();
        true
    }

    /// Full replace. Zero-quantity lines are dropped and duplicate ids collapse by summing.
    pub fn replace_lines(&mut self, lines: Vec<CartLine>) {
        self.lines.clear();
        for line in lines.into_iter().filter(|l| l.quantity > 0) {
            match self.lines.iter_mut().find(|l| l.food_id == line.food_id) {
                Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
                None => self.lines.push(line),
            }
        }
        self.touch();
    }

    pub fn clear(&mut self) { self.lines.clear(); self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, price: i64, qty: u32) -> CartLine {
        CartLine { food_id: FoodId::new(id).unwrap(), name: format!("Item {id}"), unit_price: Decimal::new(price, 0), quantity: qty, category: "main".into(), image: None, description: None }
    }

    fn qty(cart: &Cart, id: &str) -> Option<u32> { cart.line(&FoodId::new(id).unwrap()).map(|l| l.quantity) }

    #[test]
    fn test_add_same_item_twice() {
        let mut cart = Cart::new(CartOwner::Guest("s1".into()));
        cart.add_item(line("A", 1000, 5));
        cart.add_item(line("A", 1000, 5));
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(qty(&cart, "A"), Some(2));
    }

    #[test]
    fn test_update_to_zero_removes() {
        let mut cart = Cart::new(CartOwner::User("u1".into()));
        cart.add_item(line("A", 1000, 1));
        cart.update_quantity(&FoodId::new("A").unwrap(), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_and_remove() {
        let mut cart = Cart::new(CartOwner::User("u1".into()));
        cart.add_item(line("A", 1000, 1));
        cart.add_item(line("B", 500, 1));
        cart.update_quantity(&FoodId::new("A").unwrap(), 4);
        cart.update_quantity(&FoodId::new("B").unwrap(), -3);
        assert_eq!(qty(&cart, "A"), Some(4));
        assert_eq!(qty(&cart, "B"), None);
        cart.remove_item(&FoodId::new("missing").unwrap()); // no-op
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn test_merge_sums_and_clears_local() {
        let mut remote = Cart::new(CartOwner::User("u1".into()));
        remote.replace_lines(vec![line("A", 1000, 2), line("B", 300, 1)]);
        let mut local = Cart::new(CartOwner::Guest("s1".into()));
        local.replace_lines(vec![line("A", 1000, 3), line("C", 700, 1)]);

        assert!(remote.merge_from(&mut local));
        assert_eq!(qty(&remote, "A"), Some(5));
        assert_eq!(qty(&remote, "B"), Some(1));
        assert_eq!(qty(&remote, "C"), Some(1));
        assert!(local.is_empty());

        // second merge with the now-empty local cart changes nothing
        assert!(!remote.merge_from(&mut local));
        assert_eq!(qty(&remote, "A"), Some(5));
    }

    #[test]
    fn test_merge_order_independent() {
        let guest_adds = ["A", "B", "A", "C", "A"];
        let mut forward = Cart::new(CartOwner::User("u".into()));
        let mut backward = Cart::new(CartOwner::User("u".into()));
        for id in guest_adds {
            let mut local = Cart::new(CartOwner::Guest("g".into()));
            local.add_item(line(id, 100, 1));
            forward.merge_from(&mut local);
        }
        for id in guest_adds.iter().rev() {
            let mut local = Cart::new(CartOwner::Guest("g".into()));
            local.add_item(line(id, 100, 1));
            backward.merge_from(&mut local);
        }
        for id in ["A", "B", "C"] { assert_eq!(qty(&forward, id), qty(&backward, id)); }
        assert_eq!(qty(&forward, "A"), Some(3));
    }

    #[test]
    fn test_replace_normalizes() {
        let mut cart = Cart::new(CartOwner::Guest("s".into()));
        cart.replace_lines(vec![line("A", 100, 1), line("B", 100, 0), line("A", 100, 2)]);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(qty(&cart, "A"), Some(3));
    }

    #[test]
    fn test_line_json_uses_food_id_key() {
        let json = serde_json::to_value(line("A", 1000, 2)).unwrap();
        assert_eq!(json["foodID"], "A");
        assert_eq!(json["quantity"], 2);
    }
}
