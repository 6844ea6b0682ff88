use std::collections::HashMap;

use crate::ink_list_item::InkListItem;

/// One named list declared by the story, mapping each of its items to the
/// item's integer value.
#[derive(Clone, Debug)]
pub struct ListDefinition {
    name: String,
    items: HashMap<InkListItem, i32>,
}

impl ListDefinition {
    pub fn new(name: String, items: HashMap<String, i32>) -> ListDefinition {
        let items = items
            .into_iter()
            .map(|(item_name, value)| (InkListItem::new(Some(name.clone()), item_name), value))
            .collect();

        ListDefinition { name, items }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_items(&self) -> &HashMap<InkListItem, i32> {
        &self.items
    }

    pub fn get_value_for_item(&self, item: &InkListItem) -> Option<i32> {
        self.items.get(item).copied()
    }

    pub fn contains_item(&self, item: &InkListItem) -> bool {
        self.items.contains_key(item)
    }

    pub fn contains_item_with_name(&self, item_name: &str) -> bool {
        self.items.keys().any(|k| k.get_item_name() == item_name)
    }

    pub fn get_item_with_name(&self, item_name: &str) -> Option<(&InkListItem, i32)> {
        self.items
            .iter()
            .find(|(k, _)| k.get_item_name() == item_name)
            .map(|(k, v)| (k, *v))
    }

    pub fn get_item_with_value(&self, value: i32) -> Option<&InkListItem> {
        self.items
            .iter()
            .find(|(_, v)| **v == value)
            .map(|(k, _)| k)
    }
}
