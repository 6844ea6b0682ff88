use std::collections::HashMap;
use std::rc::Rc;

use crate::list_definition::ListDefinition;
use crate::value_type::ValueType;

/// The story-wide table of list definitions, shared read-only by every part
/// of the runtime that needs to resolve items back to their origin lists.
pub struct ListDefinitionsOrigin {
    lists: HashMap<String, Rc<ListDefinition>>,
    /// Single-item list values reachable by bare item name or by
    /// `origin.item`. When a bare name is ambiguous between two lists, the
    /// later definition wins, matching reference runtime behavior.
    all_unambiguous_list_value_cache: HashMap<String, ValueType>,
}

impl ListDefinitionsOrigin {
    pub fn new(defs: Vec<ListDefinition>) -> ListDefinitionsOrigin {
        let mut origin = ListDefinitionsOrigin {
            lists: HashMap::new(),
            all_unambiguous_list_value_cache: HashMap::new(),
        };

        for def in defs {
            let def = Rc::new(def);

            for (item, value) in def.get_items() {
                let list_value = ValueType::new_list_from_item(item.clone(), *value);

                origin
                    .all_unambiguous_list_value_cache
                    .insert(item.get_item_name().to_string(), list_value.clone());
                origin
                    .all_unambiguous_list_value_cache
                    .insert(item.get_full_name(), list_value);
            }

            origin.lists.insert(def.get_name().to_string(), def);
        }

        origin
    }

    pub fn get_list_definition(&self, name: &str) -> Option<&Rc<ListDefinition>> {
        self.lists.get(name)
    }

    pub fn find_single_item_list_with_name(&self, name: &str) -> Option<&ValueType> {
        self.all_unambiguous_list_value_cache.get(name)
    }

    pub fn get_lists(&self) -> &HashMap<String, Rc<ListDefinition>> {
        &self.lists
    }
}
