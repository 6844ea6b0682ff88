//! The enumerated-set value type of the ink language.
use std::collections::HashMap;
use std::fmt;

use crate::ink_list_item::InkListItem;
use crate::list_definitions_origin::ListDefinitionsOrigin;
use crate::story_error::StoryError;
use crate::value_type::ValueType;

/// A set-like map from [`InkListItem`] to its integer value, plus the names
/// of the list definitions it originated from. All algebra operations are
/// pure and return new lists.
#[derive(Clone, Debug, Default)]
pub struct InkList {
    pub items: HashMap<InkListItem, i32>,
    /// Origin names remembered from construction, used when the list is
    /// empty (an emptied variable must still know which definition it
    /// belongs to).
    initial_origin_names: Vec<String>,
}

impl InkList {
    pub fn new() -> InkList {
        InkList::default()
    }

    pub fn from_single_element(item: InkListItem, value: i32) -> InkList {
        let mut list = InkList::new();
        list.items.insert(item, value);
        list
    }

    /// A list representing the given origin, initially empty but knowing its
    /// definition by name.
    pub fn from_origin(
        origin_name: &str,
        list_defs: &ListDefinitionsOrigin,
    ) -> Result<InkList, StoryError> {
        if list_defs.get_list_definition(origin_name).is_none() {
            return Err(StoryError::InvalidStoryState(format!(
                "InkList origin could not be found in story when constructing new list: {origin_name}"
            )));
        }

        let mut list = InkList::new();
        list.initial_origin_names.push(origin_name.to_string());
        Ok(list)
    }

    pub fn set_initial_origin_names(&mut self, origin_names: Vec<String>) {
        self.initial_origin_names = origin_names;
    }

    /// The origin names relevant to this list: derived from its items when
    /// it has any, else the names remembered from construction.
    pub fn get_origin_names(&self) -> Vec<String> {
        if self.items.is_empty() {
            return self.initial_origin_names.clone();
        }

        let mut names: Vec<String> = Vec::new();
        for item in self.items.keys() {
            if let Some(origin) = item.get_origin_name() {
                if !names.contains(origin) {
                    names.push(origin.clone());
                }
            }
        }
        names
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn max_item(&self) -> Option<(&InkListItem, i32)> {
        let mut max: Option<(&InkListItem, i32)> = None;
        for (item, value) in &self.items {
            if max.is_none() || *value > max.unwrap().1 {
                max = Some((item, *value));
            }
        }
        max
    }

    pub fn min_item(&self) -> Option<(&InkListItem, i32)> {
        let mut min: Option<(&InkListItem, i32)> = None;
        for (item, value) in &self.items {
            if min.is_none() || *value < min.unwrap().1 {
                min = Some((item, *value));
            }
        }
        min
    }

    pub fn max_as_list(&self) -> InkList {
        match self.max_item() {
            Some((item, value)) => InkList::from_single_element(item.clone(), value),
            None => InkList::new(),
        }
    }

    pub fn min_as_list(&self) -> InkList {
        match self.min_item() {
            Some((item, value)) => InkList::from_single_element(item.clone(), value),
            None => InkList::new(),
        }
    }

    pub fn union(&self, other: &InkList) -> InkList {
        let mut result = self.clone();
        for (item, value) in &other.items {
            result.items.insert(item.clone(), *value);
        }
        result
    }

    pub fn intersect(&self, other: &InkList) -> InkList {
        let mut result = InkList::new();
        for (item, value) in &self.items {
            if other.items.contains_key(item) {
                result.items.insert(item.clone(), *value);
            }
        }
        result
    }

    pub fn without(&self, other: &InkList) -> InkList {
        let mut result = self.clone();
        for item in other.items.keys() {
            result.items.remove(item);
        }
        result
    }

    /// True iff every item of `other` is present in this list. Either side
    /// being empty yields false.
    pub fn contains(&self, other: &InkList) -> bool {
        if other.items.is_empty() || self.items.is_empty() {
            return false;
        }
        other.items.keys().all(|item| self.items.contains_key(item))
    }

    pub fn contains_item_named(&self, item_name: &str) -> bool {
        self.items.keys().any(|item| item.get_item_name() == item_name)
    }

    pub fn greater_than(&self, other: &InkList) -> bool {
        if self.items.is_empty() {
            return false;
        }
        if other.items.is_empty() {
            return true;
        }
        self.min_item().unwrap().1 > other.max_item().unwrap().1
    }

    pub fn greater_than_or_equals(&self, other: &InkList) -> bool {
        if self.items.is_empty() {
            return false;
        }
        if other.items.is_empty() {
            return true;
        }
        self.min_item().unwrap().1 >= other.min_item().unwrap().1
            && self.max_item().unwrap().1 >= other.max_item().unwrap().1
    }

    pub fn less_than(&self, other: &InkList) -> bool {
        if other.items.is_empty() {
            return false;
        }
        if self.items.is_empty() {
            return true;
        }
        self.max_item().unwrap().1 < other.min_item().unwrap().1
    }

    pub fn less_than_or_equals(&self, other: &InkList) -> bool {
        if other.items.is_empty() {
            return false;
        }
        if self.items.is_empty() {
            return true;
        }
        self.max_item().unwrap().1 <= other.max_item().unwrap().1
            && self.min_item().unwrap().1 <= other.min_item().unwrap().1
    }

    /// Every item of every origin definition this list is associated with.
    pub fn all(&self, list_defs: &ListDefinitionsOrigin) -> InkList {
        let mut result = InkList::new();
        for origin_name in self.get_origin_names() {
            if let Some(def) = list_defs.get_list_definition(&origin_name) {
                for (item, value) in def.get_items() {
                    result.items.insert(item.clone(), *value);
                }
            }
        }
        result
    }

    /// All items of the origins that are not in this list.
    pub fn inverse(&self, list_defs: &ListDefinitionsOrigin) -> InkList {
        let mut result = self.all(list_defs);
        for item in self.items.keys() {
            result.items.remove(item);
        }
        result
    }

    /// Items sorted ascending by value, ties broken by origin name.
    pub fn ordered_items(&self) -> Vec<(&InkListItem, i32)> {
        let mut ordered: Vec<(&InkListItem, i32)> = self.items.iter().map(|(k, v)| (k, *v)).collect();
        ordered.sort_by(|a, b| {
            if a.1 != b.1 {
                a.1.cmp(&b.1)
            } else {
                let a_origin = a.0.get_origin_name().map(|s| s.as_str()).unwrap_or("");
                let b_origin = b.0.get_origin_name().map(|s| s.as_str()).unwrap_or("");
                a_origin.cmp(b_origin)
            }
        });
        ordered
    }

    /// The sublist of items whose values fall within the given bounds. A
    /// bound may be an Int or a List (in which case the bound list's own
    /// min/max value is read). Note the upper bound of a bound list is only
    /// consulted when the lower bound is a non-empty list as well; this
    /// mirrors the reference runtime and is pinned by test.
    pub fn list_with_subrange(&self, min_bound: &ValueType, max_bound: &ValueType) -> InkList {
        if self.items.is_empty() {
            return InkList::new();
        }

        let mut min_value = 0;
        let mut max_value = i32::MAX;

        match min_bound {
            ValueType::Int(n) => min_value = *n,
            ValueType::List(l) => {
                if let Some((_, value)) = l.min_item() {
                    min_value = value;
                }
            }
            _ => {}
        }

        if let ValueType::Int(n) = max_bound {
            max_value = *n;
        } else if let (ValueType::List(lower), ValueType::List(upper)) = (min_bound, max_bound) {
            if !lower.items.is_empty() {
                if let Some((_, value)) = upper.max_item() {
                    max_value = value;
                }
            }
        }

        let mut result = InkList::new();
        for (item, value) in self.ordered_items() {
            if value >= min_value && value <= max_value {
                result.items.insert(item.clone(), value);
            }
        }
        result
    }
}

impl PartialEq for InkList {
    /// Set equality on item identity; the integer values are implied by the
    /// items themselves.
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self.items.keys().all(|item| other.items.contains_key(item))
    }
}

impl fmt::Display for InkList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .ordered_items()
            .iter()
            .map(|(item, _)| item.get_item_name())
            .collect();
        write!(f, "{}", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn abc_defs() -> ListDefinitionsOrigin {
        let mut items = HashMap::new();
        items.insert("a".to_string(), 1);
        items.insert("b".to_string(), 2);
        items.insert("c".to_string(), 3);
        let def = crate::list_definition::ListDefinition::new("letters".to_string(), items);
        ListDefinitionsOrigin::new(vec![def])
    }

    fn letters(names: &[&str], defs: &ListDefinitionsOrigin) -> InkList {
        let mut list = InkList::new();
        let def = defs.get_list_definition("letters").unwrap();
        for name in names {
            let (item, value) = def.get_item_with_name(name).unwrap();
            list.items.insert(item.clone(), value);
        }
        list
    }

    #[test]
    fn set_algebra() {
        let defs = abc_defs();
        let ab = letters(&["a", "b"], &defs);
        let bc = letters(&["b", "c"], &defs);

        assert_eq!(letters(&["a", "b", "c"], &defs), ab.union(&bc));
        assert_eq!(letters(&["b"], &defs), ab.intersect(&bc));
        assert_eq!(letters(&["a"], &defs), ab.without(&bc));
        assert_eq!(0, ab.without(&bc).intersect(&bc).count());
    }

    #[test]
    fn comparisons_with_empty_lists() {
        let defs = abc_defs();
        let ab = letters(&["a", "b"], &defs);
        let empty = InkList::new();

        assert!(ab.greater_than(&empty));
        assert!(!empty.greater_than(&ab));
        assert!(empty.less_than(&ab));
        assert!(!ab.less_than(&empty));
        assert!(!empty.greater_than(&empty));
        assert!(!empty.less_than(&empty));
    }

    #[test]
    fn comparisons_agree_between_mirrored_forms() {
        let defs = abc_defs();
        let a = letters(&["a"], &defs);
        let c = letters(&["c"], &defs);

        assert!(c.greater_than(&a));
        assert!(a.less_than(&c));
        assert_eq!(c.greater_than(&a), a.less_than(&c));
    }

    #[test]
    fn inverse_and_all() {
        let defs = abc_defs();
        let b = letters(&["b"], &defs);

        assert_eq!(letters(&["a", "b", "c"], &defs), b.all(&defs));
        assert_eq!(letters(&["a", "c"], &defs), b.inverse(&defs));
    }

    #[test]
    fn subrange_int_bounds() {
        let defs = abc_defs();
        let abc = letters(&["a", "b", "c"], &defs);

        let sub = abc.list_with_subrange(&ValueType::Int(2), &ValueType::Int(3));
        assert_eq!(letters(&["b", "c"], &defs), sub);
    }

    #[test]
    fn subrange_list_bounds() {
        let defs = abc_defs();
        let abc = letters(&["a", "b", "c"], &defs);
        let b = letters(&["b"], &defs);
        let c = letters(&["c"], &defs);

        // Both bounds as lists: lower list's min and upper list's max apply.
        let sub = abc.list_with_subrange(&ValueType::List(b), &ValueType::List(c.clone()));
        assert_eq!(letters(&["b", "c"], &defs), sub);

        // Upper bound list with an Int lower bound is not consulted; the
        // range stays open at the top.
        let sub = abc.list_with_subrange(&ValueType::Int(1), &ValueType::List(c));
        assert_eq!(letters(&["a", "b", "c"], &defs), sub);
    }

    #[test]
    fn ordered_items_ascending() {
        let defs = abc_defs();
        let list = letters(&["c", "a", "b"], &defs);
        let values: Vec<i32> = list.ordered_items().iter().map(|(_, v)| *v).collect();
        assert_eq!(vec![1, 2, 3], values);
        assert_eq!("a, b, c", list.to_string());
    }
}
