/// The identity of one item in an ink list: the name of the list definition
/// it came from plus its own name. Equality and hashing are structural.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InkListItem {
    origin_name: Option<String>,
    item_name: String,
}

impl InkListItem {
    pub fn new(origin_name: Option<String>, item_name: String) -> InkListItem {
        InkListItem {
            origin_name,
            item_name,
        }
    }

    /// Builds an item from its `origin.item` serialized form. A bare name
    /// (no dot) yields an item with no origin.
    pub fn from_full_name(full_name: &str) -> InkListItem {
        match full_name.split_once('.') {
            Some((origin, item)) => {
                InkListItem::new(Some(origin.to_string()), item.to_string())
            }
            None => InkListItem::new(None, full_name.to_string()),
        }
    }

    pub fn get_origin_name(&self) -> Option<&String> {
        self.origin_name.as_ref()
    }

    pub fn get_item_name(&self) -> &str {
        &self.item_name
    }

    pub fn get_full_name(&self) -> String {
        format!(
            "{}.{}",
            self.origin_name.as_deref().unwrap_or("?"),
            self.item_name
        )
    }
}
