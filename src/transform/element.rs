//! Element type inference for nested lists.

use crate::error::{AdaptError, AdaptResult};
use crate::value::{List, MAX_LIST_DEPTH, Value, ValueType};
use std::collections::HashSet;

/// Type of the first non-null leaf of `list`, searching nested lists depth first.
///
/// `None` when the lists hold no non-null leaf at all. The whole structure is
/// walked so that a list containing itself, at any depth, is rejected with
/// [`AdaptError::RecursiveList`] before anything is encoded. Nesting deeper
/// than [`MAX_LIST_DEPTH`] is a data error.
pub(crate) fn find_list_element(list: &List) -> AdaptResult<Option<ValueType>> {
    let mut finder = ElementFinder::default();
    finder.visit(list, 1)?;
    Ok(finder.element)
}

#[derive(Default)]
struct ElementFinder {
    /// Lists on the current path.
    visiting: HashSet<usize>,
    /// Lists already walked without finding a cycle; shared sublists are walked once.
    done: HashSet<usize>,
    element: Option<ValueType>,
}

impl ElementFinder {
    fn visit(&mut self, list: &List, depth: usize) -> AdaptResult<()> {
        let id = list.id();
        if self.done.contains(&id) {
            return Ok(());
        }
        if !self.visiting.insert(id) {
            return Err(AdaptError::RecursiveList);
        }
        if depth > MAX_LIST_DEPTH {
            return Err(AdaptError::Data(format!(
                "lists nested deeper than {} levels",
                MAX_LIST_DEPTH
            )));
        }

        for item in list.items().iter() {
            match item {
                Value::Null => {}
                Value::List(inner) => self.visit(inner, depth + 1)?,
                other => {
                    if self.element.is_none() {
                        self.element = other.value_type();
                    }
                }
            }
        }

        self.visiting.remove(&id);
        self.done.insert(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_non_null_leaf() {
        let list = List::new(vec![
            Value::Null,
            Value::list([Value::Null, Value::list(Vec::new())]),
            Value::list([Value::Null, Value::Int(3)]),
            Value::from("later"),
        ]);
        assert_eq!(find_list_element(&list).unwrap(), Some(ValueType::Int));
    }

    #[test]
    fn test_all_null() {
        let list = List::new(vec![Value::Null, Value::list([Value::Null])]);
        assert_eq!(find_list_element(&list).unwrap(), None);
        assert_eq!(find_list_element(&List::default()).unwrap(), None);
    }

    #[test]
    fn test_direct_self_reference() {
        let list = List::default();
        list.push(Value::List(list.clone()));
        assert!(matches!(
            find_list_element(&list),
            Err(AdaptError::RecursiveList)
        ));
    }

    #[test]
    fn test_cycle_after_first_leaf() {
        let inner = List::new(vec![Value::Int(1)]);
        let outer = List::new(vec![Value::Int(0), Value::List(inner.clone())]);
        inner.push(Value::List(outer.clone()));
        assert!(matches!(
            find_list_element(&outer),
            Err(AdaptError::RecursiveList)
        ));
    }

    #[test]
    fn test_shared_sublist_is_not_a_cycle() {
        let shared = List::new(vec![Value::from("x")]);
        let list = List::new(vec![Value::List(shared.clone()), Value::List(shared)]);
        assert_eq!(find_list_element(&list).unwrap(), Some(ValueType::String));
    }

    fn nested(depth: usize) -> List {
        let mut list = List::new(vec![Value::Int(1)]);
        for _ in 1..depth {
            list = List::new(vec![Value::List(list)]);
        }
        list
    }

    #[test]
    fn test_nesting_depth_limit() {
        assert_eq!(
            find_list_element(&nested(MAX_LIST_DEPTH)).unwrap(),
            Some(ValueType::Int)
        );
        assert!(matches!(
            find_list_element(&nested(MAX_LIST_DEPTH + 1)),
            Err(AdaptError::Data(_))
        ));
    }
}
