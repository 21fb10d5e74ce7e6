// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ordered file list shared by the merge and image-to-document flows.

use std::fmt;

use pagewerk_core::error::{PagewerkError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Caller-chosen identifier of an item. Never changes when the item moves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id, for callers without their own.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Direction for [`FileOrderList::move_adjacent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// One entry of a [`FileOrderList`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedItem<T> {
    pub id: ItemId,
    pub payload: T,
    /// 0-based position; the only ordering signal consumers should read.
    pub position: usize,
}

/// Ordered collection with stable ids and dense `0..n-1` positions.
///
/// Items are stored in position order, so `items[i].position == i` holds
/// after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOrderList<T> {
    items: Vec<OrderedItem<T>>,
}

impl<T> FileOrderList<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Append items at the end, in the order given.
    ///
    /// Fails without changing the list if any id is already present or
    /// repeated within `items`.
    pub fn append(&mut self, items: impl IntoIterator<Item = (ItemId, T)>) -> Result<()> {
        let incoming: Vec<(ItemId, T)> = items.into_iter().collect();

        for (index, (id, _)) in incoming.iter().enumerate() {
            let repeated = incoming[..index].iter().any(|(other, _)| other == id);
            if repeated || self.index_of(id).is_some() {
                return Err(PagewerkError::Usage(format!("duplicate item id: {id}")));
            }
        }

        for (id, payload) in incoming {
            let position = self.items.len();
            self.items.push(OrderedItem {
                id,
                payload,
                position,
            });
        }
        debug!(len = self.items.len(), "items appended");
        Ok(())
    }

    /// Append one item under a generated id, returning the id.
    pub fn push(&mut self, payload: T) -> ItemId {
        let id = ItemId::generate();
        let position = self.items.len();
        self.items.push(OrderedItem {
            id: id.clone(),
            payload,
            position,
        });
        id
    }

    /// Remove an item; every later item moves up one position.
    pub fn remove(&mut self, id: &ItemId) -> Result<OrderedItem<T>> {
        let index = self
            .index_of(id)
            .ok_or_else(|| PagewerkError::UnknownItem(id.to_string()))?;
        let mut removed = self.items.remove(index);
        self.renumber_from(index);
        removed.position = index;
        debug!(%id, index, "item removed");
        Ok(removed)
    }

    /// Swap an item with its neighbour. Returns `false` (and does nothing)
    /// when the item is already first (`Up`) or last (`Down`).
    pub fn move_adjacent(&mut self, id: &ItemId, direction: Direction) -> Result<bool> {
        let index = self
            .index_of(id)
            .ok_or_else(|| PagewerkError::UnknownItem(id.to_string()))?;

        let neighbour = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < self.items.len() => index + 1,
            _ => return Ok(false),
        };

        self.items.swap(index, neighbour);
        self.items[index].position = index;
        self.items[neighbour].position = neighbour;
        debug!(%id, from = index, to = neighbour, "item moved");
        Ok(true)
    }

    pub fn get(&self, id: &ItemId) -> Option<&OrderedItem<T>> {
        self.index_of(id).map(|index| &self.items[index])
    }

    pub fn position_of(&self, id: &ItemId) -> Option<usize> {
        self.index_of(id)
    }

    /// Items in position order.
    pub fn items(&self) -> &[OrderedItem<T>] {
        &self.items
    }

    /// Payloads in position order.
    pub fn payloads(&self) -> impl Iterator<Item = &T> + '_ {
        self.items.iter().map(|item| &item.payload)
    }

    pub fn into_payloads(self) -> Vec<T> {
        self.items.into_iter().map(|item| item.payload).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn index_of(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }

    fn renumber_from(&mut self, start: usize) {
        for (offset, item) in self.items[start..].iter_mut().enumerate() {
            item.position = start + offset;
        }
    }
}

impl<T> Default for FileOrderList<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn three() -> FileOrderList<&'static str> {
        let mut list = FileOrderList::new();
        list.append([
            (ItemId::from("item1"), "a.pdf"),
            (ItemId::from("item2"), "b.pdf"),
            (ItemId::from("item3"), "c.pdf"),
        ])
        .unwrap();
        list
    }

    fn ids<'a>(list: &'a FileOrderList<&'static str>) -> Vec<&'a str> {
        list.items().iter().map(|item| item.id.as_str()).collect()
    }

    fn positions<T>(list: &FileOrderList<T>) -> Vec<usize> {
        list.items().iter().map(|item| item.position).collect()
    }

    #[test]
    fn append_assigns_trailing_positions() {
        let mut list = three();
        assert_eq!(positions(&list), vec![0, 1, 2]);
        list.append([(ItemId::from("item4"), "d.pdf")]).unwrap();
        assert_eq!(list.position_of(&"item4".into()), Some(3));
    }

    #[test]
    fn move_up_swaps_with_predecessor() {
        let mut list = three();
        assert!(list.move_adjacent(&"item2".into(), Direction::Up).unwrap());
        assert_eq!(ids(&list), vec!["item2", "item1", "item3"]);
        assert_eq!(positions(&list), vec![0, 1, 2]);
        assert_eq!(list.get(&"item1".into()).unwrap().position, 1);
    }

    #[test]
    fn moving_past_the_ends_is_a_no_op() {
        let mut list = three();
        assert!(!list.move_adjacent(&"item1".into(), Direction::Up).unwrap());
        assert!(!list.move_adjacent(&"item3".into(), Direction::Down).unwrap());
        assert_eq!(ids(&list), vec!["item1", "item2", "item3"]);
    }

    #[test]
    fn remove_renumbers_later_items() {
        let mut list = three();
        let removed = list.remove(&"item1".into()).unwrap();
        assert_eq!(removed.payload, "a.pdf");
        assert_eq!(ids(&list), vec!["item2", "item3"]);
        assert_eq!(positions(&list), vec![0, 1]);
    }

    #[test]
    fn unknown_ids_are_errors() {
        let mut list = three();
        assert!(matches!(
            list.remove(&"nope".into()),
            Err(PagewerkError::UnknownItem(_))
        ));
        assert!(list.move_adjacent(&"nope".into(), Direction::Down).is_err());
    }

    #[test]
    fn duplicate_ids_are_rejected_atomically() {
        let mut list = three();
        let err = list
            .append([(ItemId::from("new"), "x.pdf"), (ItemId::from("item2"), "y.pdf")])
            .unwrap_err();
        assert!(matches!(err, PagewerkError::Usage(_)));
        assert_eq!(list.len(), 3);

        assert!(
            list.append([(ItemId::from("z"), "z1"), (ItemId::from("z"), "z2")])
                .is_err()
        );
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn push_generates_unique_ids() {
        let mut list = FileOrderList::new();
        let a = list.push(1);
        let b = list.push(2);
        assert_ne!(a, b);
        assert_eq!(list.into_payloads(), vec![1, 2]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Append,
        Remove(usize),
        Up(usize),
        Down(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Append),
            (0usize..8).prop_map(Op::Remove),
            (0usize..8).prop_map(Op::Up),
            (0usize..8).prop_map(Op::Down),
        ]
    }

    proptest! {
        #[test]
        fn positions_stay_dense_and_ids_stable(ops in proptest::collection::vec(op(), 0..40)) {
            let mut list: FileOrderList<u32> = FileOrderList::new();
            let mut counter = 0u32;

            for op in ops {
                let pick = |i: usize, list: &FileOrderList<u32>| {
                    list.items().get(i % list.len().max(1)).map(|item| item.id.clone())
                };
                match op {
                    Op::Append => {
                        counter += 1;
                        list.append([(ItemId::new(format!("id{counter}")), counter)]).unwrap();
                    }
                    Op::Remove(i) => {
                        if let Some(id) = pick(i, &list) {
                            list.remove(&id).unwrap();
                        }
                    }
                    Op::Up(i) | Op::Down(i) => {
                        if let Some(id) = pick(i, &list) {
                            let direction = if matches!(op, Op::Up(_)) { Direction::Up } else { Direction::Down };
                            list.move_adjacent(&id, direction).unwrap();
                        }
                    }
                }

                prop_assert_eq!(positions(&list), (0..list.len()).collect::<Vec<_>>());
                for item in list.items() {
                    // ids are minted from the payload, so they must still agree
                    prop_assert_eq!(item.id.as_str(), format!("id{}", item.payload));
                }
            }
        }
    }
}
