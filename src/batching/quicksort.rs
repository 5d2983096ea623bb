//! In-place Lomuto quicksort, used to order a group's orders by quantity
//! so the smallest are simulated first.

use crate::types::LimitOrder;

/// Sort ascending by `key`. Not stable.
pub fn quicksort_by_key<T, K, F>(items: &mut [T], key: &F)
where
    K: PartialOrd,
    F: Fn(&T) -> K,
{
    let mut slice = items;
    while slice.len() > 1 {
        let pivot = partition(slice, key);
        let (left, right) = std::mem::take(&mut slice).split_at_mut(pivot);
        let right = &mut right[1..];
        // Recurse into the smaller half, loop on the larger
        if left.len() < right.len() {
            quicksort_by_key(left, key);
            slice = right;
        } else {
            quicksort_by_key(right, key);
            slice = left;
        }
    }
}

/// Lomuto partition around the last element; returns the pivot's final index.
fn partition<T, K, F>(items: &mut [T], key: &F) -> usize
where
    K: PartialOrd,
    F: Fn(&T) -> K,
{
    let high = items.len() - 1;
    let pivot = key(&items[high]);
    let mut store = 0;
    for j in 0..high {
        if key(&items[j]) <= pivot {
            items.swap(store, j);
            store += 1;
        }
    }
    items.swap(store, high);
    store
}

pub fn quicksort_by_quantity(orders: &mut [LimitOrder]) {
    quicksort_by_key(orders, &|o: &LimitOrder| o.quantity);
}
