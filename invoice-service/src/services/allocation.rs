//! Pro-rata redistribution of line items across ledger allocations.
//!
//! Allocation rows hold user-entered tax-exclusive amounts; their
//! `item_indices` go stale whenever the item array is deduplicated or
//! replaced. [`reallocate_items`] recomputes the assignment so each
//! allocation's items approximate its share of the invoice subtotal.

use std::collections::VecDeque;

use rust_decimal::Decimal;

use crate::models::ExtractedLineItem;
use crate::services::amounts::{items_subtotal, line_item_ht};

/// Assign every item index to exactly one allocation, proportionally to
/// each allocation's share of the total allocated amount.
///
/// Allocations are processed in creation order. Each one greedily pulls
/// items from the front of the remaining pool until it covers 95% of its
/// target amount (the undershoot tolerance absorbs extraction rounding);
/// an allocation entitled to a positive share takes at least one item
/// while any remain. The last allocation absorbs the whole remaining
/// pool so no item is ever orphaned, and earlier allocations take
/// precedence when items run out.
///
/// Returns one ascending index set per allocation; empty input is a
/// no-op returning no sets.
pub fn reallocate_items(items: &[ExtractedLineItem], amounts: &[Decimal]) -> Vec<Vec<usize>> {
    if amounts.is_empty() {
        return Vec::new();
    }

    let total_allocated: Decimal = amounts.iter().copied().sum();
    let total_items_ht = items_subtotal(items);
    let tolerance = Decimal::new(95, 2);

    let mut pool: VecDeque<usize> = (0..items.len()).collect();
    let mut assigned: Vec<Vec<usize>> = vec![Vec::new(); amounts.len()];

    for (slot, amount) in amounts.iter().enumerate().take(amounts.len() - 1) {
        let target_share = if total_allocated.is_zero() {
            Decimal::ZERO
        } else {
            amount / total_allocated
        };
        let threshold = total_items_ht * target_share * tolerance;
        let entitled = target_share > Decimal::ZERO;

        let mut current_ht = Decimal::ZERO;
        while let Some(&next) = pool.front() {
            let must_take_one = entitled && assigned[slot].is_empty();
            if current_ht >= threshold && !must_take_one {
                break;
            }
            pool.pop_front();
            current_ht += line_item_ht(&items[next]);
            assigned[slot].push(next);
        }
    }

    // Whatever survived the greedy passes lands on the last allocation.
    let last = amounts.len() - 1;
    assigned[last].extend(pool.drain(..));

    for indices in &mut assigned {
        indices.sort_unstable();
    }
    assigned
}
