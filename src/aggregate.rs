//! Order aggregation: fetch the orders of a bulk and fold their line items
//! into one position per SKU.

use std::collections::HashMap;

use tracing::{debug, error, info};

use crate::contract::OrderQuery;
use crate::error::{SliError, SliResult};
use crate::model::{Bulk, ComposedLineItem, LineItem, Order};

/// Composed positions of a bulk and the value declared for carriage.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemSummary {
    pub line_items: Vec<ComposedLineItem>,
    pub declared_value_for_carriage: i64,
}

/// Fetch all orders of `bulk`. No orders is a domain error.
pub async fn fetch_orders<Q>(query: &Q, bulk: &Bulk) -> SliResult<Vec<Order>>
where
    Q: OrderQuery + ?Sized,
{
    debug!(bulk_id = %bulk.id, refs = bulk.content.orders.len(), "Fetching orders in bulk");
    let orders = query
        .get_all_orders_in_bulk(&bulk.content)
        .await
        .map_err(|e| {
            error!(bulk_id = %bulk.id, error = ?e, "Order query failed");
            SliError::UpstreamFetch(e)
        })?;

    if orders.is_empty() {
        error!(bulk_id = %bulk.id, "No orders found for bulk");
        return Err(SliError::OrderNotFound {
            bulk_id: bulk.id.clone(),
        });
    }

    info!(bulk_id = %bulk.id, order_count = orders.len(), "Fetched orders in bulk");
    Ok(orders)
}

/// Group every line item of `orders` by SKU and sum price, weight and
/// quantity per group.
///
/// Groups appear in order of first discovery. Each group is reduced with its
/// first item as seed, so descriptive fields come from that item. Prices are
/// rounded per group when added to the declared value, never after summing.
/// The input orders are left untouched.
pub fn summarise_line_items(orders: &[Order], sme_indicator: &str) -> LineItemSummary {
    let mut groups: Vec<Vec<LineItem>> = Vec::new();
    let mut index_by_sku: HashMap<String, usize> = HashMap::new();

    for order in orders {
        for line_item in &order.line_items {
            let mut item = line_item.clone();
            item.sme_indicator = Some(sme_indicator.to_string());
            item.price = line_item.extended_price();
            item.weight = line_item.extended_weight();

            match index_by_sku.get(&item.sku) {
                Some(&idx) => groups[idx].push(item),
                None => {
                    index_by_sku.insert(item.sku.clone(), groups.len());
                    groups.push(vec![item]);
                }
            }
        }
    }

    let mut line_items = Vec::with_capacity(groups.len());
    let mut declared_value_for_carriage = 0;

    for group in groups {
        let Some(composed) = compose_group(group) else {
            continue;
        };
        declared_value_for_carriage += composed.rounded_price;
        line_items.push(composed);
    }

    debug!(
        skus = line_items.len(),
        declared_value = declared_value_for_carriage,
        "Summarised line items"
    );

    LineItemSummary {
        line_items,
        declared_value_for_carriage,
    }
}

fn compose_group(group: Vec<LineItem>) -> Option<ComposedLineItem> {
    let mut members = group.into_iter();
    let seed = members.next()?;
    let summed = members.fold(seed, |mut acc, item| {
        acc.price += item.price;
        acc.weight += item.weight;
        acc.quantity += item.quantity;
        acc
    });

    // `_id` and `__v` stay behind on the line item.
    Some(ComposedLineItem {
        rounded_price: round_half_up(summed.price),
        sku: summed.sku,
        description: summed.description,
        hs_code: summed.hs_code,
        country_of_origin: summed.country_of_origin,
        price: summed.price,
        weight: summed.weight,
        quantity: summed.quantity,
        sme_indicator: summed.sme_indicator,
    })
}

/// Nearest integer, halves towards positive infinity.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}
