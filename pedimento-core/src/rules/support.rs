use crate::types::{LineItem, Tax};

/// Field label for an item-level finding, e.g. `Item 3 Fraccion`.
pub(super) fn item_field(item: &LineItem, name: &str) -> String {
    format!("Item {} {}", item.secuencia, name)
}

pub(super) fn money(value: f64) -> String {
    format!("{value:.2}")
}

/// Sum of the known values, or `None` when every value is unknown.
pub(super) fn sum_known<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    values
        .into_iter()
        .flatten()
        .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

/// Sum of every value, or `None` when any value is unknown or there are none.
/// An unknown value is never counted as zero.
pub(super) fn sum_complete<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    values
        .into_iter()
        .try_fold(None, |acc: Option<f64>, v| v.map(|v| Some(acc.unwrap_or(0.0) + v)))
        .flatten()
}

/// Known amount of a tax line, treating a missing line as unknown.
pub(super) fn tax_amount(tax: Option<&Tax>) -> Option<f64> {
    tax.and_then(|t| t.amount)
}

pub(super) fn contains(list: &[String], value: &str) -> bool {
    list.iter().any(|entry| entry == value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_sum_needs_every_value() {
        assert_eq!(sum_complete([Some(1.0), Some(2.5)]), Some(3.5));
        assert_eq!(sum_complete([Some(1.0), None]), None);
        assert_eq!(sum_complete(std::iter::empty()), None);
        assert_eq!(sum_known([Some(1.0), None]), Some(1.0));
    }
}
