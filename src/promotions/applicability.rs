//! Promotion Applicability
//!
//! A line qualifies if its product is listed, or failing that its category is
//! listed. The two lists are alternatives: matching either one is enough. A
//! promotion with neither list applies to every line.

use crate::{cart::CartLine, promotions::Promotion};

/// Whether `line` qualifies for `promotion`.
pub fn is_applicable(line: &CartLine, promotion: &Promotion) -> bool {
    let products = &promotion.applicable_products;
    let categories = &promotion.applicable_categories;

    if !products.is_empty() && products.contains(&line.product_id) {
        return true;
    }

    if !categories.is_empty()
        && line
            .category_id
            .is_some_and(|category| categories.contains(&category))
    {
        return true;
    }

    products.is_empty() && categories.is_empty()
}

/// Lines of `lines` that qualify for `promotion`, in cart order.
pub fn applicable_lines<'a>(
    lines: &'a [CartLine],
    promotion: &'a Promotion,
) -> impl Iterator<Item = &'a CartLine> + 'a {
    lines
        .iter()
        .filter(move |line| is_applicable(line, promotion))
}
