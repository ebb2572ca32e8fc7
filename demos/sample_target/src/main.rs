//! A small program to debug by hand:
//!
//! ```text
//! cargo build --manifest-path demos/sample_target/Cargo.toml
//! ```
//!
//! then launch `demos/sample_target/target/debug/sample_target` with a
//! breakpoint on `src/main.rs` line 32 (inside `order_total`).

#[derive(Debug)]
struct LineItem {
    name: &'static str,
    quantity: u32,
    unit_price: i64,
}

fn main() {
    let items = vec![
        LineItem { name: "bolt", quantity: 12, unit_price: 15 },
        LineItem { name: "nut", quantity: 12, unit_price: 5 },
        LineItem { name: "bracket", quantity: 2, unit_price: 240 },
    ];

    let total = order_total(&items);
    let discounted = apply_discount(total, 10);
    println!("total: {}, after discount: {}", total, discounted);
}

fn order_total(items: &[LineItem]) -> i64 {
    let mut sum = 0;
    for item in items {
        let line = item.unit_price * i64::from(item.quantity);
        sum += line;
    }
    sum
}

fn apply_discount(amount: i64, percent: i64) -> i64 {
    let discount = amount * percent / 100;
    amount - discount
}
