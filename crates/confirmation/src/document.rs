//! Plain-text confirmation document.

use chrono::{DateTime, Utc};

use promise_core::OrderId;
use promise_core::calendar::format_date;
use promise_sales::CustomerRef;

use crate::confirmation::ShipmentDetail;

/// Commercial terms printed on every confirmation.
pub const TERMS: &str = "Net 30 days. Free shipping on orders over $500.";

const RULE: &str = "========================================";
const SEPARATOR: &str = "----------------------------------------";

/// Render the confirmation document. Output depends only on the arguments.
pub fn render(
    order_id: &OrderId,
    confirmation_number: &str,
    customer: &CustomerRef,
    issued_at: DateTime<Utc>,
    shipments: &[ShipmentDetail],
) -> String {
    let greeting = if customer.name.trim().is_empty() {
        "Customer"
    } else {
        customer.name.as_str()
    };

    let mut doc = String::new();
    doc.push_str(&format!("{RULE}\nORDER CONFIRMATION\n{RULE}\n\n"));
    doc.push_str(&format!("Dear {greeting},\n\nThank you for your order!\n\n"));
    doc.push_str(&format!("Order ID: {order_id}\n"));
    doc.push_str(&format!("Confirmation Number: {confirmation_number}\n"));
    doc.push_str(&format!(
        "Confirmation Date: {}\n\n",
        issued_at.format("%Y-%m-%d %H:%M:%S")
    ));
    doc.push_str(&format!("SHIPMENT DETAILS:\n{SEPARATOR}\n"));

    for (n, shipment) in shipments.iter().enumerate() {
        doc.push_str(&format!(
            "\nShipment {}:\n  Line: {}\n  Item: {}\n  Quantity: {} units\n  Ship Date: {}\n  Delivery Date: {}\n  Carrier: {}\n  Status: {}\n",
            n + 1,
            shipment.line_id,
            shipment.item,
            shipment.quantity,
            format_date(shipment.ship_date),
            format_date(shipment.delivery_date),
            shipment.carrier,
            shipment.status.as_str(),
        ));
    }

    doc.push_str(&format!("\n{SEPARATOR}\nTERMS & CONDITIONS:\n{TERMS}\n"));
    doc.push_str("Returns: 30-day return policy applies\n\n");
    doc.push_str(&format!("Thank you for your business!\n\n{RULE}\n"));
    doc
}
