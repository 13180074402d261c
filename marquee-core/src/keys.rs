//! Key layout inside the lease store. Holds and booked markers live in
//! disjoint namespaces so a scan of one never returns the other.

const HOLD: &str = "hold";
const BOOKED: &str = "booked";
const PAYMENT_INTENT: &str = "payment_intent";

pub fn hold(show_id: i64, seat_number: &str) -> String {
    format!("{}:{}:{}", HOLD, show_id, seat_number)
}

pub fn booked(show_id: i64, seat_number: &str) -> String {
    format!("{}:{}:{}", BOOKED, show_id, seat_number)
}

pub fn hold_prefix(show_id: i64) -> String {
    format!("{}:{}:", HOLD, show_id)
}

pub fn booked_prefix(show_id: i64) -> String {
    format!("{}:{}:", BOOKED, show_id)
}

pub fn payment_intent(method: &str, reference: &str) -> String {
    format!("{}:{}:{}", PAYMENT_INTENT, method, reference)
}

/// Seat number part of a hold/booked key, given the prefix it was scanned with.
pub fn seat_number<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix).filter(|seat| !seat.is_empty())
}
