use chrono::NaiveDate;
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db::queries;

/// Issues the next transfer reference for the venue-local day:
/// `PM-DDMMYYYY-NNNNNN` with a six-digit sequence that restarts daily.
/// Customers type this into their banking app, so it must stay short and
/// unambiguous.
pub fn next_payment_id(conn: &Connection, today_local: NaiveDate) -> anyhow::Result<String> {
    let prefix = format!("PM-{}-", today_local.format("%d%m%Y"));

    let next_seq = match queries::last_payment_id_like(conn, &prefix)? {
        Some(last) => last
            .rsplit('-')
            .next()
            .and_then(|tail| tail.parse::<u32>().ok())
            .map(|n| n + 1)
            .unwrap_or(1),
        None => 1,
    };

    Ok(format!("{prefix}{next_seq:06}"))
}

/// Static-image QR link for a bank transfer, when an account is configured.
pub fn transfer_qr_url(config: &AppConfig, payment_id: &str, amount: i64) -> Option<String> {
    if config.bank_account_number.is_empty() {
        return None;
    }
    Some(format!(
        "https://qr.sepay.vn/img?acc={}&bank={}&amount={}&des={}",
        config.bank_account_number, config.bank_code, amount, payment_id
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Payment, PaymentStatus};
    use chrono::NaiveDateTime;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn seed_payment(conn: &Connection, id: &str) {
        let now = NaiveDateTime::parse_from_str("2025-06-16 08:00", "%Y-%m-%d %H:%M").unwrap();
        queries::insert_payment(
            conn,
            &Payment {
                id: id.to_string(),
                booking_id: None,
                order_id: None,
                membership_id: None,
                customer_id: None,
                amount: 100_000,
                status: PaymentStatus::PendingPayment,
                note: None,
                payment_created_at: now,
                updated_at: now,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_first_id_of_the_day() {
        let conn = setup_db();
        let id = next_payment_id(&conn, d("2025-06-16")).unwrap();
        assert_eq!(id, "PM-16062025-000001");
    }

    #[test]
    fn test_sequence_continues_from_last() {
        let conn = setup_db();
        seed_payment(&conn, "PM-16062025-000007");
        let id = next_payment_id(&conn, d("2025-06-16")).unwrap();
        assert_eq!(id, "PM-16062025-000008");
    }

    #[test]
    fn test_sequence_is_per_day() {
        let conn = setup_db();
        seed_payment(&conn, "PM-15062025-000042");
        let id = next_payment_id(&conn, d("2025-06-16")).unwrap();
        assert_eq!(id, "PM-16062025-000001");
    }

    #[test]
    fn test_garbled_tail_restarts_sequence() {
        let conn = setup_db();
        seed_payment(&conn, "PM-16062025-oops");
        let id = next_payment_id(&conn, d("2025-06-16")).unwrap();
        assert_eq!(id, "PM-16062025-000001");
    }
}
