use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection};

use crate::models::{
    Booking, BookingStatus, Court, CourtStatus, Customer, DiscountType, Occurrence,
    OccurrenceStatus, Order, OrderItem, OrderStatus, Payment, PaymentStatus, PricingRule, Product,
    ServiceBilling, ServiceItem, ServiceLine, Voucher,
};

fn fmt_dt(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn parse_dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap_or_default()
}

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_default()
}

fn parse_time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M:%S").unwrap_or_default()
}

// ── Courts & pricing rules ──

pub fn insert_court(conn: &Connection, court: &Court) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO courts (id, name, status, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            court.id,
            court.name,
            court.status.as_str(),
            fmt_dt(&court.created_at)
        ],
    )?;
    Ok(())
}

pub fn court_name_exists(conn: &Connection, name: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM courts WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn get_court(conn: &Connection, id: &str) -> anyhow::Result<Option<Court>> {
    let result = conn.query_row(
        "SELECT id, name, status, created_at FROM courts WHERE id = ?1",
        params![id],
        |row| {
            Ok(Court {
                id: row.get(0)?,
                name: row.get(1)?,
                status: CourtStatus::from_str(&row.get::<_, String>(2)?),
                created_at: parse_dt(&row.get::<_, String>(3)?),
            })
        },
    );

    match result {
        Ok(court) => Ok(Some(court)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_courts(conn: &Connection) -> anyhow::Result<Vec<Court>> {
    let mut stmt =
        conn.prepare("SELECT id, name, status, created_at FROM courts ORDER BY name ASC")?;

    let rows = stmt.query_map([], |row| {
        Ok(Court {
            id: row.get(0)?,
            name: row.get(1)?,
            status: CourtStatus::from_str(&row.get::<_, String>(2)?),
            created_at: parse_dt(&row.get::<_, String>(3)?),
        })
    })?;

    let mut courts = vec![];
    for row in rows {
        courts.push(row?);
    }
    Ok(courts)
}

pub fn set_court_status(conn: &Connection, id: &str, status: CourtStatus) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE courts SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(count > 0)
}

/// Conditional court transition; reports whether this caller won the write.
pub fn set_court_status_if(
    conn: &Connection,
    id: &str,
    from: CourtStatus,
    to: CourtStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE courts SET status = ?1 WHERE id = ?2 AND status = ?3",
        params![to.as_str(), id, from.as_str()],
    )?;
    Ok(count > 0)
}

pub fn insert_pricing_rule(conn: &Connection, rule: &PricingRule) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO pricing_rules (court_id, days_of_week, start_time, end_time, price_per_hour, rule_order)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            rule.court_id,
            serde_json::to_string(&rule.days_of_week)?,
            rule.start_time.format("%H:%M:%S").to_string(),
            rule.end_time.format("%H:%M:%S").to_string(),
            rule.price_per_hour,
            rule.rule_order
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_pricing_rules(conn: &Connection, court_id: &str) -> anyhow::Result<Vec<PricingRule>> {
    let mut stmt = conn.prepare(
        "SELECT id, court_id, days_of_week, start_time, end_time, price_per_hour, rule_order
         FROM pricing_rules WHERE court_id = ?1 ORDER BY rule_order ASC, id ASC",
    )?;

    let rows = stmt.query_map(params![court_id], |row| {
        let days_json: String = row.get(2)?;
        Ok(PricingRule {
            id: row.get(0)?,
            court_id: row.get(1)?,
            days_of_week: serde_json::from_str(&days_json).unwrap_or_default(),
            start_time: parse_time(&row.get::<_, String>(3)?),
            end_time: parse_time(&row.get::<_, String>(4)?),
            price_per_hour: row.get(5)?,
            rule_order: row.get(6)?,
        })
    })?;

    let mut rules = vec![];
    for row in rows {
        rules.push(row?);
    }
    Ok(rules)
}

// ── Customers ──

pub fn insert_customer(
    conn: &Connection,
    full_name: &str,
    email: Option<&str>,
    phone: Option<&str>,
    now: &NaiveDateTime,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO customers (full_name, email, phone, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![full_name, email, phone, fmt_dt(now)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_customer(conn: &Connection, id: i64) -> anyhow::Result<Option<Customer>> {
    let result = conn.query_row(
        "SELECT id, full_name, email, phone, created_at FROM customers WHERE id = ?1",
        params![id],
        |row| {
            Ok(Customer {
                id: row.get(0)?,
                full_name: row.get(1)?,
                email: row.get(2)?,
                phone: row.get(3)?,
                created_at: parse_dt(&row.get::<_, String>(4)?),
            })
        },
    );

    match result {
        Ok(customer) => Ok(Some(customer)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_customers(conn: &Connection) -> anyhow::Result<Vec<Customer>> {
    let mut stmt = conn.prepare(
        "SELECT id, full_name, email, phone, created_at FROM customers ORDER BY id ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(Customer {
            id: row.get(0)?,
            full_name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            created_at: parse_dt(&row.get::<_, String>(4)?),
        })
    })?;

    let mut customers = vec![];
    for row in rows {
        customers.push(row?);
    }
    Ok(customers)
}

// ── Products & services catalog ──

pub fn insert_product(conn: &Connection, name: &str, sale_price: i64) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO products (name, sale_price) VALUES (?1, ?2)",
        params![name, sale_price],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_product(conn: &Connection, id: i64) -> anyhow::Result<Option<Product>> {
    let result = conn.query_row(
        "SELECT id, name, sale_price, is_active FROM products WHERE id = ?1",
        params![id],
        |row| {
            Ok(Product {
                id: row.get(0)?,
                name: row.get(1)?,
                sale_price: row.get(2)?,
                is_active: row.get(3)?,
            })
        },
    );

    match result {
        Ok(product) => Ok(Some(product)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_products(conn: &Connection) -> anyhow::Result<Vec<Product>> {
    let mut stmt =
        conn.prepare("SELECT id, name, sale_price, is_active FROM products ORDER BY id ASC")?;

    let rows = stmt.query_map([], |row| {
        Ok(Product {
            id: row.get(0)?,
            name: row.get(1)?,
            sale_price: row.get(2)?,
            is_active: row.get(3)?,
        })
    })?;

    let mut products = vec![];
    for row in rows {
        products.push(row?);
    }
    Ok(products)
}

pub fn insert_service(
    conn: &Connection,
    name: &str,
    unit_price: i64,
    billing: ServiceBilling,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO services (name, unit_price, billing) VALUES (?1, ?2, ?3)",
        params![name, unit_price, billing.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_service(conn: &Connection, id: i64) -> anyhow::Result<Option<ServiceItem>> {
    let result = conn.query_row(
        "SELECT id, name, unit_price, billing, is_active FROM services WHERE id = ?1",
        params![id],
        |row| {
            Ok(ServiceItem {
                id: row.get(0)?,
                name: row.get(1)?,
                unit_price: row.get(2)?,
                billing: ServiceBilling::from_str(&row.get::<_, String>(3)?),
                is_active: row.get(4)?,
            })
        },
    );

    match result {
        Ok(service) => Ok(Some(service)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_services(conn: &Connection) -> anyhow::Result<Vec<ServiceItem>> {
    let mut stmt = conn
        .prepare("SELECT id, name, unit_price, billing, is_active FROM services ORDER BY id ASC")?;

    let rows = stmt.query_map([], |row| {
        Ok(ServiceItem {
            id: row.get(0)?,
            name: row.get(1)?,
            unit_price: row.get(2)?,
            billing: ServiceBilling::from_str(&row.get::<_, String>(3)?),
            is_active: row.get(4)?,
        })
    })?;

    let mut services = vec![];
    for row in rows {
        services.push(row?);
    }
    Ok(services)
}

// ── Bookings ──

const BOOKING_COLS: &str = "id, customer_id, court_id, start_date, end_date, start_time, end_time, \
     days_of_week, status, voucher_id, discount_amount, note, created_at, updated_at";

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let days_json: String = row.get(7)?;

    Ok(Booking {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        court_id: row.get(2)?,
        start_date: parse_date(&row.get::<_, String>(3)?),
        end_date: parse_date(&row.get::<_, String>(4)?),
        start_time: parse_time(&row.get::<_, String>(5)?),
        end_time: parse_time(&row.get::<_, String>(6)?),
        days_of_week: serde_json::from_str(&days_json).unwrap_or_default(),
        status: BookingStatus::from_str(&row.get::<_, String>(8)?),
        voucher_id: row.get(9)?,
        discount_amount: row.get(10)?,
        note: row.get(11)?,
        created_at: parse_dt(&row.get::<_, String>(12)?),
        updated_at: parse_dt(&row.get::<_, String>(13)?),
    })
}

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, customer_id, court_id, start_date, end_date, start_time, end_time,
             days_of_week, status, voucher_id, discount_amount, note, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            booking.id,
            booking.customer_id,
            booking.court_id,
            booking.start_date.format("%Y-%m-%d").to_string(),
            booking.end_date.format("%Y-%m-%d").to_string(),
            booking.start_time.format("%H:%M:%S").to_string(),
            booking.end_time.format("%H:%M:%S").to_string(),
            serde_json::to_string(&booking.days_of_week)?,
            booking.status.as_str(),
            booking.voucher_id,
            booking.discount_amount,
            booking.note,
            fmt_dt(&booking.created_at),
            fmt_dt(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_bookings(
    conn: &Connection,
    status: Option<&str>,
    court_id: Option<&str>,
    customer_id: Option<i64>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let mut clauses: Vec<String> = vec![];
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(status) = status {
        params_vec.push(Box::new(status.to_string()));
        clauses.push(format!("status = ?{}", params_vec.len()));
    }
    if let Some(court_id) = court_id {
        params_vec.push(Box::new(court_id.to_string()));
        clauses.push(format!("court_id = ?{}", params_vec.len()));
    }
    if let Some(customer_id) = customer_id {
        params_vec.push(Box::new(customer_id));
        clauses.push(format!("customer_id = ?{}", params_vec.len()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    params_vec.push(Box::new(limit));
    let sql = format!(
        "SELECT {BOOKING_COLS} FROM bookings{where_sql} ORDER BY created_at DESC LIMIT ?{}",
        params_vec.len()
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), fmt_dt(now), id],
    )?;
    Ok(count > 0)
}

/// Conditional booking transition for webhook/sweeper races; 0 rows means
/// the other side already moved it.
pub fn update_booking_status_if(
    conn: &Connection,
    id: &str,
    from: BookingStatus,
    to: BookingStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_str(), fmt_dt(now), id, from.as_str()],
    )?;
    Ok(count > 0)
}

// ── Occurrences ──

const OCCURRENCE_COLS: &str =
    "id, booking_id, court_id, date, start_time, end_time, status, note, created_at, updated_at";

fn parse_occurrence_row(row: &rusqlite::Row) -> anyhow::Result<Occurrence> {
    Ok(Occurrence {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        court_id: row.get(2)?,
        date: parse_date(&row.get::<_, String>(3)?),
        start_time: parse_time(&row.get::<_, String>(4)?),
        end_time: parse_time(&row.get::<_, String>(5)?),
        status: OccurrenceStatus::from_str(&row.get::<_, String>(6)?),
        note: row.get(7)?,
        created_at: parse_dt(&row.get::<_, String>(8)?),
        updated_at: parse_dt(&row.get::<_, String>(9)?),
    })
}

pub fn insert_occurrence(conn: &Connection, occ: &Occurrence) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO occurrences (id, booking_id, court_id, date, start_time, end_time, status, note, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            occ.id,
            occ.booking_id,
            occ.court_id,
            occ.date.format("%Y-%m-%d").to_string(),
            occ.start_time.format("%H:%M:%S").to_string(),
            occ.end_time.format("%H:%M:%S").to_string(),
            occ.status.as_str(),
            occ.note,
            fmt_dt(&occ.created_at),
            fmt_dt(&occ.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_occurrence(conn: &Connection, id: &str) -> anyhow::Result<Option<Occurrence>> {
    let result = conn.query_row(
        &format!("SELECT {OCCURRENCE_COLS} FROM occurrences WHERE id = ?1"),
        params![id],
        |row| Ok(parse_occurrence_row(row)),
    );

    match result {
        Ok(occ) => Ok(Some(occ?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_booking_occurrences(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Vec<Occurrence>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {OCCURRENCE_COLS} FROM occurrences WHERE booking_id = ?1 ORDER BY date ASC, start_time ASC"
    ))?;

    let rows = stmt.query_map(params![booking_id], |row| Ok(parse_occurrence_row(row)))?;

    let mut occurrences = vec![];
    for row in rows {
        occurrences.push(row??);
    }
    Ok(occurrences)
}

pub fn list_court_occurrences(
    conn: &Connection,
    court_id: &str,
    from: &NaiveDate,
    to: &NaiveDate,
) -> anyhow::Result<Vec<Occurrence>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {OCCURRENCE_COLS} FROM occurrences
         WHERE court_id = ?1 AND date >= ?2 AND date <= ?3
         ORDER BY date ASC, start_time ASC"
    ))?;

    let rows = stmt.query_map(
        params![
            court_id,
            from.format("%Y-%m-%d").to_string(),
            to.format("%Y-%m-%d").to_string()
        ],
        |row| Ok(parse_occurrence_row(row)),
    )?;

    let mut occurrences = vec![];
    for row in rows {
        occurrences.push(row??);
    }
    Ok(occurrences)
}

/// Occurrences that keep the slot busy: Active and CheckedIn ones whose
/// window intersects `[start, end)` on the given court and date.
pub fn find_blocking_occurrences(
    conn: &Connection,
    court_id: &str,
    date: &NaiveDate,
    start: &NaiveTime,
    end: &NaiveTime,
) -> anyhow::Result<Vec<Occurrence>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {OCCURRENCE_COLS} FROM occurrences
         WHERE court_id = ?1 AND date = ?2
           AND status IN ('active', 'checked_in')
           AND start_time < ?4 AND end_time > ?3"
    ))?;

    let rows = stmt.query_map(
        params![
            court_id,
            date.format("%Y-%m-%d").to_string(),
            start.format("%H:%M:%S").to_string(),
            end.format("%H:%M:%S").to_string()
        ],
        |row| Ok(parse_occurrence_row(row)),
    )?;

    let mut occurrences = vec![];
    for row in rows {
        occurrences.push(row??);
    }
    Ok(occurrences)
}

/// Conditional occurrence transition; the state machine's only write path.
pub fn update_occurrence_status_if(
    conn: &Connection,
    id: &str,
    from: OccurrenceStatus,
    to: OccurrenceStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE occurrences SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_str(), fmt_dt(now), id, from.as_str()],
    )?;
    Ok(count > 0)
}

pub fn set_occurrence_note(
    conn: &Connection,
    id: &str,
    note: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE occurrences SET note = ?1, updated_at = ?2 WHERE id = ?3",
        params![note, fmt_dt(now), id],
    )?;
    Ok(count > 0)
}

/// Releases every still-Active occurrence of a booking (hold expiry and
/// booking-level cancel).
pub fn cancel_booking_occurrences(
    conn: &Connection,
    booking_id: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE occurrences SET status = 'cancelled', updated_at = ?1
         WHERE booking_id = ?2 AND status = 'active'",
        params![fmt_dt(now), booking_id],
    )?;
    Ok(count)
}

/// Active occurrences on `date` whose end time has already passed.
pub fn list_overdue_occurrences(
    conn: &Connection,
    date: &NaiveDate,
    now_time: &NaiveTime,
) -> anyhow::Result<Vec<Occurrence>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {OCCURRENCE_COLS} FROM occurrences
         WHERE date = ?1 AND status = 'active' AND end_time <= ?2"
    ))?;

    let rows = stmt.query_map(
        params![
            date.format("%Y-%m-%d").to_string(),
            now_time.format("%H:%M:%S").to_string()
        ],
        |row| Ok(parse_occurrence_row(row)),
    )?;

    let mut occurrences = vec![];
    for row in rows {
        occurrences.push(row??);
    }
    Ok(occurrences)
}

// ── Order items & service lines ──

fn parse_order_item_row(row: &rusqlite::Row) -> anyhow::Result<OrderItem> {
    Ok(OrderItem {
        id: row.get(0)?,
        occurrence_id: row.get(1)?,
        product_id: row.get(2)?,
        product_name: row.get(3)?,
        quantity: row.get(4)?,
        unit_price: row.get(5)?,
        total_price: row.get(6)?,
        created_at: parse_dt(&row.get::<_, String>(7)?),
    })
}

pub fn insert_order_item(conn: &Connection, item: &OrderItem) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO order_items (id, occurrence_id, product_id, quantity, unit_price, total_price, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            item.id,
            item.occurrence_id,
            item.product_id,
            item.quantity,
            item.unit_price,
            item.total_price,
            fmt_dt(&item.created_at),
        ],
    )?;
    Ok(())
}

pub fn find_order_item(
    conn: &Connection,
    occurrence_id: &str,
    product_id: i64,
) -> anyhow::Result<Option<OrderItem>> {
    let result = conn.query_row(
        "SELECT oi.id, oi.occurrence_id, oi.product_id, p.name, oi.quantity, oi.unit_price, oi.total_price, oi.created_at
         FROM order_items oi JOIN products p ON p.id = oi.product_id
         WHERE oi.occurrence_id = ?1 AND oi.product_id = ?2",
        params![occurrence_id, product_id],
        |row| Ok(parse_order_item_row(row)),
    );

    match result {
        Ok(item) => Ok(Some(item?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_order_item(conn: &Connection, id: &str) -> anyhow::Result<Option<OrderItem>> {
    let result = conn.query_row(
        "SELECT oi.id, oi.occurrence_id, oi.product_id, p.name, oi.quantity, oi.unit_price, oi.total_price, oi.created_at
         FROM order_items oi JOIN products p ON p.id = oi.product_id
         WHERE oi.id = ?1",
        params![id],
        |row| Ok(parse_order_item_row(row)),
    );

    match result {
        Ok(item) => Ok(Some(item?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_order_items(conn: &Connection, occurrence_id: &str) -> anyhow::Result<Vec<OrderItem>> {
    let mut stmt = conn.prepare(
        "SELECT oi.id, oi.occurrence_id, oi.product_id, p.name, oi.quantity, oi.unit_price, oi.total_price, oi.created_at
         FROM order_items oi JOIN products p ON p.id = oi.product_id
         WHERE oi.occurrence_id = ?1 ORDER BY oi.created_at ASC, oi.id ASC",
    )?;

    let rows = stmt.query_map(params![occurrence_id], |row| Ok(parse_order_item_row(row)))?;

    let mut items = vec![];
    for row in rows {
        items.push(row??);
    }
    Ok(items)
}

pub fn set_order_item_quantity(
    conn: &Connection,
    id: &str,
    quantity: i64,
    total_price: i64,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE order_items SET quantity = ?1, total_price = ?2 WHERE id = ?3",
        params![quantity, total_price, id],
    )?;
    Ok(count > 0)
}

pub fn delete_order_item(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM order_items WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

const SERVICE_LINE_COLS: &str = "sl.id, sl.occurrence_id, sl.service_id, s.name, sl.quantity, \
     sl.unit_price, sl.billing, sl.started_at, sl.ended_at, sl.total_price, sl.created_at";

fn parse_service_line_row(row: &rusqlite::Row) -> anyhow::Result<ServiceLine> {
    let started_at: Option<String> = row.get(7)?;
    let ended_at: Option<String> = row.get(8)?;

    Ok(ServiceLine {
        id: row.get(0)?,
        occurrence_id: row.get(1)?,
        service_id: row.get(2)?,
        service_name: row.get(3)?,
        quantity: row.get(4)?,
        unit_price: row.get(5)?,
        billing: ServiceBilling::from_str(&row.get::<_, String>(6)?),
        started_at: started_at.map(|s| parse_dt(&s)),
        ended_at: ended_at.map(|s| parse_dt(&s)),
        total_price: row.get(9)?,
        created_at: parse_dt(&row.get::<_, String>(10)?),
    })
}

pub fn insert_service_line(conn: &Connection, line: &ServiceLine) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO service_lines (id, occurrence_id, service_id, quantity, unit_price, billing, started_at, ended_at, total_price, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            line.id,
            line.occurrence_id,
            line.service_id,
            line.quantity,
            line.unit_price,
            line.billing.as_str(),
            line.started_at.as_ref().map(fmt_dt),
            line.ended_at.as_ref().map(fmt_dt),
            line.total_price,
            fmt_dt(&line.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_service_line(conn: &Connection, id: &str) -> anyhow::Result<Option<ServiceLine>> {
    let result = conn.query_row(
        &format!(
            "SELECT {SERVICE_LINE_COLS} FROM service_lines sl
             JOIN services s ON s.id = sl.service_id WHERE sl.id = ?1"
        ),
        params![id],
        |row| Ok(parse_service_line_row(row)),
    );

    match result {
        Ok(line) => Ok(Some(line?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_service_lines(
    conn: &Connection,
    occurrence_id: &str,
) -> anyhow::Result<Vec<ServiceLine>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SERVICE_LINE_COLS} FROM service_lines sl
         JOIN services s ON s.id = sl.service_id
         WHERE sl.occurrence_id = ?1 ORDER BY sl.created_at ASC, sl.id ASC"
    ))?;

    let rows = stmt.query_map(params![occurrence_id], |row| {
        Ok(parse_service_line_row(row))
    })?;

    let mut lines = vec![];
    for row in rows {
        lines.push(row??);
    }
    Ok(lines)
}

/// Closes a running duration line. Guarded on `ended_at IS NULL` so a
/// double end keeps the first bill.
pub fn close_service_line(
    conn: &Connection,
    id: &str,
    ended_at: &NaiveDateTime,
    total_price: i64,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE service_lines SET ended_at = ?1, total_price = ?2 WHERE id = ?3 AND ended_at IS NULL",
        params![fmt_dt(ended_at), total_price, id],
    )?;
    Ok(count > 0)
}

// ── Orders ──

const ORDER_COLS: &str = "id, occurrence_id, booking_id, customer_id, base_amount, items_subtotal, \
     services_subtotal, late_fee_amount, overrun_minutes, voucher_id, discount_amount, \
     total_amount, status, payment_method, note, created_at, updated_at";

fn parse_order_row(row: &rusqlite::Row) -> anyhow::Result<Order> {
    Ok(Order {
        id: row.get(0)?,
        occurrence_id: row.get(1)?,
        booking_id: row.get(2)?,
        customer_id: row.get(3)?,
        base_amount: row.get(4)?,
        items_subtotal: row.get(5)?,
        services_subtotal: row.get(6)?,
        late_fee_amount: row.get(7)?,
        overrun_minutes: row.get(8)?,
        voucher_id: row.get(9)?,
        discount_amount: row.get(10)?,
        total_amount: row.get(11)?,
        status: OrderStatus::from_str(&row.get::<_, String>(12)?),
        payment_method: row.get(13)?,
        note: row.get(14)?,
        created_at: parse_dt(&row.get::<_, String>(15)?),
        updated_at: parse_dt(&row.get::<_, String>(16)?),
    })
}

pub fn insert_order(conn: &Connection, order: &Order) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO orders (id, occurrence_id, booking_id, customer_id, base_amount, items_subtotal,
             services_subtotal, late_fee_amount, overrun_minutes, voucher_id, discount_amount,
             total_amount, status, payment_method, note, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            order.id,
            order.occurrence_id,
            order.booking_id,
            order.customer_id,
            order.base_amount,
            order.items_subtotal,
            order.services_subtotal,
            order.late_fee_amount,
            order.overrun_minutes,
            order.voucher_id,
            order.discount_amount,
            order.total_amount,
            order.status.as_str(),
            order.payment_method,
            order.note,
            fmt_dt(&order.created_at),
            fmt_dt(&order.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_order(conn: &Connection, id: &str) -> anyhow::Result<Option<Order>> {
    let result = conn.query_row(
        &format!("SELECT {ORDER_COLS} FROM orders WHERE id = ?1"),
        params![id],
        |row| Ok(parse_order_row(row)),
    );

    match result {
        Ok(order) => Ok(Some(order?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_open_order_for_occurrence(
    conn: &Connection,
    occurrence_id: &str,
) -> anyhow::Result<Option<Order>> {
    let result = conn.query_row(
        &format!(
            "SELECT {ORDER_COLS} FROM orders
             WHERE occurrence_id = ?1 AND status != 'cancelled' LIMIT 1"
        ),
        params![occurrence_id],
        |row| Ok(parse_order_row(row)),
    );

    match result {
        Ok(order) => Ok(Some(order?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_order_status_if(
    conn: &Connection,
    id: &str,
    from: OrderStatus,
    to: OrderStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_str(), fmt_dt(now), id, from.as_str()],
    )?;
    Ok(count > 0)
}

/// Restarts the payment window of an expired order's payments.
pub fn reset_order_payments(
    conn: &Connection,
    order_id: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE payments SET status = 'pending_payment', payment_created_at = ?1, updated_at = ?1
         WHERE order_id = ?2 AND status = 'cancelled'",
        params![fmt_dt(now), order_id],
    )?;
    Ok(count)
}

// ── Payments ──

const PAYMENT_COLS: &str = "id, booking_id, order_id, membership_id, customer_id, amount, status, \
     note, payment_created_at, updated_at";

fn parse_payment_row(row: &rusqlite::Row) -> anyhow::Result<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        order_id: row.get(2)?,
        membership_id: row.get(3)?,
        customer_id: row.get(4)?,
        amount: row.get(5)?,
        status: PaymentStatus::from_str(&row.get::<_, String>(6)?),
        note: row.get(7)?,
        payment_created_at: parse_dt(&row.get::<_, String>(8)?),
        updated_at: parse_dt(&row.get::<_, String>(9)?),
    })
}

pub fn insert_payment(conn: &Connection, payment: &Payment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO payments (id, booking_id, order_id, membership_id, customer_id, amount, status, note, payment_created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            payment.id,
            payment.booking_id,
            payment.order_id,
            payment.membership_id,
            payment.customer_id,
            payment.amount,
            payment.status.as_str(),
            payment.note,
            fmt_dt(&payment.payment_created_at),
            fmt_dt(&payment.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_payment(conn: &Connection, id: &str) -> anyhow::Result<Option<Payment>> {
    let result = conn.query_row(
        &format!("SELECT {PAYMENT_COLS} FROM payments WHERE id = ?1"),
        params![id],
        |row| Ok(parse_payment_row(row)),
    );

    match result {
        Ok(payment) => Ok(Some(payment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn find_payment_for_booking(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Option<Payment>> {
    let result = conn.query_row(
        &format!(
            "SELECT {PAYMENT_COLS} FROM payments
             WHERE booking_id = ?1 AND status != 'cancelled'
             ORDER BY payment_created_at DESC LIMIT 1"
        ),
        params![booking_id],
        |row| Ok(parse_payment_row(row)),
    );

    match result {
        Ok(payment) => Ok(Some(payment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn find_payment_for_order(
    conn: &Connection,
    order_id: &str,
) -> anyhow::Result<Option<Payment>> {
    let result = conn.query_row(
        &format!(
            "SELECT {PAYMENT_COLS} FROM payments
             WHERE order_id = ?1
             ORDER BY payment_created_at DESC LIMIT 1"
        ),
        params![order_id],
        |row| Ok(parse_payment_row(row)),
    );

    match result {
        Ok(payment) => Ok(Some(payment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Highest id issued under a day prefix, e.g. `PM-16062025-%`.
pub fn last_payment_id_like(conn: &Connection, prefix: &str) -> anyhow::Result<Option<String>> {
    let pattern = format!("{prefix}%");
    let result = conn.query_row(
        "SELECT id FROM payments WHERE id LIKE ?1 ORDER BY id DESC LIMIT 1",
        params![pattern],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(id) => Ok(Some(id)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Flips a payment to Paid unless it already is; the webhook's idempotency
/// gate.
pub fn mark_payment_paid(conn: &Connection, id: &str, now: &NaiveDateTime) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE payments SET status = 'paid', updated_at = ?1 WHERE id = ?2 AND status != 'paid'",
        params![fmt_dt(now), id],
    )?;
    Ok(count > 0)
}

pub fn update_payment_status_if(
    conn: &Connection,
    id: &str,
    from: PaymentStatus,
    to: PaymentStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE payments SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_str(), fmt_dt(now), id, from.as_str()],
    )?;
    Ok(count > 0)
}

pub fn append_payment_note(
    conn: &Connection,
    id: &str,
    note: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE payments SET note = CASE WHEN note IS NULL OR note = '' THEN ?1 ELSE note || ' | ' || ?1 END,
             updated_at = ?2
         WHERE id = ?3",
        params![note, fmt_dt(now), id],
    )?;
    Ok(count > 0)
}

/// Drops every still-pending payment of a booking (manual cancel).
pub fn cancel_pending_booking_payments(
    conn: &Connection,
    booking_id: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE payments SET status = 'cancelled', updated_at = ?1
         WHERE booking_id = ?2 AND status = 'pending_payment'",
        params![fmt_dt(now), booking_id],
    )?;
    Ok(count)
}

/// Booking-hold payments whose window closed at or before `cutoff`.
pub fn list_expired_booking_holds(
    conn: &Connection,
    cutoff: &NaiveDateTime,
) -> anyhow::Result<Vec<Payment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PAYMENT_COLS} FROM payments
         WHERE status = 'pending_payment' AND booking_id IS NOT NULL AND payment_created_at <= ?1"
    ))?;

    let rows = stmt.query_map(params![fmt_dt(cutoff)], |row| Ok(parse_payment_row(row)))?;

    let mut payments = vec![];
    for row in rows {
        payments.push(row??);
    }
    Ok(payments)
}

pub fn list_expired_order_holds(
    conn: &Connection,
    cutoff: &NaiveDateTime,
) -> anyhow::Result<Vec<Payment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PAYMENT_COLS} FROM payments
         WHERE status = 'pending_payment' AND order_id IS NOT NULL AND payment_created_at <= ?1"
    ))?;

    let rows = stmt.query_map(params![fmt_dt(cutoff)], |row| Ok(parse_payment_row(row)))?;

    let mut payments = vec![];
    for row in rows {
        payments.push(row??);
    }
    Ok(payments)
}

// ── Vouchers ──

const VOUCHER_COLS: &str = "id, code, discount_type, discount_value, max_discount, min_order, \
     start_at, end_at, usage_limit_total, usage_limit_per_user, used_count, is_active";

fn parse_voucher_row(row: &rusqlite::Row) -> anyhow::Result<Voucher> {
    let start_at: Option<String> = row.get(6)?;
    let end_at: Option<String> = row.get(7)?;

    Ok(Voucher {
        id: row.get(0)?,
        code: row.get(1)?,
        discount_type: DiscountType::from_str(&row.get::<_, String>(2)?),
        discount_value: row.get(3)?,
        max_discount: row.get(4)?,
        min_order: row.get(5)?,
        start_at: start_at.map(|s| parse_dt(&s)),
        end_at: end_at.map(|s| parse_dt(&s)),
        usage_limit_total: row.get(8)?,
        usage_limit_per_user: row.get(9)?,
        used_count: row.get(10)?,
        is_active: row.get(11)?,
    })
}

pub fn insert_voucher(conn: &Connection, voucher: &Voucher) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO vouchers (code, discount_type, discount_value, max_discount, min_order,
             start_at, end_at, usage_limit_total, usage_limit_per_user, used_count, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            voucher.code,
            voucher.discount_type.as_str(),
            voucher.discount_value,
            voucher.max_discount,
            voucher.min_order,
            voucher.start_at.as_ref().map(fmt_dt),
            voucher.end_at.as_ref().map(fmt_dt),
            voucher.usage_limit_total,
            voucher.usage_limit_per_user,
            voucher.used_count,
            voucher.is_active,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_voucher(conn: &Connection, id: i64) -> anyhow::Result<Option<Voucher>> {
    let result = conn.query_row(
        &format!("SELECT {VOUCHER_COLS} FROM vouchers WHERE id = ?1"),
        params![id],
        |row| Ok(parse_voucher_row(row)),
    );

    match result {
        Ok(voucher) => Ok(Some(voucher?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_voucher_by_code(conn: &Connection, code: &str) -> anyhow::Result<Option<Voucher>> {
    let result = conn.query_row(
        &format!("SELECT {VOUCHER_COLS} FROM vouchers WHERE code = ?1"),
        params![code],
        |row| Ok(parse_voucher_row(row)),
    );

    match result {
        Ok(voucher) => Ok(Some(voucher?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_vouchers(conn: &Connection) -> anyhow::Result<Vec<Voucher>> {
    let mut stmt = conn.prepare(&format!("SELECT {VOUCHER_COLS} FROM vouchers ORDER BY id ASC"))?;

    let rows = stmt.query_map([], |row| Ok(parse_voucher_row(row)))?;

    let mut vouchers = vec![];
    for row in rows {
        vouchers.push(row??);
    }
    Ok(vouchers)
}

pub fn count_user_voucher_usages(
    conn: &Connection,
    voucher_id: i64,
    customer_id: i64,
) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM voucher_usages WHERE voucher_id = ?1 AND customer_id = ?2",
        params![voucher_id, customer_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn has_voucher_usage(
    conn: &Connection,
    voucher_id: i64,
    order_ref: &str,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM voucher_usages WHERE voucher_id = ?1 AND order_ref = ?2",
        params![voucher_id, order_ref],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn record_voucher_usage(
    conn: &Connection,
    voucher_id: i64,
    customer_id: i64,
    order_ref: &str,
    discount_amount: i64,
    now: &NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO voucher_usages (voucher_id, customer_id, order_ref, discount_amount, used_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![voucher_id, customer_id, order_ref, discount_amount, fmt_dt(now)],
    )?;
    conn.execute(
        "UPDATE vouchers SET used_count = used_count + 1 WHERE id = ?1",
        params![voucher_id],
    )?;
    Ok(())
}

// ── Dashboard ──

#[derive(Debug, serde::Serialize)]
pub struct StatusCounts {
    pub courts: i64,
    pub occurrences_today: i64,
    pub pending_holds: i64,
}

pub fn get_status_counts(conn: &Connection, today: &NaiveDate) -> anyhow::Result<StatusCounts> {
    let courts: i64 = conn
        .query_row("SELECT COUNT(*) FROM courts", [], |row| row.get(0))
        .unwrap_or(0);

    let occurrences_today: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM occurrences WHERE date = ?1 AND status != 'cancelled'",
            params![today.format("%Y-%m-%d").to_string()],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let pending_holds: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM payments WHERE status = 'pending_payment'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(StatusCounts {
        courts,
        occurrences_today,
        pending_holds,
    })
}
