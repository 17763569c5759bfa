use chrono::NaiveDateTime;
use rusqlite::Connection;

use super::{VoucherCheck, VoucherDecision, VoucherValidator};
use crate::db::queries;
use crate::models::DiscountType;

/// Validator backed by the local `vouchers` tables.
pub struct SqliteVoucherStore;

impl VoucherValidator for SqliteVoucherStore {
    fn validate(&self, conn: &Connection, check: &VoucherCheck) -> anyhow::Result<VoucherDecision> {
        let voucher = match queries::get_voucher(conn, check.voucher_id)? {
            Some(v) => v,
            None => return Ok(VoucherDecision::invalid("voucher not found")),
        };

        if !voucher.is_active {
            return Ok(VoucherDecision::invalid("voucher is not active"));
        }
        if let Some(start) = voucher.start_at {
            if check.at < start {
                return Ok(VoucherDecision::invalid("voucher is not valid yet"));
            }
        }
        if let Some(end) = voucher.end_at {
            if check.at > end {
                return Ok(VoucherDecision::invalid("voucher has expired"));
            }
        }
        if let Some(limit) = voucher.usage_limit_total {
            if voucher.used_count >= limit {
                return Ok(VoucherDecision::invalid("voucher usage limit reached"));
            }
        }
        if let Some(per_user) = voucher.usage_limit_per_user {
            let used = queries::count_user_voucher_usages(conn, voucher.id, check.customer_id)?;
            if used >= per_user {
                return Ok(VoucherDecision::invalid(
                    "voucher usage limit reached for this customer",
                ));
            }
        }
        if let Some(min_order) = voucher.min_order {
            if check.order_total < min_order {
                return Ok(VoucherDecision::invalid(format!(
                    "order total is below the voucher minimum of {min_order}"
                )));
            }
        }

        let discount = match voucher.discount_type {
            DiscountType::Percentage => {
                let raw = check.order_total * voucher.discount_value / 100;
                match voucher.max_discount {
                    Some(cap) => raw.min(cap),
                    None => raw,
                }
            }
            DiscountType::Fixed => voucher.discount_value.min(check.order_total),
        };

        Ok(VoucherDecision::valid(discount.max(0)))
    }

    fn record_usage(
        &self,
        conn: &Connection,
        voucher_id: i64,
        customer_id: i64,
        order_ref: &str,
        discount_amount: i64,
        now: &NaiveDateTime,
    ) -> anyhow::Result<()> {
        queries::record_voucher_usage(conn, voucher_id, customer_id, order_ref, discount_amount, now)
    }
}
