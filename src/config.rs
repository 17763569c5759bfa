use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    /// Pre-shared key the bank gateway sends as `Authorization: Apikey <key>`.
    pub bank_webhook_key: String,
    /// Minutes an unpaid bank-transfer hold survives.
    pub hold_minutes: i64,
    /// Late-checkout surcharge, percent of the overrun's base amount.
    pub late_fee_percent: i64,
    /// How early before the slot start a check-in is accepted.
    pub checkin_lead_minutes: i64,
    /// Venue wall-clock offset from UTC. 420 = UTC+7.
    pub tz_offset_minutes: i32,
    pub sweep_interval_secs: u64,
    pub notify_webhook_url: String,
    pub bank_account_number: String,
    pub bank_code: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: "courtbook.db".to_string(),
            admin_token: "changeme".to_string(),
            bank_webhook_key: String::new(),
            hold_minutes: 5,
            late_fee_percent: 150,
            checkin_lead_minutes: 10,
            tz_offset_minutes: 420,
            sweep_interval_secs: 60,
            notify_webhook_url: String::new(),
            bank_account_number: String::new(),
            bank_code: String::new(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "courtbook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            bank_webhook_key: env::var("BANK_WEBHOOK_KEY").unwrap_or_default(),
            hold_minutes: env::var("HOLD_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            late_fee_percent: env::var("LATE_FEE_PERCENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(150),
            checkin_lead_minutes: env::var("CHECKIN_LEAD_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            tz_offset_minutes: env::var("TZ_OFFSET_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(420),
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").unwrap_or_default(),
            bank_account_number: env::var("BANK_ACCOUNT_NUMBER").unwrap_or_default(),
            bank_code: env::var("BANK_CODE").unwrap_or_default(),
        }
    }
}
