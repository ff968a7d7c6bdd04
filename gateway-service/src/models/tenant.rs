//! Tenant account model.
//!
//! Tenants are owned by the external repository; the gateway only reads them.

use serde::Deserialize;

/// A tenant business account using the gateway under its own branding.
#[derive(Debug, Clone, Deserialize)]
pub struct Tenant {
    pub id: String,

    /// Business name, used to brand the assistant persona.
    pub name: String,

    /// Account status; only `"active"` tenants may consume the service.
    pub status: String,

    /// Subscription package, drives model selection.
    pub package_type: String,

    /// Maximum exchanges per UTC calendar day.
    pub daily_limit: i64,

    /// Destination for lead alerts; alerts are skipped when unset.
    /// The repository column is named after the Telegram channel.
    #[serde(default, alias = "telegram_chat_id")]
    pub notification_chat_id: Option<String>,
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}
