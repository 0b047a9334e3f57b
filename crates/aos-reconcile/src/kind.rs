use std::fmt;

use serde::{Deserialize, Serialize};

/// Entity kinds pushed by the source system. Each kind owns its own table
/// and its own surrogate id space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Advertiser,
    Order,
    LineItem,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Advertiser, EntityKind::Order, EntityKind::LineItem];

    /// Backing table name. Table names are never taken from caller input.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Advertiser => "advertisers",
            EntityKind::Order => "orders",
            EntityKind::LineItem => "line_items",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Advertiser => "advertiser",
            EntityKind::Order => "order",
            EntityKind::LineItem => "lineitem",
        }
    }

    /// Response key carrying the surrogate id (e.g. `"advertiserId"`).
    pub fn surrogate_id_field(&self) -> &'static str {
        match self {
            EntityKind::Advertiser => "advertiserId",
            EntityKind::Order => "orderId",
            EntityKind::LineItem => "lineitemId",
        }
    }

    /// Payload key carrying the external id (e.g. `"sourceAdvertiserId"`).
    pub fn source_id_field(&self) -> &'static str {
        match self {
            EntityKind::Advertiser => "sourceAdvertiserId",
            EntityKind::Order => "sourceOrderId",
            EntityKind::LineItem => "sourceLineitemId",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "advertiser" | "advertisers" => Some(EntityKind::Advertiser),
            "order" | "orders" => Some(EntityKind::Order),
            "lineitem" | "lineitems" | "line_item" | "line_items" => Some(EntityKind::LineItem),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
