use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single raster frame pulled from the camera stream.
///
/// Data is tightly packed RGB8, row-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraFrame {
    pub id: Uuid,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub size_bytes: usize,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
}

impl CameraFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, device_id: String) -> Self {
        let size_bytes = data.len();
        Self {
            id: Uuid::new_v4(),
            data,
            width,
            height,
            size_bytes,
            device_id,
            timestamp: Utc::now(),
        }
    }
}

/// Requested camera format for the scan stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    pub fps: f32,
}

impl CameraFormat {
    pub fn new(width: u32, height: u32, fps: f32) -> Self {
        Self { width, height, fps }
    }

    /// Default scan format. QR detection does not benefit from more than
    /// 720p and lower resolutions keep per-frame decode cost bounded.
    pub fn standard() -> Self {
        Self::new(1280, 720, 30.0)
    }
}

/// One line of a redeemable order, insertion order = display order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    /// Unit price in minor currency units.
    pub unit_price: i64,
}

impl OrderItem {
    pub fn line_total(&self) -> i64 {
        self.unit_price * self.quantity as i64
    }
}

/// An order as held by the external order directory.
///
/// `collected` is monotonic false -> true; this subsystem never resets it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedeemableOrder {
    pub id: String,
    pub code: String,
    pub items: Vec<OrderItem>,
    /// Total in minor currency units, as fixed by the directory.
    pub total_amount: i64,
    pub collected: bool,
    pub created_at: DateTime<Utc>,
}

/// A receipt submission for the printer adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceiptJob {
    pub id: Uuid,
    pub header: String,
    pub order_id: String,
    pub code: String,
    pub items: Vec<OrderItem>,
    pub total_amount: i64,
    pub created_at: DateTime<Utc>,
    pub footer: String,
}

impl ReceiptJob {
    pub fn for_order(order: &RedeemableOrder, header: &str, footer: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            header: header.to_string(),
            order_id: order.id.clone(),
            code: order.code.clone(),
            items: order.items.clone(),
            total_amount: order.total_amount,
            created_at: order.created_at,
            footer: footer.to_string(),
        }
    }
}

/// Operator-facing session state, published over the state channel and
/// mirrored to the frontend as `mealkiosk://state`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum KioskState {
    Idle,
    Scanning,
    Verified {
        order: RedeemableOrder,
        printing: bool,
        print_failed: bool,
    },
    AlreadyUsed {
        order: Option<RedeemableOrder>,
    },
    NotFound {
        token: String,
    },
    TransientError {
        message: String,
    },
    CameraFault {
        message: String,
    },
}

impl KioskState {
    /// True for states that wait for an operator action instead of the
    /// dwell timer.
    pub fn needs_operator(&self) -> bool {
        matches!(
            self,
            KioskState::TransientError { .. } | KioskState::CameraFault { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> RedeemableOrder {
        RedeemableOrder {
            id: "order-1".to_string(),
            code: "ORDER-XYZ9".to_string(),
            items: vec![OrderItem {
                name: "Pad Thai".to_string(),
                quantity: 2,
                unit_price: 125,
            }],
            total_amount: 250,
            collected: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_order_serde_round_trip() {
        let order = sample_order();
        let json = serde_json::to_string(&order).unwrap();
        let back: RedeemableOrder = serde_json::from_str(&json).unwrap();
        assert_eq!(order, back);
    }

    #[test]
    fn test_item_line_total() {
        let item = OrderItem {
            name: "Coffee".to_string(),
            quantity: 3,
            unit_price: 150,
        };
        assert_eq!(item.line_total(), 450);
    }

    #[test]
    fn test_state_serializes_with_phase_tag() {
        let json = serde_json::to_value(&KioskState::Scanning).unwrap();
        assert_eq!(json["phase"], "scanning");

        let json = serde_json::to_value(&KioskState::NotFound {
            token: "ABC123".to_string(),
        })
        .unwrap();
        assert_eq!(json["phase"], "not_found");
        assert_eq!(json["token"], "ABC123");
    }

    #[test]
    fn test_needs_operator() {
        assert!(KioskState::CameraFault {
            message: "no device".to_string()
        }
        .needs_operator());
        assert!(!KioskState::Scanning.needs_operator());
    }

    #[test]
    fn test_receipt_job_copies_order_lines() {
        let order = sample_order();
        let job = ReceiptJob::for_order(&order, "CAMPUS EATS", "Enjoy!");
        assert_eq!(job.items, order.items);
        assert_eq!(job.total_amount, 250);
        assert_eq!(job.code, "ORDER-XYZ9");
    }
}
