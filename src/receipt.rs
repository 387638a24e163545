//! Pickup receipt rendering
//!
//! Builds the ESC/POS byte stream for a redeemed order. Layout only; the
//! transport is the printer adapter's concern.

use crate::types::ReceiptJob;

/// Minimal ESC/POS command builder for the pickup receipt.
pub struct EscPos {
    buf: Vec<u8>,
    width: usize,
}

impl EscPos {
    /// `width` is the paper width in characters (58mm = 32, 80mm = 48).
    pub fn new(width: usize) -> Self {
        let mut buf = Vec::with_capacity(1024);
        // Initialize printer (ESC @)
        buf.extend_from_slice(&[0x1B, 0x40]);
        Self { buf, width }
    }

    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    pub fn center(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x01]);
        self
    }

    pub fn left(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x00]);
        self
    }

    pub fn bold(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x01]);
        self
    }

    pub fn bold_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x00]);
        self
    }

    pub fn double_size(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x11]);
        self
    }

    pub fn reset_size(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x00]);
        self
    }

    pub fn sep(&mut self) -> &mut Self {
        let rule = "-".repeat(self.width);
        self.line(&rule)
    }

    /// Left and right text on one line, gap filled with spaces.
    pub fn line_lr(&mut self, left: &str, right: &str) -> &mut Self {
        let lw = left.chars().count();
        let rw = right.chars().count();
        if lw + rw >= self.width {
            self.text(left);
            self.text(" ");
            self.line(right);
        } else {
            let spaces = self.width - lw - rw;
            self.text(left);
            self.text(&" ".repeat(spaces));
            self.line(right);
        }
        self
    }

    pub fn feed(&mut self, lines: u8) -> &mut Self {
        // ESC d n
        self.buf.extend_from_slice(&[0x1B, 0x64, lines]);
        self
    }

    pub fn cut(&mut self) -> &mut Self {
        // GS V 66 0 - partial cut with feed
        self.buf.extend_from_slice(&[0x1D, 0x56, 0x42, 0x00]);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

/// Format a minor-unit amount as "units.cc".
pub fn format_amount(minor: i64) -> String {
    format!("{}.{:02}", minor / 100, (minor % 100).abs())
}

/// Render a pickup receipt for a redeemed order.
pub fn render(job: &ReceiptJob, width: usize) -> Vec<u8> {
    let mut b = EscPos::new(width);

    b.center();
    b.double_size();
    b.line(&job.header);
    b.reset_size();
    b.line("PICKUP RECEIPT");
    b.left();
    b.sep();

    b.line_lr(
        &format!("Order: {}", job.order_id),
        &job.created_at.format("%H:%M").to_string(),
    );
    b.line(&format!("Code:  {}", job.code));
    b.sep();

    for item in &job.items {
        b.line_lr(
            &format!("{} x{}", item.name, item.quantity),
            &format_amount(item.line_total()),
        );
    }
    b.sep();

    b.bold();
    b.line_lr("TOTAL", &format_amount(job.total_amount));
    b.bold_off();

    b.center();
    b.line(&job.footer);
    b.feed(3);
    b.cut();
    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderItem, RedeemableOrder};
    use chrono::Utc;

    fn job() -> ReceiptJob {
        let order = RedeemableOrder {
            id: "order-7".to_string(),
            code: "ORDER-XYZ9".to_string(),
            items: vec![OrderItem {
                name: "Katsu Curry".to_string(),
                quantity: 2,
                unit_price: 125,
            }],
            total_amount: 250,
            collected: true,
            created_at: Utc::now(),
        };
        ReceiptJob::for_order(&order, "CAMPUS EATS", "Thank you!")
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(250), "2.50");
        assert_eq!(format_amount(5), "0.05");
        assert_eq!(format_amount(1000), "10.00");
    }

    #[test]
    fn test_render_contains_items_and_total() {
        let data = render(&job(), 32);
        let text = String::from_utf8_lossy(&data);

        assert!(text.contains("CAMPUS EATS"));
        assert!(text.contains("ORDER-XYZ9"));
        assert!(text.contains("Katsu Curry x2"));
        assert!(text.contains("2.50"));
        assert!(text.contains("TOTAL"));
    }

    #[test]
    fn test_render_one_line_per_item() {
        let data = render(&job(), 32);
        let text = String::from_utf8_lossy(&data);
        assert_eq!(text.matches("Katsu Curry").count(), 1);
    }

    #[test]
    fn test_render_starts_with_init_and_ends_with_cut() {
        let data = render(&job(), 32);
        assert_eq!(&data[..2], &[0x1B, 0x40]);
        assert_eq!(&data[data.len() - 4..], &[0x1D, 0x56, 0x42, 0x00]);
    }

    #[test]
    fn test_line_lr_overlong_does_not_panic() {
        let mut b = EscPos::new(8);
        b.line_lr("a-very-long-left-side", "right");
        let out = b.build();
        assert!(!out.is_empty());
    }
}
