//! Printer adapter
//!
//! Fire-and-forget receipt submission. Printing is always optional: a
//! disconnected printer resolves to failure immediately and never gates
//! order verification.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::errors::KioskError;
use crate::receipt;
use crate::types::ReceiptJob;

/// Raw byte transport to a receipt printer.
#[async_trait]
pub trait ReceiptTransport: Send + Sync {
    /// Deliver one rendered job to the device.
    async fn send(&self, data: &[u8]) -> Result<(), KioskError>;

    /// Cheap reachability probe used by the pairing handshake.
    async fn probe(&self) -> bool;
}

/// Network printer transport (raw ESC/POS over TCP port 9100).
#[derive(Debug, Clone)]
pub struct TcpTransport {
    addr: SocketAddr,
    timeout: Duration,
}

impl TcpTransport {
    /// `addr` is a socket address string, e.g. "192.168.1.100:9100".
    pub fn new(addr: &str, timeout: Duration) -> Result<Self, KioskError> {
        let addr = addr
            .parse()
            .map_err(|_| KioskError::PrinterError(format!("Invalid printer address: {}", addr)))?;
        Ok(Self { addr, timeout })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[async_trait]
impl ReceiptTransport for TcpTransport {
    async fn send(&self, data: &[u8]) -> Result<(), KioskError> {
        log::info!("Sending {} bytes to printer {}", data.len(), self.addr);

        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| {
                KioskError::PrinterError(format!("Connection timeout: {}", self.addr))
            })?
            .map_err(|e| KioskError::PrinterError(format!("{}: {}", self.addr, e)))?;

        let mut stream = stream;
        stream
            .write_all(data)
            .await
            .map_err(|e| KioskError::PrinterError(format!("Write failed: {}", e)))?;
        stream
            .flush()
            .await
            .map_err(|e| KioskError::PrinterError(format!("Flush failed: {}", e)))?;

        log::info!("Print job sent");
        Ok(())
    }

    async fn probe(&self) -> bool {
        let check_timeout = Duration::from_millis(500);
        match tokio::time::timeout(check_timeout, TcpStream::connect(self.addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                log::warn!("Printer offline: {}", e);
                false
            }
            Err(_) => {
                log::warn!("Printer probe timeout");
                false
            }
        }
    }
}

/// Clears the busy flag on every exit path.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Receipt printer with observable connected/busy state.
pub struct PrinterAdapter {
    transport: Arc<dyn ReceiptTransport>,
    connected: AtomicBool,
    busy: AtomicBool,
    width: usize,
}

impl PrinterAdapter {
    pub fn new(transport: Arc<dyn ReceiptTransport>, width: usize) -> Self {
        Self {
            transport,
            connected: AtomicBool::new(false),
            busy: AtomicBool::new(false),
            width,
        }
    }

    /// Pairing handshake. Failure leaves the adapter disconnected and is
    /// never an error to the caller.
    pub async fn connect(&self) -> bool {
        let online = self.transport.probe().await;
        self.connected.store(online, Ordering::Release);
        if online {
            log::info!("Printer connected");
        } else {
            log::warn!("Printer not reachable, printing disabled");
        }
        online
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Render and submit one receipt.
    ///
    /// Resolves `false` immediately when disconnected (no queueing, no
    /// retry). A transport failure also flips `connected` off so later
    /// jobs fail fast until the operator re-pairs.
    pub async fn print(&self, job: &ReceiptJob) -> bool {
        if !self.is_connected() {
            log::info!("Printer disconnected, skipping job {}", job.id);
            return false;
        }

        self.busy.store(true, Ordering::Release);
        let _guard = BusyGuard(&self.busy);

        let data = receipt::render(job, self.width);
        match self.transport.send(&data).await {
            Ok(()) => {
                log::info!("Receipt {} printed", job.id);
                true
            }
            Err(e) => {
                log::warn!("Receipt {} failed: {}", job.id, e);
                self.connected.store(false, Ordering::Release);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryTransport;
    use crate::types::{OrderItem, RedeemableOrder};
    use chrono::Utc;

    fn job() -> ReceiptJob {
        let order = RedeemableOrder {
            id: "o1".to_string(),
            code: "C1".to_string(),
            items: vec![OrderItem {
                name: "Soup".to_string(),
                quantity: 1,
                unit_price: 300,
            }],
            total_amount: 300,
            collected: true,
            created_at: Utc::now(),
        };
        ReceiptJob::for_order(&order, "CAMPUS EATS", "Thank you!")
    }

    #[tokio::test]
    async fn test_connect_reflects_probe() {
        let transport = Arc::new(MemoryTransport::new(true));
        let printer = PrinterAdapter::new(transport.clone(), 32);

        assert!(!printer.is_connected());
        assert!(printer.connect().await);
        assert!(printer.is_connected());

        transport.set_online(false);
        assert!(!printer.connect().await);
        assert!(!printer.is_connected());
    }

    #[tokio::test]
    async fn test_print_fails_fast_when_disconnected() {
        let transport = Arc::new(MemoryTransport::new(false));
        let printer = PrinterAdapter::new(transport.clone(), 32);

        assert!(!printer.print(&job()).await);
        assert_eq!(transport.job_count(), 0);
    }

    #[tokio::test]
    async fn test_print_submits_one_job() {
        let transport = Arc::new(MemoryTransport::new(true));
        let printer = PrinterAdapter::new(transport.clone(), 32);
        printer.connect().await;

        assert!(printer.print(&job()).await);
        assert_eq!(transport.job_count(), 1);
        assert!(!printer.is_busy());
    }

    #[tokio::test]
    async fn test_send_failure_disconnects() {
        let transport = Arc::new(MemoryTransport::new(true));
        let printer = PrinterAdapter::new(transport.clone(), 32);
        printer.connect().await;

        transport.set_fail_send(true);
        assert!(!printer.print(&job()).await);
        assert!(!printer.is_connected());
        assert!(!printer.is_busy());

        // Subsequent jobs fail fast without touching the transport.
        assert!(!printer.print(&job()).await);
        assert_eq!(transport.job_count(), 0);
    }

    #[test]
    fn test_invalid_addr_rejected() {
        assert!(TcpTransport::new("not-an-addr", Duration::from_secs(1)).is_err());
    }
}
