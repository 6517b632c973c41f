use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, OrderId};
use crate::compiler::OrderCompiler;
use crate::serial::link::{DeliveryReceipt, LinkHandle, LinkMetrics, LinkState};
use crate::serial::protocol::{CommandBatch, ControlAction};
use super::Result;

/// Outcome of a successfully dispatched order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDispatch {
    pub order_id: OrderId,
    pub requires_id_check: bool,
    pub receipt: DeliveryReceipt,
}

/// Entry point for everything that wants the rig to do something.
///
/// Owns the compiler and a handle to the hardware link; constructed once at
/// startup and shared by reference with request handlers.
pub struct BarManager<C> {
    compiler: OrderCompiler<C>,
    link: LinkHandle,
}

impl<C: Catalog> BarManager<C> {
    pub fn new(compiler: OrderCompiler<C>, link: LinkHandle) -> Self {
        Self { compiler, link }
    }

    /// Compile the order and send it to the rig. Nothing reaches the queue
    /// unless compilation succeeds in full.
    pub async fn make_order(&self, order_id: OrderId) -> Result<OrderDispatch> {
        log::info!("Preparing command list for order {:05}", order_id);
        let batch = self.compiler.compile(order_id)?;
        let requires_id_check = self.compiler.requires_id_check(order_id)?;

        let receipt = self.link.submit(batch).await?;
        log::info!(
            "Order {:05} sent to rig ({} commands in {:?})",
            order_id,
            receipt.commands,
            receipt.elapsed
        );

        Ok(OrderDispatch {
            order_id,
            requires_id_check,
            receipt,
        })
    }

    pub async fn reset(&self) -> Result<DeliveryReceipt> {
        self.control(ControlAction::Reset).await
    }

    pub async fn zero(&self) -> Result<DeliveryReceipt> {
        self.control(ControlAction::Zero).await
    }

    pub async fn control(&self, action: ControlAction) -> Result<DeliveryReceipt> {
        log::info!("Sending control action {:?}", action);
        Ok(self.link.submit(CommandBatch::control(action)).await?)
    }

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    pub fn link_metrics(&self) -> LinkMetrics {
        self.link.metrics()
    }

    pub async fn shutdown(&self) {
        self.link.shutdown().await;
    }
}
