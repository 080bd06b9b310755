//! Order fulfillment saga constants.

/// Routing identifier the host process registers the saga under.
pub const TASK_QUEUE: &str = "order-processing-task-queue";

/// Forward step: check and decrement stock, create the order row.
pub const RESERVE_INVENTORY: &str = "ReserveInventory";

/// Compensation of [`RESERVE_INVENTORY`]: give the stock back.
pub const RELEASE_INVENTORY: &str = "ReleaseInventory";

/// Forward step: move the order to shipping and charge the total.
pub const DEDUCT_PAYMENT: &str = "DeductPayment";

/// Compensation of [`DEDUCT_PAYMENT`]: refund and mark the order.
pub const REFUND_PAYMENT: &str = "RefundPayment";

/// Follow-up of a failed [`DEDUCT_PAYMENT`]: mark the order `PAYMENT_FAILED`.
pub const MARK_PAYMENT_FAILED: &str = "MarkPaymentFailed";

/// Forward step: ship and mark the order delivered.
pub const SHIP_ORDER: &str = "ShipOrder";

/// Saga type recorded on every execution span.
pub const SAGA_TYPE: &str = "OrderProcessing";
