pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

use std::sync::Arc;

pub use models::*;
pub use services::PaymentGatewayService;

#[derive(Clone)]
pub struct PaymentState {
    pub gateway: Arc<PaymentGatewayService>,
}
