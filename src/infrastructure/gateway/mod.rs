//! Gateway orchestration

mod middleware;

pub use middleware::{
    bearer_token, Admission, GatewayMiddleware, GatewayRejection, GatewayResponse,
};
