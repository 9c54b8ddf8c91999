pub mod alerts;
pub mod cameras;
pub mod handle_websocket;
pub mod health;
