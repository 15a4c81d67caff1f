use crate::{
    config::Config,
    websocket::{dispatch::MessageDispatcher, RoomRegistry},
};
use sqlx::{Pool, Postgres};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Postgres>,
    pub config: Arc<Config>,
    pub registry: RoomRegistry,
    pub dispatcher: MessageDispatcher,
}

impl AppState {
    pub fn new(db: Pool<Postgres>, config: Arc<Config>, registry: RoomRegistry) -> Self {
        let dispatcher = MessageDispatcher::new(registry.clone());
        Self {
            db,
            config,
            registry,
            dispatcher,
        }
    }
}
