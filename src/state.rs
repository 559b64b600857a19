/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 * - Clone 前提 (中身は Arc)
 */
use std::sync::Arc;

use crate::identifier::Identifier;

#[derive(Clone, Debug)]
pub struct AppState {
    pub identifier: Arc<Identifier>,
}

impl AppState {
    pub fn new(identifier: Arc<Identifier>) -> Self {
        Self { identifier }
    }
}
