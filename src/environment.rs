use std::sync::Arc;

use log::Logger;

use crate::diary::Diary;

#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub diary: Arc<Diary>,
}

impl Environment {
    pub fn new(logger: Arc<Logger>, diary: Arc<Diary>) -> Self {
        Self { logger, diary }
    }
}
