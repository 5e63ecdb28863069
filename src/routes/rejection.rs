use serde::Serialize;
use warp::reject;

use crate::errors::DiaryError;

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: DiaryError,
}

impl Rejection {
    pub fn new(context: Context, error: DiaryError) -> Self {
        Rejection { context, error }
    }

    pub fn flatten(&self) -> FlattenedRejection {
        FlattenedRejection {
            context: self.context.clone(),
            message: format!("{}", self.error),
        }
    }
}

impl reject::Reject for Rejection {}

#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    #[serde(flatten)]
    pub(crate) context: Context,
    pub(crate) message: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum Context {
    Create,
    Edit { id: String },
    Delete { id: String },
    Sync,
    UpdateSettings,
}

impl Context {
    pub fn create() -> Context {
        Context::Create
    }

    pub fn edit(id: String) -> Context {
        Context::Edit { id }
    }

    pub fn delete(id: String) -> Context {
        Context::Delete { id }
    }

    pub fn sync() -> Context {
        Context::Sync
    }

    pub fn update_settings() -> Context {
        Context::UpdateSettings
    }
}
