use serde::Serialize;
use warp::reject;

use crate::errors::{BackendError, ErrorKind};

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: BackendError,
}

impl Rejection {
    pub fn new(context: Context, error: BackendError) -> Self {
        Rejection { context, error }
    }

    pub fn flatten(&self) -> FlattenedRejection {
        FlattenedRejection {
            context: self.context.clone(),
            kind: self.error.kind(),
            message: format!("{}", self.error),
        }
    }
}

impl reject::Reject for Rejection {}

/// The error body: the context fields, a machine-readable kind and a message.
#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    #[serde(flatten)]
    pub(crate) context: Context,
    pub(crate) kind: ErrorKind,
    pub(crate) message: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Context {
    Progress {
        username: Option<String>,
        trip: String,
    },
    Dashboard {
        username: String,
    },
    Upload {
        username: String,
    },
    StatusChange {
        username: String,
        trip: String,
        target: &'static str,
    },
    RequiredDocuments {
        trip: String,
    },
}

impl Context {
    pub fn progress(username: Option<String>, trip: String) -> Context {
        Context::Progress { username, trip }
    }

    pub fn dashboard(username: String) -> Context {
        Context::Dashboard { username }
    }

    pub fn upload(username: String) -> Context {
        Context::Upload { username }
    }

    pub fn status_change(username: String, trip: String, target: &'static str) -> Context {
        Context::StatusChange {
            username,
            trip,
            target,
        }
    }

    pub fn required_documents(trip: String) -> Context {
        Context::RequiredDocuments { trip }
    }
}
