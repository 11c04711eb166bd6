use thiserror::Error;

use crate::model::{LabId, LabIdError};

/// Errors raised while resolving labs from the catalog.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    InvalidLabId(#[from] LabIdError),
    #[error("no lab named {0} in the catalog")]
    UnknownLab(LabId),
}
