use std::io;

use bytes::{Buf, Bytes};
use futures::stream::{StreamExt, TryStreamExt};
use warp::multipart::{FormData, Part};

use crate::errors::BackendError;

/// The parts of a document upload form.
#[derive(Debug)]
pub struct UploadForm {
    pub metadata: Vec<u8>,
    pub filename: String,
    pub data: Vec<u8>,
}

/// Reads the `metadata` and `file` parts of a form. Other parts are ignored.
///
/// Each part is read to the end before the next one is requested.
pub async fn parse_upload(mut form: FormData) -> Result<UploadForm, BackendError> {
    let mut metadata = None;
    let mut file = None;

    while let Some(part) = form
        .try_next()
        .await
        .map_err(|_| BackendError::MalformedFormSubmission)?
    {
        let name = part.name().to_owned();

        match name.as_str() {
            "metadata" => {
                metadata = Some(
                    part_as_vec(part)
                        .await
                        .map_err(|_| BackendError::MalformedFormSubmission)?,
                )
            }
            "file" => {
                let filename = part.filename().unwrap_or_default().to_owned();
                let data = part_as_vec(part)
                    .await
                    .map_err(|_| BackendError::MalformedFormSubmission)?;

                file = Some((filename, data));
            }
            _ => {
                part_as_vec(part)
                    .await
                    .map_err(|_| BackendError::MalformedFormSubmission)?;
            }
        }
    }

    match (metadata, file) {
        (Some(metadata), Some((filename, data))) => Ok(UploadForm {
            metadata,
            filename,
            data,
        }),
        _ => Err(BackendError::PartsMissing),
    }
}

/// Collects chunks of [`Part`].
pub async fn part_as_vec(raw: Part) -> Result<Vec<u8>, ()> {
    let vec_of_results = part_as_stream(raw).collect::<Vec<_>>().await;

    let vec_of_vecs = vec_of_results
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ())?;

    Ok(vec_of_vecs.concat())
}

/// Collects raw data from [`Part`].
pub fn part_as_stream(raw: Part) -> impl futures::Stream<Item = Result<Bytes, io::Error>> {
    raw.stream().map(|r| {
        r.map(|mut x| x.copy_to_bytes(x.remaining()))
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "could not retrieve chunk"))
    })
}
