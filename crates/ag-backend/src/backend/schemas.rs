use axum::extract::Multipart;
use axum::extract::multipart::Field;
use tracing::debug;
use crate::error::IntakeError;

pub const SAMPLE_AD_FIELD: &str = "sampleAd";
pub const PRODUCT_IMAGES_FIELD: &str = "productImages";
pub const PROMPTS_TEXT_FIELD: &str = "promptsText";

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    async fn read(field: Field<'_>) -> Result<Self, IntakeError> {
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        Ok(Self {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        })
    }

    /// Browsers send an empty, unnamed part for an untouched file input.
    fn is_placeholder(&self) -> bool {
        self.file_name.is_empty() && self.bytes.is_empty()
    }
}

/// A fully buffered `POST /api/generate` body.
///
/// Nothing is written to storage until the whole payload has been read, so a
/// rejected submission leaves no files behind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    pub sample_ad: Option<UploadedFile>,
    pub product_images: Vec<UploadedFile>,
    pub prompts_text: Option<String>,
}

impl Submission {
    pub async fn from_multipart(multipart: &mut Multipart) -> Result<Self, IntakeError> {
        let mut submission = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                SAMPLE_AD_FIELD => {
                    let file = UploadedFile::read(field).await?;
                    if file.is_placeholder() {
                        continue;
                    }
                    if submission.sample_ad.is_none() {
                        submission.sample_ad = Some(file);
                    } else {
                        debug!(file = %file.file_name, "ignoring extra sample ad");
                    }
                }
                PRODUCT_IMAGES_FIELD => {
                    let file = UploadedFile::read(field).await?;
                    if !file.is_placeholder() {
                        submission.product_images.push(file);
                    }
                }
                PROMPTS_TEXT_FIELD => {
                    submission.prompts_text = Some(field.text().await?);
                }
                other => debug!(field = other, "ignoring unknown multipart field"),
            }
        }

        Ok(submission)
    }
}
