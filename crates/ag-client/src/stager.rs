//! Client-side selection of the reference ad, product images and prompts.

use ag_core::{InputSummary, SourceTag};
use thiserror::Error;
use crate::asset::Asset;

pub const DEFAULT_MAX_REPLACEMENT_ASSETS: usize = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("Please upload a sample ad.")]
    MissingReference,
    #[error("Please provide either product images OR description prompts.")]
    NoVariationSource,
    #[error("Please use EITHER product images OR prompts, not both.")]
    ConflictingVariationSource,
    #[error("At most {max} product images can be used ({attempted} selected).")]
    TooManyReplacementAssets { max: usize, attempted: usize },
    #[error("No product image at position {index} ({len} selected).")]
    OutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone)]
pub struct AssetStager {
    reference: Option<Asset>,
    replacements: Vec<Asset>,
    prompt_text: String,
    max_replacements: usize,
    last_error: Option<StageError>,
}

impl Default for AssetStager {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetStager {
    pub fn new() -> Self {
        Self::with_max_replacements(DEFAULT_MAX_REPLACEMENT_ASSETS)
    }

    pub fn with_max_replacements(max_replacements: usize) -> Self {
        Self {
            reference: None,
            replacements: Vec::new(),
            prompt_text: String::new(),
            max_replacements,
            last_error: None,
        }
    }

    /// Only the first file becomes the reference; the rest are dropped.
    /// An empty selection leaves the current reference in place.
    pub fn set_reference_asset(&mut self, files: impl IntoIterator<Item = Asset>) {
        if let Some(first) = files.into_iter().next() {
            self.reference = Some(first);
            self.last_error = None;
        }
    }

    /// Append product images. Going over the limit rejects the whole batch.
    pub fn add_replacement_assets(&mut self, files: impl IntoIterator<Item = Asset>) -> Result<(), StageError> {
        let files: Vec<Asset> = files.into_iter().collect();
        let attempted = self.replacements.len() + files.len();
        if attempted > self.max_replacements {
            return Err(self.record(StageError::TooManyReplacementAssets {
                max: self.max_replacements,
                attempted,
            }));
        }
        self.replacements.extend(files);
        self.last_error = None;
        Ok(())
    }

    pub fn remove_reference_asset(&mut self) -> Option<Asset> {
        self.reference.take()
    }

    pub fn remove_replacement_asset(&mut self, index: usize) -> Result<Asset, StageError> {
        if index >= self.replacements.len() {
            return Err(self.record(StageError::OutOfRange {
                index,
                len: self.replacements.len(),
            }));
        }
        Ok(self.replacements.remove(index))
    }

    pub fn set_prompt_text(&mut self, text: impl Into<String>) {
        self.prompt_text = text.into();
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt_text
    }

    pub fn reference(&self) -> Option<&Asset> {
        self.reference.as_ref()
    }

    pub fn replacements(&self) -> &[Asset] {
        &self.replacements
    }

    pub fn last_error(&self) -> Option<&StageError> {
        self.last_error.as_ref()
    }

    fn has_prompts(&self) -> bool {
        !self.prompt_text.trim().is_empty()
    }

    /// Reference is mandatory; exactly one of product images or prompts.
    pub fn validate_for_submission(&mut self) -> Result<(), StageError> {
        let verdict = match (self.reference.is_some(), !self.replacements.is_empty(), self.has_prompts()) {
            (false, _, _) => Err(StageError::MissingReference),
            (true, false, false) => Err(StageError::NoVariationSource),
            (true, true, true) => Err(StageError::ConflictingVariationSource),
            _ => Ok(()),
        };
        match verdict {
            Ok(()) => {
                self.last_error = None;
                Ok(())
            }
            Err(e) => Err(self.record(e)),
        }
    }

    pub fn source_tag(&self) -> SourceTag {
        if self.has_prompts() {
            SourceTag::Prompt
        } else {
            SourceTag::Image
        }
    }

    /// What gets written to history next to the results.
    pub fn input_summary(&self) -> InputSummary {
        let (prompt_text, replacement_count) = match self.source_tag() {
            SourceTag::Prompt => (Some(self.prompt_text.clone()), None),
            SourceTag::Image => (None, Some(self.replacements.len())),
        };
        InputSummary {
            reference_name: self
                .reference
                .as_ref()
                .map(|asset| asset.name().to_string())
                .unwrap_or_default(),
            prompt_text,
            replacement_count,
        }
    }

    fn record(&mut self, error: StageError) -> StageError {
        self.last_error = Some(error.clone());
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(name: &str) -> Asset {
        Asset::new(name, vec![0u8; 4])
    }

    #[test]
    fn test_first_reference_file_wins() {
        let mut stager = AssetStager::new();
        stager.set_reference_asset(vec![png("ad.png"), png("other.png")]);
        assert_eq!(stager.reference().unwrap().name(), "ad.png");

        stager.set_reference_asset(Vec::new());
        assert_eq!(stager.reference().unwrap().name(), "ad.png");

        stager.set_reference_asset(vec![png("new.png")]);
        assert_eq!(stager.reference().unwrap().name(), "new.png");
    }

    #[test]
    fn test_replacements_append_up_to_limit() {
        let mut stager = AssetStager::with_max_replacements(3);
        stager.add_replacement_assets(vec![png("a.png"), png("b.png")]).unwrap();
        stager.add_replacement_assets(vec![png("c.png")]).unwrap();
        assert_eq!(stager.replacements().len(), 3);

        let err = stager.add_replacement_assets(vec![png("d.png")]).unwrap_err();
        assert_eq!(err, StageError::TooManyReplacementAssets { max: 3, attempted: 4 });
        assert_eq!(stager.replacements().len(), 3);
        assert_eq!(stager.last_error(), Some(&err));
    }

    #[test]
    fn test_default_limit_is_ten() {
        let mut stager = AssetStager::new();
        let batch: Vec<Asset> = (0..11).map(|i| png(&format!("{i}.png"))).collect();
        assert!(stager.add_replacement_assets(batch).is_err());
        assert!(stager.replacements().is_empty());
    }

    #[test]
    fn test_remove_replacement_out_of_range() {
        let mut stager = AssetStager::new();
        stager.add_replacement_assets(vec![png("a.png"), png("b.png")]).unwrap();

        assert_eq!(stager.remove_replacement_asset(0).unwrap().name(), "a.png");
        assert_eq!(
            stager.remove_replacement_asset(1),
            Err(StageError::OutOfRange { index: 1, len: 1 })
        );
        assert_eq!(stager.replacements()[0].name(), "b.png");
    }

    #[test]
    fn test_validation_rules() {
        let mut stager = AssetStager::new();
        stager.set_prompt_text("red shoe");
        assert_eq!(stager.validate_for_submission(), Err(StageError::MissingReference));

        stager.set_reference_asset(vec![png("ad.png")]);
        assert!(stager.last_error().is_none());
        assert_eq!(stager.validate_for_submission(), Ok(()));

        stager.add_replacement_assets(vec![png("p.png")]).unwrap();
        assert_eq!(stager.validate_for_submission(), Err(StageError::ConflictingVariationSource));

        stager.set_prompt_text("   \n ");
        assert_eq!(stager.validate_for_submission(), Ok(()));

        stager.remove_replacement_asset(0).unwrap();
        assert_eq!(stager.validate_for_submission(), Err(StageError::NoVariationSource));
        assert_eq!(stager.last_error(), Some(&StageError::NoVariationSource));
    }

    #[test]
    fn test_reference_selection_clears_error() {
        let mut stager = AssetStager::new();
        assert!(stager.validate_for_submission().is_err());
        assert!(stager.last_error().is_some());
        stager.set_reference_asset(vec![png("ad.png")]);
        assert!(stager.last_error().is_none());
    }

    #[test]
    fn test_input_summary() {
        let mut stager = AssetStager::new();
        stager.set_reference_asset(vec![png("ad.png")]);
        stager.add_replacement_assets(vec![png("a.png"), png("b.png")]).unwrap();

        let summary = stager.input_summary();
        assert_eq!(stager.source_tag(), SourceTag::Image);
        assert_eq!(summary.reference_name, "ad.png");
        assert_eq!(summary.replacement_count, Some(2));
        assert_eq!(summary.prompt_text, None);

        stager.remove_replacement_asset(0).unwrap();
        stager.remove_replacement_asset(0).unwrap();
        stager.set_prompt_text("red shoe\nblue shoe");
        let summary = stager.input_summary();
        assert_eq!(stager.source_tag(), SourceTag::Prompt);
        assert_eq!(summary.prompt_text.as_deref(), Some("red shoe\nblue shoe"));
        assert_eq!(summary.replacement_count, None);
    }
}
