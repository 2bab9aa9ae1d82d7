//! The segmentation back end seam.
//!
//! Inference itself is out of scope. A [`Segmenter`] takes a photo
//! already resized to the model input and returns its raw class tensor.
//! [`detect_surfaces`] wraps the resize and the mask extraction around
//! any implementation.

use surfacemark_pipeline::downsample::{self, DownsampleFilter};
use surfacemark_pipeline::{
    ClassTensor, Dimensions, ExtractConfig, RgbaImage, SurfaceMask, extract_surfaces,
};

use crate::error::DetectorError;

/// A segmentation model.
///
/// Implementations must be shareable across threads: detection runs on
/// a background worker.
pub trait Segmenter: Send + Sync {
    /// Run inference on `image`.
    ///
    /// # Errors
    ///
    /// Returns a [`DetectorError`] if the model is unavailable, the image
    /// is unusable, or inference yields nothing.
    fn segment(&self, image: &RgbaImage) -> Result<ClassTensor, DetectorError>;
}

/// A segmenter that always returns the same tensor.
///
/// Useful for replaying recorded model output.
#[derive(Debug, Clone)]
pub struct StaticSegmenter {
    tensor: ClassTensor,
}

impl StaticSegmenter {
    /// Wrap a precomputed tensor.
    #[must_use]
    pub const fn new(tensor: ClassTensor) -> Self {
        Self { tensor }
    }
}

impl Segmenter for StaticSegmenter {
    fn segment(&self, image: &RgbaImage) -> Result<ClassTensor, DetectorError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DetectorError::InvalidImage);
        }
        Ok(self.tensor.clone())
    }
}

/// Resize `photo` to `model_input`, segment it, and extract masks.
///
/// The photo is stretched to fill the model input exactly; masks come
/// back on the model's output grid, which the compositor later stretches
/// over the full-size photo.
///
/// # Errors
///
/// Returns [`DetectorError::InvalidImage`] for an empty photo or model
/// input, and propagates any error from `segmenter`.
pub fn detect_surfaces(
    segmenter: &dyn Segmenter,
    photo: &RgbaImage,
    model_input: Dimensions,
    extract: &ExtractConfig,
) -> Result<Vec<SurfaceMask>, DetectorError> {
    if Dimensions::of(photo).is_empty() || model_input.is_empty() {
        return Err(DetectorError::InvalidImage);
    }
    let input = downsample::resize(photo, model_input, DownsampleFilter::Triangle);
    let tensor = segmenter.segment(&input)?;
    let masks = extract_surfaces(&tensor, extract);
    tracing::debug!(
        shape = ?tensor.shape(),
        surfaces = masks.len(),
        "segmentation finished",
    );
    Ok(masks)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use surfacemark_pipeline::SurfaceKind;

    use super::*;

    /// Records the size it was asked to segment.
    struct SizeProbe(std::sync::Mutex<Option<(u32, u32)>>);

    impl Segmenter for SizeProbe {
        fn segment(&self, image: &RgbaImage) -> Result<ClassTensor, DetectorError> {
            *self.0.lock().unwrap() = Some(image.dimensions());
            ClassTensor::new(vec![2, 2], vec![0.0, 0.0, 3.0, 3.0]).map_err(|_| DetectorError::NoResults)
        }
    }

    struct Unloaded;

    impl Segmenter for Unloaded {
        fn segment(&self, _: &RgbaImage) -> Result<ClassTensor, DetectorError> {
            Err(DetectorError::ModelNotLoaded)
        }
    }

    #[test]
    fn photo_is_resized_to_model_input() {
        let probe = SizeProbe(std::sync::Mutex::new(None));
        let photo = RgbaImage::new(300, 200);
        let masks = detect_surfaces(
            &probe,
            &photo,
            Dimensions::new(64, 64),
            &ExtractConfig::default(),
        )
        .unwrap();
        assert_eq!(*probe.0.lock().unwrap(), Some((64, 64)));
        let kinds: Vec<_> = masks.iter().map(SurfaceMask::kind).collect();
        assert_eq!(kinds, vec![SurfaceKind::Wall, SurfaceKind::Floor]);
    }

    #[test]
    fn segmenter_errors_propagate() {
        let result = detect_surfaces(
            &Unloaded,
            &RgbaImage::new(4, 4),
            Dimensions::new(8, 8),
            &ExtractConfig::default(),
        );
        assert_eq!(result.unwrap_err(), DetectorError::ModelNotLoaded);
    }

    #[test]
    fn empty_photo_is_invalid() {
        let seg = StaticSegmenter::new(ClassTensor::new(vec![1, 1], vec![0.0]).unwrap());
        let result = detect_surfaces(
            &seg,
            &RgbaImage::new(0, 0),
            Dimensions::new(8, 8),
            &ExtractConfig::default(),
        );
        assert_eq!(result.unwrap_err(), DetectorError::InvalidImage);
    }

    #[test]
    fn static_segmenter_replays_tensor() {
        let tensor = ClassTensor::new(vec![1, 2], vec![14.0, 8.0]).unwrap();
        let seg = StaticSegmenter::new(tensor.clone());
        assert_eq!(seg.segment(&RgbaImage::new(1, 1)).unwrap(), tensor);
    }
}
