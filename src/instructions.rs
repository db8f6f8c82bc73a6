//! Analyzers and transforms sent to the API.
//!
//! Both are plain name + argument records. On the wire each one is a
//! two-element JSON array `[name, args]`, where `args` holds only the
//! arguments that were supplied.

use serde_json::{json, Map, Value};

/// An instruction the server runs against an asset.
pub trait Instruction {
    /// The instruction name understood by the API.
    fn name(&self) -> &'static str;

    /// The supplied arguments; unset arguments are omitted.
    fn args(&self) -> Map<String, Value>;

    /// Encodes the instruction as its `[name, args]` wire pair.
    fn to_wire(&self) -> Value {
        json!([self.name(), self.args()])
    }
}

/// Encodes a list of instructions as a JSON array of wire pairs.
pub fn encode_all<I: Instruction>(instructions: &[I]) -> Value {
    Value::Array(instructions.iter().map(Instruction::to_wire).collect())
}

/// Collects the arguments that were supplied, dropping unset ones.
#[derive(Default)]
struct Args(Map<String, Value>);

impl Args {
    fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    fn opt<T: Into<Value>>(self, name: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.set(name, value),
            None => self,
        }
    }
}

/// Analyzers run against images to extend the information held about them.
/// Their output is stored in the asset's `meta` under the analyzer name.
#[derive(Debug, Clone, PartialEq)]
pub enum Analyzer {
    /// Extract animation information for an animated image.
    Animation,

    /// Extract a set of dominant colors from the image.
    DominantColors {
        max_colors: Option<u32>,
        min_weight: Option<f64>,
        max_sample_size: Option<u32>,
    },

    /// Detect the focal point of the image, or record the one supplied.
    FocalPoint {
        top: Option<u32>,
        left: Option<u32>,
        bottom: Option<u32>,
        right: Option<u32>,
    },
}

impl Analyzer {
    /// Dominant colors with the server's default settings.
    pub fn dominant_colors() -> Self {
        Analyzer::DominantColors {
            max_colors: None,
            min_weight: None,
            max_sample_size: None,
        }
    }

    /// Automatic focal point detection.
    pub fn focal_point() -> Self {
        Analyzer::FocalPoint {
            top: None,
            left: None,
            bottom: None,
            right: None,
        }
    }
}

impl Instruction for Analyzer {
    fn name(&self) -> &'static str {
        match self {
            Analyzer::Animation => "animation",
            Analyzer::DominantColors { .. } => "dominant_colors",
            Analyzer::FocalPoint { .. } => "focal_point",
        }
    }

    fn args(&self) -> Map<String, Value> {
        let args = Args::default();
        match self {
            Analyzer::Animation => args,
            Analyzer::DominantColors {
                max_colors,
                min_weight,
                max_sample_size,
            } => args
                .opt("max_colors", *max_colors)
                .opt("min_weight", *min_weight)
                .opt("max_sample_size", *max_sample_size),
            Analyzer::FocalPoint {
                top,
                left,
                bottom,
                right,
            } => args
                .opt("top", *top)
                .opt("left", *left)
                .opt("bottom", *bottom)
                .opt("right", *right),
        }
        .0
    }
}

/// Transforms run against images to produce a new variation.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// Orient the image based on its Exif data.
    AutoOrient,

    /// Crop the image to the given box.
    Crop {
        top: u32,
        left: u32,
        bottom: u32,
        right: u32,
    },

    /// Fit the image within a width and height.
    Fit {
        width: u32,
        height: u32,
        resample: Option<String>,
    },

    /// Crop around the image's focal point (the whole image when none is set).
    FocalPointCrop {
        aspect_ratio: Option<f64>,
        padding_top: Option<f64>,
        padding_left: Option<f64>,
        padding_bottom: Option<f64>,
        padding_right: Option<f64>,
    },

    /// Output the variation in the given format.
    Output {
        image_format: String,
        quality: Option<u8>,
        lossless: Option<bool>,
        progressive: Option<bool>,
        versioned: Option<bool>,
    },

    /// Rotate the image.
    Rotate { degrees: i32 },

    /// Extract a single frame from an animated image.
    SingleFrame { frame_number: Option<u32> },
}

impl Transform {
    /// Fit within `width` x `height` with the default resampling filter.
    pub fn fit(width: u32, height: u32) -> Self {
        Transform::Fit {
            width,
            height,
            resample: None,
        }
    }

    /// Focal point crop to the given aspect ratio, without padding.
    pub fn focal_point_crop(aspect_ratio: f64) -> Self {
        Transform::FocalPointCrop {
            aspect_ratio: Some(aspect_ratio),
            padding_top: None,
            padding_left: None,
            padding_bottom: None,
            padding_right: None,
        }
    }

    /// Output in `image_format` with default encoder settings.
    pub fn output(image_format: impl Into<String>) -> Self {
        Transform::Output {
            image_format: image_format.into(),
            quality: None,
            lossless: None,
            progressive: None,
            versioned: None,
        }
    }
}

impl Instruction for Transform {
    fn name(&self) -> &'static str {
        match self {
            Transform::AutoOrient => "auto_orient",
            Transform::Crop { .. } => "crop",
            Transform::Fit { .. } => "fit",
            Transform::FocalPointCrop { .. } => "focal_point_crop",
            Transform::Output { .. } => "output",
            Transform::Rotate { .. } => "rotate",
            Transform::SingleFrame { .. } => "single_frame",
        }
    }

    fn args(&self) -> Map<String, Value> {
        let args = Args::default();
        match self {
            Transform::AutoOrient => args,
            Transform::Crop {
                top,
                left,
                bottom,
                right,
            } => args
                .set("top", *top)
                .set("left", *left)
                .set("bottom", *bottom)
                .set("right", *right),
            Transform::Fit {
                width,
                height,
                resample,
            } => args
                .set("width", *width)
                .set("height", *height)
                .opt("resample", resample.clone()),
            Transform::FocalPointCrop {
                aspect_ratio,
                padding_top,
                padding_left,
                padding_bottom,
                padding_right,
            } => args
                .opt("aspect_ratio", *aspect_ratio)
                .opt("padding_top", *padding_top)
                .opt("padding_left", *padding_left)
                .opt("padding_bottom", *padding_bottom)
                .opt("padding_right", *padding_right),
            Transform::Output {
                image_format,
                quality,
                lossless,
                progressive,
                versioned,
            } => args
                .set("image_format", image_format.clone())
                .opt("quality", *quality)
                .opt("lossless", *lossless)
                .opt("progressive", *progressive)
                .opt("versioned", *versioned),
            Transform::Rotate { degrees } => args.set("degrees", *degrees),
            Transform::SingleFrame { frame_number } => args.opt("frame_number", *frame_number),
        }
        .0
    }
}
