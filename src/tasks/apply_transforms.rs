// apply_transforms.rs - antsApplyTransforms: resample an image through a transform stack

use std::path::Path;

use crate::core::format::call;
use crate::core::{
    bracket, format_float, value::bool_token, ArgBuilder, Bindings, FieldKind, FieldSpec, Result,
    Schema, SchemaBuilder, TaskError,
};

use super::common::{insert_file, num_threads_field, output_name};
use super::traits::{OutputMap, Task};

const OUTPUT_TEMPLATE: &str = "{input_image}_warped";

/// Image type names and the numeric codes the tool expects
const IMAGE_TYPES: &[(&str, u8)] = &[
    ("scalar", 0),
    ("vector", 1),
    ("tensor", 2),
    ("time-series", 3),
    ("multichannel", 4),
    ("five-dimensional", 5),
];

/// Fields that shape the `--interpolation` token
struct InterpolationParams<'a> {
    method: &'a str,
    spline_order: Option<i64>,
    sigma: Option<f64>,
    alpha: Option<f64>,
}

impl InterpolationParams<'_> {
    fn token(&self) -> Result<String> {
        match self.method {
            "BSpline" => {
                let order = self.spline_order.ok_or_else(|| TaskError::missing("spline_order"))?;
                Ok(call(self.method, &[order.to_string()]))
            }
            "MultiLabel" | "Gaussian" => {
                let sigma = self.sigma.ok_or_else(|| TaskError::missing("sigma"))?;
                let alpha = self.alpha.ok_or_else(|| TaskError::missing("alpha"))?;
                Ok(call(self.method, &[format_float(sigma), format_float(alpha)]))
            }
            other => Ok(other.to_string()),
        }
    }
}

#[derive(Debug)]
pub struct ApplyTransforms {
    schema: Schema,
}

impl ApplyTransforms {
    pub fn new() -> Result<Self> {
        let schema = SchemaBuilder::new("apply_transforms")
            .field(
                FieldSpec::new(
                    "dimensionality",
                    FieldKind::Int,
                    "force image dimensionality (2, 3 or 4)",
                )
                .allowed(vec![2, 3, 4]),
            )
            .field(
                FieldSpec::new("image_type", FieldKind::Text, "type of the input image")
                    .default("scalar")
                    .allowed(IMAGE_TYPES.iter().map(|(name, _)| *name).collect()),
            )
            .field(FieldSpec::new("input_image", FieldKind::File, "input image").mandatory())
            .field(
                FieldSpec::new("reference_image", FieldKind::File, "reference image")
                    .mandatory(),
            )
            .field(FieldSpec::new("output_image", FieldKind::Text, "output image"))
            .field(
                FieldSpec::new("interpolation_method", FieldKind::Text, "interpolation method")
                    .default("Linear")
                    .allowed(vec![
                        "Linear",
                        "NearestNeighbor",
                        "MultiLabel",
                        "Gaussian",
                        "BSpline",
                        "CosineWindowedSinc",
                        "WelchWindowedSinc",
                        "HammingWindowedSinc",
                        "LanczosWindowedSinc",
                        "GenericLabel",
                    ]),
            )
            .field(FieldSpec::new(
                "sigma",
                FieldKind::Float,
                "sigma for MultiLabel and Gaussian interpolation",
            ))
            .field(FieldSpec::new(
                "alpha",
                FieldKind::Float,
                "alpha for MultiLabel and Gaussian interpolation",
            ))
            .field(
                FieldSpec::new(
                    "spline_order",
                    FieldKind::Int,
                    "spline order for BSpline interpolation",
                )
                .default(3),
            )
            .field(
                FieldSpec::new("output_datatype", FieldKind::Text, "force output image datatype")
                    .allowed(vec!["char", "uchar", "short", "int", "float", "double", "default"]),
            )
            .field(FieldSpec::new(
                "transform_files",
                FieldKind::list(FieldKind::File),
                "stack of transform files to apply",
            ))
            .field(
                FieldSpec::new(
                    "invert_transforms",
                    FieldKind::list(FieldKind::Bool),
                    "which transforms to invert",
                )
                .requires(&["transform_files"]),
            )
            .field(FieldSpec::new(
                "default_value",
                FieldKind::Float,
                "default voxel value for input image",
            ))
            .field(FieldSpec::new(
                "use_float_precision",
                FieldKind::Bool,
                "use float precision instead of double",
            ))
            .field(FieldSpec::new("verbose", FieldKind::Bool, "enable verbose output"))
            .field(num_threads_field())
            .build()?;
        Ok(Self { schema })
    }

    fn interpolation<'a>(bound: &'a Bindings) -> Result<InterpolationParams<'a>> {
        Ok(InterpolationParams {
            method: bound.require_str("interpolation_method")?,
            spline_order: bound.get_int("spline_order"),
            sigma: bound.get_float("sigma"),
            alpha: bound.get_float("alpha"),
        })
    }
}

impl Task for ApplyTransforms {
    fn name(&self) -> &'static str {
        "apply_transforms"
    }

    fn executable(&self) -> &'static str {
        "antsApplyTransforms"
    }

    fn description(&self) -> &'static str {
        "Apply a stack of transforms to an image"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn check(&self, bound: &Bindings) -> Result<()> {
        Self::interpolation(bound)?.token()?;
        if let (Some(files), Some(flags)) = (
            bound.get_list("transform_files"),
            bound.get_list("invert_transforms"),
        ) {
            if flags.len() != files.len() {
                return Err(TaskError::length_mismatch(
                    "invert_transforms",
                    flags.len(),
                    "transform_files",
                    files.len(),
                ));
            }
        }
        Ok(())
    }

    fn format_args(&self, bound: &Bindings) -> Result<Vec<String>> {
        let image_type = bound.require_str("image_type")?;
        let code = IMAGE_TYPES
            .iter()
            .find(|(name, _)| *name == image_type)
            .map(|(_, code)| *code)
            .ok_or_else(|| TaskError::invalid_value("image_type", image_type))?;

        let mut args = ArgBuilder::new();
        args.opt_if("--image-dimensionality", bound.render("dimensionality"))
            .opt("--input-image-type", code.to_string())
            .opt("--input", bound.require_render("input_image")?)
            .opt("--reference-image", bound.require_render("reference_image")?)
            .opt("--output", output_name(bound, "output_image", OUTPUT_TEMPLATE)?)
            .opt("--interpolation", Self::interpolation(bound)?.token()?)
            .opt_if("--output-data-type", bound.render("output_datatype"));

        let files = bound.get_str_list("transform_files").unwrap_or_default();
        match bound.get_bool_list("invert_transforms") {
            Some(flags) => {
                for (file, invert) in files.iter().zip(flags) {
                    args.opt("--transform", bracket(&[file.as_str(), bool_token(invert)]));
                }
            }
            None => {
                for file in files {
                    args.opt("--transform", file);
                }
            }
        }

        args.opt_if("--default-value", bound.get_float("default_value").map(format_float))
            .opt_bool_if("--float", bound.get_bool("use_float_precision"))
            .opt_bool_if("--verbose", bound.get_bool("verbose"));
        Ok(args.build())
    }

    fn list_outputs(&self, bound: &Bindings, work_dir: &Path) -> Result<OutputMap> {
        let mut outputs = OutputMap::new();
        let name = output_name(bound, "output_image", OUTPUT_TEMPLATE)?;
        insert_file(&mut outputs, "output_image", work_dir, &name);
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ParameterSet;

    fn base() -> ParameterSet {
        ParameterSet::new()
            .with("input_image", "moving.nii")
            .with("reference_image", "fixed.nii")
    }

    #[test]
    fn test_minimal_command() {
        let task = ApplyTransforms::new().unwrap();
        let argv = task.command_line(&base()).unwrap().argv();
        assert_eq!(
            argv,
            vec![
                "antsApplyTransforms",
                "--input-image-type",
                "0",
                "--input",
                "moving.nii",
                "--reference-image",
                "fixed.nii",
                "--output",
                "moving_warped.nii",
                "--interpolation",
                "Linear",
            ]
        );
    }

    #[test]
    fn test_interpolation_depends_on_method() {
        let task = ApplyTransforms::new().unwrap();
        let params = base()
            .with("interpolation_method", "BSpline")
            .with("transform_files", vec!["affine.mat"]);
        let argv = task.command_line(&params).unwrap().argv();
        assert!(argv.windows(2).any(|w| w == ["--interpolation", "BSpline[3]"]));
        assert_eq!(&argv[argv.len() - 2..], &["--transform", "affine.mat"]);

        let params = base()
            .with("interpolation_method", "Gaussian")
            .with("sigma", 4.0)
            .with("alpha", 1.0)
            .with("transform_files", vec!["affine1.mat", "affine2.mat"])
            .with("invert_transforms", vec![false, true]);
        let argv = task.command_line(&params).unwrap().argv();
        assert!(argv.windows(2).any(|w| w == ["--interpolation", "Gaussian[4,1]"]));
        assert_eq!(
            &argv[argv.len() - 4..],
            &["--transform", "[affine1.mat,0]", "--transform", "[affine2.mat,1]"]
        );
    }

    #[test]
    fn test_gaussian_needs_sigma_and_alpha() {
        let task = ApplyTransforms::new().unwrap();
        let err = task
            .command_line(&base().with("interpolation_method", "Gaussian").with("sigma", 1.0))
            .unwrap_err();
        assert_eq!(err, TaskError::missing("alpha"));
    }

    #[test]
    fn test_invert_flags_must_match() {
        let task = ApplyTransforms::new().unwrap();
        let err = task
            .command_line(&base().with("invert_transforms", vec![true]))
            .unwrap_err();
        assert!(matches!(err, TaskError::UnmetDependency { .. }));

        let err = task
            .command_line(
                &base()
                    .with("transform_files", vec!["a.mat", "b.mat"])
                    .with("invert_transforms", vec![true]),
            )
            .unwrap_err();
        assert!(matches!(err, TaskError::SequenceLengthMismatch { .. }));
    }

    #[test]
    fn test_trailing_options_and_output() {
        let task = ApplyTransforms::new().unwrap();
        let params = base()
            .with("image_type", "time-series")
            .with("default_value", 0)
            .with("use_float_precision", true)
            .with("output_image", "out.nii.gz");
        let argv = task.command_line(&params).unwrap().argv();
        assert_eq!(argv[2], "3");
        assert_eq!(&argv[argv.len() - 4..], &["--default-value", "0", "--float", "1"]);

        let outputs = task.outputs(&params, Path::new("/w")).unwrap();
        assert_eq!(outputs["output_image"].as_path().unwrap(), Path::new("/w/out.nii.gz"));
    }
}
